// Linear-phase FIR correction designer: inverts the excess phase of selected
// upstream filters inside a band-limited, magnitude-gated region, then
// windows and normalizes the result.

pub mod window;

use num_complex::Complex64;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use tracing::info;

use crate::error::{DesignError, Result};
use crate::filters::FilterDesc;
use crate::response::{chain_response_at, to_db};

pub use window::WindowKind;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Tap-count bounds. The upper bound keeps the design grid (next power of
/// two) at 2^18 and the correction latency under ~2.7 s at 48 kHz.
pub const MIN_TAPS: usize = 1;
pub const MAX_TAPS: usize = 262_143;

/// Magnitude floor for the phase-inversion division conj(H)/|H|.
const GAIN_FLOOR: f64 = 1e-9;

pub const SETTINGS_VERSION: u32 = 1;
const MAX_SETTINGS_VERSION: u32 = SETTINGS_VERSION;

// ---------------------------------------------------------------------------
// Tap array
// ---------------------------------------------------------------------------

/// Real FIR coefficients. Length is always odd, so the center sample is the
/// integer group delay. The identity filter is exactly `[1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FirTaps(Vec<f64>);

impl FirTaps {
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if values.is_empty() || values.len() % 2 == 0 {
            return Err(DesignError::InvalidTaps {
                message: format!("length {} is not odd", values.len()),
            });
        }
        Ok(FirTaps(values))
    }

    pub fn identity() -> Self {
        FirTaps(vec![1.0])
    }

    pub fn is_identity(&self) -> bool {
        self.0.len() == 1 && self.0[0] == 1.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false // length is at least 1 by construction
    }

    /// Index of the center sample = group delay in samples.
    pub fn center(&self) -> usize {
        (self.0.len() - 1) / 2
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn into_values(self) -> Vec<f64> {
        self.0
    }
}

/// Center-preserving resize between odd lengths: pad with zeros or crop
/// symmetrically around the center sample. Resizing to the current length
/// returns the taps unchanged.
pub fn resize_fir_centered(taps: &FirTaps, new_len: usize) -> FirTaps {
    let new_len = clamp_odd(new_len);
    if new_len == taps.len() {
        return taps.clone();
    }
    let src = taps.values();
    let src_center = taps.center() as isize;
    let dst_center = ((new_len - 1) / 2) as isize;
    let mut out = vec![0.0; new_len];
    for (i, slot) in out.iter_mut().enumerate() {
        let j = i as isize - dst_center + src_center;
        if j >= 0 && (j as usize) < src.len() {
            *slot = src[j as usize];
        }
    }
    FirTaps(out)
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirDesignSettings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Correction band in Hz; the phase inversion fades to unity outside.
    #[serde(default = "default_low_hz")]
    pub low_hz: f64,
    #[serde(default = "default_high_hz")]
    pub high_hz: f64,
    /// Width of the band-edge fade, in octaves outside [low_hz, high_hz].
    #[serde(default = "default_transition_octaves")]
    pub transition_octaves: f64,

    /// Correction is suppressed where |H| falls below this level...
    #[serde(default = "default_threshold_db")]
    pub threshold_db: f64,
    /// ...fading over this many dB below the threshold.
    #[serde(default = "default_transition_db")]
    pub transition_db: f64,

    #[serde(default = "default_window")]
    pub window: WindowKind,
    #[serde(default = "default_kaiser_beta")]
    pub kaiser_beta: f64,

    /// Requested tap count (taps mode). Ignored when `max_latency_ms` is set.
    #[serde(default = "default_taps")]
    pub taps: usize,
    /// Latency mode: derive the tap count from a latency budget instead.
    #[serde(default)]
    pub max_latency_ms: Option<f64>,

    #[serde(default = "default_true")]
    pub normalize: bool,
}

fn default_version() -> u32 { SETTINGS_VERSION }
fn default_low_hz() -> f64 { 20.0 }
fn default_high_hz() -> f64 { 20000.0 }
fn default_transition_octaves() -> f64 { 1.0 }
fn default_threshold_db() -> f64 { -40.0 }
fn default_transition_db() -> f64 { 10.0 }
fn default_window() -> WindowKind { WindowKind::Hann }
fn default_kaiser_beta() -> f64 { 8.6 }
fn default_taps() -> usize { 2049 }
fn default_true() -> bool { true }

impl Default for FirDesignSettings {
    fn default() -> Self {
        FirDesignSettings {
            version: default_version(),
            low_hz: default_low_hz(),
            high_hz: default_high_hz(),
            transition_octaves: default_transition_octaves(),
            threshold_db: default_threshold_db(),
            transition_db: default_transition_db(),
            window: default_window(),
            kaiser_beta: default_kaiser_beta(),
            taps: default_taps(),
            max_latency_ms: None,
            normalize: default_true(),
        }
    }
}

impl FirDesignSettings {
    /// Reject settings written by a newer version of the dashboard.
    pub fn validate_version(&self) -> Result<()> {
        if self.version > MAX_SETTINGS_VERSION {
            return Err(DesignError::SettingsVersion {
                found: self.version,
                max: MAX_SETTINGS_VERSION,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tap count / latency duality
// ---------------------------------------------------------------------------

/// Clamp a tap count to [MIN_TAPS, MAX_TAPS] and force it odd (rounding down
/// when even). Idempotent.
pub fn clamp_odd(taps: usize) -> usize {
    let clamped = taps.clamp(MIN_TAPS, MAX_TAPS);
    if clamped % 2 == 0 { clamped - 1 } else { clamped }
}

/// Resolve the effective tap count from the settings' taps-or-latency target.
pub fn resolve_taps(settings: &FirDesignSettings, sample_rate: f64) -> usize {
    clamp_odd(requested_taps(settings, sample_rate))
}

fn requested_taps(settings: &FirDesignSettings, sample_rate: f64) -> usize {
    match settings.max_latency_ms {
        Some(ms) => {
            let delay = (ms / 1000.0 * sample_rate).round();
            if delay >= 0.0 {
                // Cap at MAX_TAPS delay samples so the usize math cannot
                // overflow while still letting clamp_odd see (and warn
                // about) the excess.
                delay.min(MAX_TAPS as f64) as usize * 2 + 1
            } else {
                // Negative or NaN budgets request fewer taps than the
                // floor; resolve to 0 so clamp_odd reports the clamp.
                0
            }
        }
        None => settings.taps,
    }
}

/// Group delay in samples of an odd-length linear-phase FIR.
pub fn target_delay_samples(effective_taps: usize) -> usize {
    (effective_taps - 1) / 2
}

/// Latency of the correction filter in milliseconds.
pub fn target_latency_ms(effective_taps: usize, sample_rate: f64) -> f64 {
    target_delay_samples(effective_taps) as f64 / sample_rate * 1000.0
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum DesignWarning {
    TapsClamped { requested: usize, actual: usize },
    EmptySelection,
    NearSingularResponse { bins: usize },
}

impl fmt::Display for DesignWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesignWarning::TapsClamped { requested, actual } => {
                write!(f, "Tap count {} adjusted to {}", requested, actual)
            }
            DesignWarning::EmptySelection => {
                write!(f, "No filters selected; correction degenerates to a pure delay")
            }
            DesignWarning::NearSingularResponse { bins } => {
                write!(f, "Chain response near zero at {} design bins; correction suppressed there", bins)
            }
        }
    }
}

/// Successful design output. Recomputed wholesale on every input change.
#[derive(Debug, Clone, PartialEq)]
pub struct FirDesign {
    pub taps: FirTaps,
    pub warnings: Vec<DesignWarning>,
}

// ---------------------------------------------------------------------------
// Designer
// ---------------------------------------------------------------------------

/// Design the linear-phase correction FIR for the selected upstream filters.
///
/// Algorithm:
/// 1. Evaluate H(f) over a linear grid of `n_fft = effective_taps.next_power_of_two()` bins.
/// 2. Build the unit-magnitude phase inversion P(f) = conj(H)/max(|H|, ε).
/// 3. Blend P toward unity with the combined band/gate weight, then apply the
///    compensating delay e^{-j2πfD/Fs}, D = (effective_taps-1)/2.
/// 4. Hermitian-assemble the full spectrum and inverse-FFT; the delay term
///    places the main lobe at sample D, so the first `effective_taps` samples
///    are the centered correction.
/// 5. Window, then (optionally) normalize the peak sample to 1.0.
///
/// Errors only for invalid numeric configuration; degenerate inputs produce
/// warnings instead.
pub fn design(
    sample_rate: f64,
    settings: &FirDesignSettings,
    selected: &[FilterDesc],
) -> Result<FirDesign> {
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(DesignError::InvalidSampleRate { value: sample_rate });
    }
    let nyquist = sample_rate / 2.0;
    let low = settings.low_hz.clamp(0.0, nyquist);
    let high = settings.high_hz.clamp(0.0, nyquist);
    if !low.is_finite() || !high.is_finite() || low >= high {
        return Err(DesignError::InvalidBand {
            low_hz: settings.low_hz,
            high_hz: settings.high_hz,
        });
    }

    let mut warnings = Vec::new();

    let requested = requested_taps(settings, sample_rate);
    let effective_taps = clamp_odd(requested);
    if effective_taps != requested {
        warnings.push(DesignWarning::TapsClamped { requested, actual: effective_taps });
    }
    if selected.is_empty() {
        warnings.push(DesignWarning::EmptySelection);
    }

    let delay = target_delay_samples(effective_taps);
    let n_fft = effective_taps.next_power_of_two();
    let n_bins = n_fft / 2 + 1;
    let df = sample_rate / n_fft as f64;

    // 1.-3. Correction spectrum over the positive-frequency bins
    let mut singular_bins = 0usize;
    let mut spectrum: Vec<Complex64> = Vec::with_capacity(n_fft);
    for k in 0..n_bins {
        let f = k as f64 * df;
        let h = chain_response_at(selected, f, sample_rate);
        let mag = h.norm();
        if mag < GAIN_FLOOR {
            singular_bins += 1;
        }
        let inversion = h.conj() / mag.max(GAIN_FLOOR);
        let w = band_weight(f, low, high, settings.transition_octaves)
            * gate_weight(to_db(h), settings.threshold_db, settings.transition_db);
        let blended = inversion * w + Complex64::new(1.0 - w, 0.0);
        // Per-bin delay phase -2πkD/N keeps the pure-delay case bit-exact
        let delay_phase = -2.0 * PI * k as f64 * delay as f64 / n_fft as f64;
        spectrum.push(blended * Complex64::from_polar(1.0, delay_phase));
    }
    if singular_bins > 0 {
        warnings.push(DesignWarning::NearSingularResponse { bins: singular_bins });
    }

    // DC and Nyquist must be real for a real impulse
    spectrum[0].im = 0.0;
    if n_fft > 1 {
        spectrum[n_bins - 1].im = 0.0;
    }

    // 4. Conjugate mirror for negative frequencies, then IFFT
    for i in 1..(n_fft - n_bins + 1) {
        let idx = n_bins - 1 - i;
        spectrum.push(spectrum[idx].conj());
    }

    let mut planner = FftPlanner::<f64>::new();
    let ifft = planner.plan_fft_inverse(n_fft);
    ifft.process(&mut spectrum);

    let norm = 1.0 / n_fft as f64;
    let mut impulse: Vec<f64> = spectrum[..effective_taps].iter().map(|c| c.re * norm).collect();

    // 5. Window + normalize
    let win = window::generate(settings.window, effective_taps, settings.kaiser_beta);
    for (s, w) in impulse.iter_mut().zip(win.iter()) {
        *s *= w;
    }

    if settings.normalize {
        let peak = impulse.iter().fold(0.0_f64, |m, &v| m.max(v.abs()));
        if peak > 0.0 {
            let gain = 1.0 / peak;
            for s in impulse.iter_mut() {
                *s *= gain;
            }
        }
    }

    info!(
        "design: taps={} (delay {} smp ≈ {:.2} ms), n_fft={}, band {:.0}..{:.0} Hz, window {:?}, {} warning(s)",
        effective_taps,
        delay,
        target_latency_ms(effective_taps, sample_rate),
        n_fft,
        low,
        high,
        settings.window,
        warnings.len()
    );

    Ok(FirDesign { taps: FirTaps(impulse), warnings })
}

// ---------------------------------------------------------------------------
// Band / gate weights
// ---------------------------------------------------------------------------

fn raised_cosine(x: f64) -> f64 {
    0.5 * (1.0 - (x * PI).cos())
}

/// 1.0 inside [low, high], fading to 0.0 over `transition_octaves` outside
/// each edge (raised cosine in log-frequency). Continuous at both edges.
fn band_weight(f: f64, low: f64, high: f64, transition_octaves: f64) -> f64 {
    if f <= 0.0 {
        return if low <= 0.0 { 1.0 } else { 0.0 };
    }
    let t = transition_octaves.max(0.0);

    let low_w = if low <= 0.0 || f >= low {
        1.0
    } else if t == 0.0 {
        0.0
    } else {
        let oct = (f / low).log2(); // negative below the edge
        if oct <= -t { 0.0 } else { raised_cosine(1.0 + oct / t) }
    };

    let high_w = if f <= high {
        1.0
    } else if t == 0.0 {
        0.0
    } else {
        let oct = (f / high).log2(); // positive above the edge
        if oct >= t { 0.0 } else { raised_cosine(1.0 - oct / t) }
    };

    low_w * high_w
}

/// 1.0 at or above `threshold_db`, fading to 0.0 as the level drops to
/// `threshold_db - transition_db` (raised cosine in dB). With a zero-width
/// transition this degenerates to a hard step below the threshold.
fn gate_weight(h_db: f64, threshold_db: f64, transition_db: f64) -> f64 {
    if h_db >= threshold_db {
        return 1.0;
    }
    let t = transition_db.max(0.0);
    if t == 0.0 {
        return 0.0;
    }
    let x = 1.0 - (threshold_db - h_db) / t;
    if x <= 0.0 { 0.0 } else { raised_cosine(x) }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
