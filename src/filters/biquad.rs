// Biquad parameter model and RBJ Audio-EQ-Cookbook coefficients.
//
// Shelf `slope` follows the engine's config convention: dB/octave, mapped to
// the cookbook shelf-slope parameter as S = slope/12.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BiquadParams {
    Lowpass { freq: f64, q: f64 },
    Highpass { freq: f64, q: f64 },
    Bandpass { freq: f64, q: f64 },
    Notch { freq: f64, q: f64 },
    Allpass { freq: f64, q: f64 },
    Peaking { freq: f64, gain: f64, q: f64 },
    Lowshelf { freq: f64, gain: f64, slope: f64 },
    Highshelf { freq: f64, gain: f64, slope: f64 },
    LowpassFO { freq: f64 },
    HighpassFO { freq: f64 },
}

/// Biquad coefficients normalized so a0 = 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

// ---------------------------------------------------------------------------
// Coefficient computation
// ---------------------------------------------------------------------------

pub fn coefficients(params: &BiquadParams, sample_rate: f64) -> Coefficients {
    match *params {
        BiquadParams::Lowpass { freq, q } => {
            let w0 = 2.0 * PI * freq / sample_rate;
            let cs = w0.cos();
            let alpha = w0.sin() / (2.0 * q);
            normalize(
                (1.0 - cs) / 2.0,
                1.0 - cs,
                (1.0 - cs) / 2.0,
                1.0 + alpha,
                -2.0 * cs,
                1.0 - alpha,
            )
        }
        BiquadParams::Highpass { freq, q } => {
            let w0 = 2.0 * PI * freq / sample_rate;
            let cs = w0.cos();
            let alpha = w0.sin() / (2.0 * q);
            normalize(
                (1.0 + cs) / 2.0,
                -(1.0 + cs),
                (1.0 + cs) / 2.0,
                1.0 + alpha,
                -2.0 * cs,
                1.0 - alpha,
            )
        }
        BiquadParams::Bandpass { freq, q } => {
            let w0 = 2.0 * PI * freq / sample_rate;
            let cs = w0.cos();
            let alpha = w0.sin() / (2.0 * q);
            normalize(alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cs, 1.0 - alpha)
        }
        BiquadParams::Notch { freq, q } => {
            let w0 = 2.0 * PI * freq / sample_rate;
            let cs = w0.cos();
            let alpha = w0.sin() / (2.0 * q);
            normalize(1.0, -2.0 * cs, 1.0, 1.0 + alpha, -2.0 * cs, 1.0 - alpha)
        }
        BiquadParams::Allpass { freq, q } => {
            let w0 = 2.0 * PI * freq / sample_rate;
            let cs = w0.cos();
            let alpha = w0.sin() / (2.0 * q);
            normalize(
                1.0 - alpha,
                -2.0 * cs,
                1.0 + alpha,
                1.0 + alpha,
                -2.0 * cs,
                1.0 - alpha,
            )
        }
        BiquadParams::Peaking { freq, gain, q } => {
            let w0 = 2.0 * PI * freq / sample_rate;
            let cs = w0.cos();
            let a_lin = 10.0_f64.powf(gain / 40.0);
            let alpha = w0.sin() / (2.0 * q);
            normalize(
                1.0 + alpha * a_lin,
                -2.0 * cs,
                1.0 - alpha * a_lin,
                1.0 + alpha / a_lin,
                -2.0 * cs,
                1.0 - alpha / a_lin,
            )
        }
        BiquadParams::Lowshelf { freq, gain, slope } => {
            let w0 = 2.0 * PI * freq / sample_rate;
            let cs = w0.cos();
            let a_lin = 10.0_f64.powf(gain / 40.0);
            let alpha = w0.sin() / 2.0
                * ((a_lin + 1.0 / a_lin) * (12.0 / slope - 1.0) + 2.0).sqrt();
            let beta = 2.0 * a_lin.sqrt() * alpha;
            normalize(
                a_lin * ((a_lin + 1.0) - (a_lin - 1.0) * cs + beta),
                2.0 * a_lin * ((a_lin - 1.0) - (a_lin + 1.0) * cs),
                a_lin * ((a_lin + 1.0) - (a_lin - 1.0) * cs - beta),
                (a_lin + 1.0) + (a_lin - 1.0) * cs + beta,
                -2.0 * ((a_lin - 1.0) + (a_lin + 1.0) * cs),
                (a_lin + 1.0) + (a_lin - 1.0) * cs - beta,
            )
        }
        BiquadParams::Highshelf { freq, gain, slope } => {
            let w0 = 2.0 * PI * freq / sample_rate;
            let cs = w0.cos();
            let a_lin = 10.0_f64.powf(gain / 40.0);
            let alpha = w0.sin() / 2.0
                * ((a_lin + 1.0 / a_lin) * (12.0 / slope - 1.0) + 2.0).sqrt();
            let beta = 2.0 * a_lin.sqrt() * alpha;
            normalize(
                a_lin * ((a_lin + 1.0) + (a_lin - 1.0) * cs + beta),
                -2.0 * a_lin * ((a_lin - 1.0) + (a_lin + 1.0) * cs),
                a_lin * ((a_lin + 1.0) + (a_lin - 1.0) * cs - beta),
                (a_lin + 1.0) - (a_lin - 1.0) * cs + beta,
                2.0 * ((a_lin - 1.0) - (a_lin + 1.0) * cs),
                (a_lin + 1.0) - (a_lin - 1.0) * cs - beta,
            )
        }
        BiquadParams::LowpassFO { freq } => {
            let k = (PI * freq / sample_rate).tan();
            normalize(k, k, 0.0, k + 1.0, k - 1.0, 0.0)
        }
        BiquadParams::HighpassFO { freq } => {
            let k = (PI * freq / sample_rate).tan();
            normalize(1.0, -1.0, 0.0, k + 1.0, k - 1.0, 0.0)
        }
    }
}

fn normalize(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Coefficients {
    Coefficients {
        b0: b0 / a0,
        b1: b1 / a0,
        b2: b2 / a0,
        a1: a1 / a0,
        a2: a2 / a0,
    }
}

// ---------------------------------------------------------------------------
// Complex response
// ---------------------------------------------------------------------------

/// Transfer-function value H(e^{jω}) at `f_hz`.
pub fn response_at(params: &BiquadParams, f_hz: f64, sample_rate: f64) -> Complex64 {
    let c = coefficients(params, sample_rate);
    let w = 2.0 * PI * f_hz / sample_rate;
    let z1 = Complex64::from_polar(1.0, -w);
    let z2 = z1 * z1;
    let num = Complex64::new(c.b0, 0.0) + c.b1 * z1 + c.b2 * z2;
    let den = Complex64::new(1.0, 0.0) + c.a1 * z1 + c.a2 * z2;
    if den.norm_sqr() < 1e-30 {
        // Pole lands exactly on the sampled frequency; contribute unity
        // rather than poisoning the grid.
        return Complex64::new(1.0, 0.0);
    }
    num / den
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peaking_center_gain_is_exact() {
        // RBJ peaking: |H| at the center frequency is exactly A² = 10^(gain/20)
        let params = BiquadParams::Peaking { freq: 1000.0, gain: 6.0, q: 1.0 };
        let h = response_at(&params, 1000.0, 48000.0);
        let gain_db = 20.0 * h.norm().log10();
        assert!(
            (gain_db - 6.0).abs() < 1e-9,
            "Peaking center gain should be 6 dB, got {}",
            gain_db
        );
    }

    #[test]
    fn peaking_far_from_center_is_flat() {
        let params = BiquadParams::Peaking { freq: 1000.0, gain: 6.0, q: 4.0 };
        let h = response_at(&params, 20.0, 48000.0);
        let gain_db = 20.0 * h.norm().log10();
        assert!(gain_db.abs() < 0.05, "Far-field gain should be ~0 dB, got {}", gain_db);
    }

    #[test]
    fn lowpass_dc_unity_nyquist_blocked() {
        let params = BiquadParams::Lowpass { freq: 1000.0, q: 0.7071 };
        let dc = response_at(&params, 0.0, 48000.0);
        assert!((dc.norm() - 1.0).abs() < 1e-12, "LP at DC should be unity, got {}", dc.norm());
        let ny = response_at(&params, 24000.0, 48000.0);
        assert!(ny.norm() < 1e-9, "LP at Nyquist should vanish, got {}", ny.norm());
    }

    #[test]
    fn allpass_magnitude_is_unity() {
        let params = BiquadParams::Allpass { freq: 500.0, q: 1.4 };
        for f in [10.0, 100.0, 500.0, 3000.0, 20000.0] {
            let h = response_at(&params, f, 48000.0);
            assert!(
                (h.norm() - 1.0).abs() < 1e-12,
                "Allpass |H| at {} Hz should be 1, got {}",
                f, h.norm()
            );
        }
    }

    #[test]
    fn lowshelf_dc_gain_and_nyquist_flat() {
        let params = BiquadParams::Lowshelf { freq: 1000.0, gain: 6.0, slope: 6.0 };
        let dc = response_at(&params, 0.0, 48000.0);
        let dc_db = 20.0 * dc.norm().log10();
        assert!((dc_db - 6.0).abs() < 1e-9, "Lowshelf DC should be +6 dB, got {}", dc_db);
        let ny = response_at(&params, 24000.0, 48000.0);
        let ny_db = 20.0 * ny.norm().log10();
        assert!(ny_db.abs() < 1e-9, "Lowshelf at Nyquist should be 0 dB, got {}", ny_db);
    }

    #[test]
    fn highshelf_mirrors_lowshelf() {
        let params = BiquadParams::Highshelf { freq: 1000.0, gain: -4.0, slope: 12.0 };
        let dc = response_at(&params, 0.0, 48000.0);
        assert!((20.0 * dc.norm().log10()).abs() < 1e-9);
        let ny = response_at(&params, 24000.0, 48000.0);
        assert!((20.0 * ny.norm().log10() + 4.0).abs() < 1e-9);
    }

    #[test]
    fn first_order_corner_is_minus_3db() {
        let params = BiquadParams::LowpassFO { freq: 1000.0 };
        let h = response_at(&params, 1000.0, 48000.0);
        let db = 20.0 * h.norm().log10();
        assert!((db + 3.0103).abs() < 0.02, "FO corner should be ~-3 dB, got {}", db);

        let dc = response_at(&params, 0.0, 48000.0);
        assert!((dc.norm() - 1.0).abs() < 1e-12);
    }
}
