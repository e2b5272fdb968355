// Editing-session state machine: owns one correction filter's current /
// applied / undo tap state and hands results to the host through sink traits.
// All design math stays in `fir`; this module never recomputes anything.

use serde::Serialize;
use tracing::{debug, info};

use crate::filters::FilterDesc;
use crate::fir::{self, FirDesign, FirDesignSettings, FirTaps};

/// Recommended debounce for the persistence path. Each apply fully replaces
/// the filter configuration, so a superseded write is simply dropped.
pub const APPLY_DEBOUNCE_MS: u64 = 150;

// ---------------------------------------------------------------------------
// Boundary payloads
// ---------------------------------------------------------------------------

/// Tap payload written into the owning filter's configuration slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ConvParameters {
    Values { values: Vec<f64> },
}

impl From<&FirTaps> for ConvParameters {
    fn from(taps: &FirTaps) -> Self {
        ConvParameters::Values { values: taps.values().to_vec() }
    }
}

/// Designer outcome in boundary form: the tap payload or a human-readable
/// error string, plus zero or more warning strings.
#[derive(Debug, Clone, Serialize)]
pub struct DesignReport {
    pub taps: Option<ConvParameters>,
    pub error: Option<String>,
    pub warnings: Vec<String>,
}

impl From<crate::error::Result<FirDesign>> for DesignReport {
    fn from(result: crate::error::Result<FirDesign>) -> Self {
        match result {
            Ok(design) => DesignReport {
                taps: Some(ConvParameters::from(&design.taps)),
                error: None,
                warnings: design.warnings.iter().map(|w| w.to_string()).collect(),
            },
            Err(err) => DesignReport {
                taps: None,
                error: Some(err.to_string()),
                warnings: Vec::new(),
            },
        }
    }
}

/// Run the designer and package the outcome for the dashboard. Pure: never
/// touches any session state.
pub fn preview(
    sample_rate: f64,
    settings: &FirDesignSettings,
    selected: &[FilterDesc],
) -> DesignReport {
    DesignReport::from(fir::design(sample_rate, settings, selected))
}

// ---------------------------------------------------------------------------
// Host seams
// ---------------------------------------------------------------------------

/// Receives the tap payload for the owning filter's configuration slot.
/// Hosts should debounce writes by [`APPLY_DEBOUNCE_MS`].
pub trait ApplySink {
    fn apply(&mut self, taps: &ConvParameters);
}

/// Persists designer settings keyed by the owning filter's stable name.
pub trait SettingsSink {
    fn persist(&mut self, filter_name: &str, settings: &FirDesignSettings);
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One editing session's mutable state. Created when the editor opens,
/// discarded when it closes; nothing here is persisted beyond explicit apply.
#[derive(Debug)]
pub struct EditorSession {
    current: FirTaps,
    undo_stack: Vec<FirTaps>,
    baseline: Option<FirTaps>,
    last_applied: Option<FirTaps>,
    filter_name: Option<String>,
    pending_settings: Option<FirDesignSettings>,
}

impl Default for EditorSession {
    fn default() -> Self {
        EditorSession::new()
    }
}

impl EditorSession {
    pub fn new() -> Self {
        EditorSession {
            current: FirTaps::identity(),
            undo_stack: Vec::new(),
            baseline: None,
            last_applied: None,
            filter_name: None,
            pending_settings: None,
        }
    }

    pub fn current(&self) -> &FirTaps {
        &self.current
    }

    /// Enabled means the session holds a real correction, not `[1.0]`.
    pub fn is_enabled(&self) -> bool {
        !self.current.is_identity()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn baseline(&self) -> Option<&FirTaps> {
        self.baseline.as_ref()
    }

    pub fn last_applied(&self) -> Option<&FirTaps> {
        self.last_applied.as_ref()
    }

    /// Current taps in configuration-slot form, for hosts writing back after
    /// undo / reset / toggle.
    pub fn payload(&self) -> ConvParameters {
        ConvParameters::from(&self.current)
    }

    /// Capture the session baseline from the owning configuration slot.
    /// Only the first non-empty, valid observation sticks; later calls are
    /// ignored so mid-session engine updates cannot move the reset target.
    pub fn observe_baseline(&mut self, values: &[f64]) {
        if self.baseline.is_some() || values.is_empty() {
            return;
        }
        match FirTaps::new(values.to_vec()) {
            Ok(taps) => {
                debug!("baseline captured: {} taps", taps.len());
                self.baseline = Some(taps);
            }
            Err(err) => debug!("ignoring invalid baseline candidate: {}", err),
        }
    }

    /// Adopt `taps` as the current correction, remember the previous state
    /// for undo, notify the apply sink, and persist the settings that
    /// produced it (buffered until the owning filter's name is known).
    pub fn apply(
        &mut self,
        taps: FirTaps,
        settings: &FirDesignSettings,
        apply_sink: &mut dyn ApplySink,
        settings_sink: &mut dyn SettingsSink,
    ) {
        if self.current != taps {
            self.undo_stack.push(self.current.clone());
            self.current = taps;
        }
        info!(
            "apply: {} taps (undo depth {})",
            self.current.len(),
            self.undo_stack.len()
        );
        apply_sink.apply(&ConvParameters::from(&self.current));
        self.persist_settings(settings.clone(), settings_sink);
    }

    /// Pop the undo stack into `current`. Returns false when there was
    /// nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.undo_stack.pop() {
            Some(previous) => {
                debug!("undo: restored {} taps", previous.len());
                self.current = previous;
                true
            }
            None => false,
        }
    }

    /// Restore the captured baseline and clear the undo history. No-op when
    /// no baseline was ever observed.
    pub fn reset_to_baseline(&mut self) -> bool {
        match &self.baseline {
            Some(baseline) => {
                debug!("reset to baseline: {} taps", baseline.len());
                self.current = baseline.clone();
                self.undo_stack.clear();
                true
            }
            None => false,
        }
    }

    /// True when enabling from the identity state would adopt a real
    /// correction: a previously applied one, or a non-identity preview.
    pub fn can_enable_from_identity(&self, preview: Option<&FirTaps>) -> bool {
        self.last_applied.as_ref().map_or(false, |t| !t.is_identity())
            || preview.map_or(false, |t| !t.is_identity())
    }

    /// Toggle the correction. Disabling parks the current taps in
    /// `last_applied` and swaps in identity; enabling restores `last_applied`
    /// or, failing that, adopts the supplied preview. Returns whether the
    /// current taps changed.
    pub fn set_enabled(&mut self, enabled: bool, preview: Option<&FirTaps>) -> bool {
        if enabled {
            if self.is_enabled() {
                return false;
            }
            let candidate = self
                .last_applied
                .clone()
                .or_else(|| preview.cloned())
                .filter(|t| !t.is_identity());
            match candidate {
                Some(taps) => {
                    debug!("enable: restored {} taps", taps.len());
                    self.current = taps;
                    true
                }
                None => false,
            }
        } else {
            if !self.is_enabled() {
                return false;
            }
            debug!("disable: parking {} taps", self.current.len());
            self.last_applied = Some(self.current.clone());
            self.undo_stack.push(self.current.clone());
            self.current = FirTaps::identity();
            true
        }
    }

    /// Assign the owning filter's stable name and flush any settings write
    /// buffered while it was unknown.
    pub fn bind_filter_name(
        &mut self,
        name: impl Into<String>,
        settings_sink: &mut dyn SettingsSink,
    ) {
        let name = name.into();
        if let Some(settings) = self.pending_settings.take() {
            info!("flushing buffered settings for '{}'", name);
            settings_sink.persist(&name, &settings);
        }
        self.filter_name = Some(name);
    }

    fn persist_settings(&mut self, settings: FirDesignSettings, sink: &mut dyn SettingsSink) {
        match &self.filter_name {
            Some(name) => sink.persist(name, &settings),
            None => {
                debug!("settings buffered until the owning filter is named");
                self.pending_settings = Some(settings);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
