pub mod editor;
pub mod error;
pub mod filters;
pub mod fir;
pub mod response;

pub use editor::{ApplySink, ConvParameters, DesignReport, EditorSession, SettingsSink};
pub use error::{DesignError, Result};
pub use filters::{BiquadParams, FilterDesc};
pub use fir::{FirDesign, FirDesignSettings, FirTaps, WindowKind, design};
pub use response::{
    ResponseCurves, chain_response, combined_curves, fir_response, group_delay_seconds, to_db,
    unwrap_phase,
};
