use serde::Serialize;

pub type Result<T> = std::result::Result<T, DesignError>;

#[derive(Debug, thiserror::Error)]
pub enum DesignError {
    #[error("Invalid sample rate: {value} (must be finite and positive)")]
    InvalidSampleRate { value: f64 },

    #[error("Invalid correction band: {low_hz}..{high_hz} Hz")]
    InvalidBand { low_hz: f64, high_hz: f64 },

    #[error("Invalid tap array: {message}")]
    InvalidTaps { message: String },

    #[error("Settings version {found} is newer than supported (max {max})")]
    SettingsVersion { found: u32, max: u32 },
}

// Serialize DesignError as its display string for the dashboard boundary
impl Serialize for DesignError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
