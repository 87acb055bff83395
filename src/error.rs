use thiserror::Error;

/// Errors raised while assembling the session configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("unsupported step count {0} (expected 24, 32 or 48)")]
    UnsupportedSteps(usize),
    #[error("tempo must be between {min} and {max} BPM, got {bpm}")]
    TempoOutOfRange { bpm: f64, min: f64, max: f64 },
    #[error("MIDI channel must be 1..=16, got {0}")]
    InvalidChannel(u8),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
