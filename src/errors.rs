//! Error types for the pattern-recognition toolkit
//!
//! Algorithms degrade to empty output on shape problems; these errors only
//! cover configuration, I/O and batches that cannot be analysed at all.

use thiserror::Error;

/// Pattern-recognition error type
#[derive(Debug, Error)]
pub enum PatternError {
    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Input that cannot be processed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Feature vectors of one batch disagree on their dimension
    #[error("Feature dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// Unknown file extension or payload shape
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Pattern-recognition result type
pub type Result<T> = std::result::Result<T, PatternError>;

impl PatternError {
    /// Whether the caller can fix the problem and retry with the same process
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::InvalidInput(_)
                | Self::DimensionMismatch { .. }
                | Self::UnsupportedFormat(_)
        )
    }

    /// Short context string for log lines
    pub fn context(&self) -> String {
        match self {
            Self::DimensionMismatch { expected, found } => {
                format!("expected {} features, got {}", expected, found)
            }
            Self::UnsupportedFormat(what) => format!("Format: {}", what),
            _ => "No additional context".to_string(),
        }
    }
}
