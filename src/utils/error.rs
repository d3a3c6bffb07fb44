use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },
}

pub type Result<T> = std::result::Result<T, FeedError>;

/// Failure of a repository refresh. Recovered locally and shown to the
/// user as an error notice, so `Display` is the user-facing text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("{message}")]
    Remote { message: String },

    #[error("refresh timed out after {after_ms}ms")]
    TimedOut { after_ms: u64 },
}

impl RefreshError {
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }
}

/// Failure of a live query itself. Surfaced through `results`, never
/// folded into the refresh error notice.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataSequenceError {
    #[error("live query unavailable: {message}")]
    Unavailable { message: String },
}

impl DataSequenceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}
