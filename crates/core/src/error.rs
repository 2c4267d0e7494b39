use thiserror::Error;

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Caller-facing failures. Reporting gaps (missing taxonomy, zero totals,
/// sparse calendars) are never surfaced through this type.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Invalid analysis window: {0}")]
    InvalidWindow(String),

    #[error("Calendar error: {0}")]
    Calendar(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for LifecycleError {
    fn from(err: config::ConfigError) -> Self {
        LifecycleError::Config(err.to_string())
    }
}
