use thiserror::Error;

/// A convenience `Result` alias using [`ConclaveError`].
pub type ConclaveResult<T> = Result<T, ConclaveError>;

/// Top-level error type for the Conclave framework.
///
/// Only [`ConclaveError::Config`] aborts a session before it starts. Agent
/// failures during a session are recorded in the transcript instead of being
/// raised.
#[derive(Error, Debug)]
pub enum ConclaveError {
    /// Invalid configuration: empty registry, bad limits, unknown agent names.
    #[error("Config error: {0}")]
    Config(String),

    /// An error related to conversation state or transcript persistence.
    #[error("Session error: {0}")]
    Session(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConclaveError {
    /// Shorthand for building a [`ConclaveError::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        ConclaveError::Config(msg.into())
    }

    /// Whether this error is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, ConclaveError::Config(_))
    }
}
