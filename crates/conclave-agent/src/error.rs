use conclave_core::AgentFailureKind;
use thiserror::Error;

/// Why an agent invocation failed.
///
/// These never abort a session; the engine records them as failure turns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// No reply within the allotted time.
    #[error("no reply within {timeout_ms}ms")]
    Timeout {
        /// The timeout that expired, in milliseconds.
        timeout_ms: u64,
    },

    /// The agent or its backend reported an error.
    #[error("invocation failed: {0}")]
    Invocation(String),

    /// The agent replied with something unusable.
    #[error("malformed reply: {0}")]
    MalformedReply(String),
}

impl AgentError {
    /// Shorthand for [`AgentError::Invocation`].
    pub fn invocation(msg: impl Into<String>) -> Self {
        AgentError::Invocation(msg.into())
    }

    /// The failure kind recorded in the transcript.
    pub fn kind(&self) -> AgentFailureKind {
        match self {
            AgentError::Timeout { .. } => AgentFailureKind::Timeout,
            AgentError::Invocation(_) => AgentFailureKind::InvocationError,
            AgentError::MalformedReply(_) => AgentFailureKind::MalformedReply,
        }
    }

    /// Whether retrying the same call might succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AgentError::MalformedReply(_))
    }
}
