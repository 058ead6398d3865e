use crate::error::AgentError;
use crate::handle::{AgentHandle, AgentReply};
use async_trait::async_trait;
use conclave_core::Turn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Configures retry behaviour for transient agent failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub backoff_base_ms: u64,
    /// Maximum delay in milliseconds (cap for exponential backoff).
    pub backoff_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base_ms: 250,
            backoff_max_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// Backoff delay before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let delay = self
            .backoff_base_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(delay.min(self.backoff_max_ms))
    }
}

/// Wraps an agent and retries retryable failures with exponential backoff.
///
/// The engine's per-agent timeout still bounds the whole call, retries
/// included.
pub struct RetryingAgent {
    inner: Arc<dyn AgentHandle>,
    policy: RetryPolicy,
}

impl RetryingAgent {
    /// Wraps `inner` with `policy`.
    pub fn new(inner: Arc<dyn AgentHandle>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl AgentHandle for RetryingAgent {
    async fn invoke(&self, transcript: &[Turn]) -> Result<AgentReply, AgentError> {
        let mut attempt = 0;
        loop {
            match self.inner.invoke(transcript).await {
                Ok(reply) => return Ok(reply),
                Err(e) if !e.is_retryable() => {
                    warn!(attempt, error = %e, "Non-retryable agent error");
                    return Err(e);
                }
                Err(e) if attempt >= self.policy.max_retries => {
                    warn!(attempt, error = %e, "Agent retries exhausted");
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.policy.backoff(attempt);
                    info!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retryable agent error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
