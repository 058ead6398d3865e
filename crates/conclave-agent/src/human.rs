use crate::error::AgentError;
use crate::handle::{AgentHandle, AgentReply};
use async_trait::async_trait;
use conclave_core::Turn;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// A request for a human reviewer to speak on behalf of an agent.
///
/// Answer it with [`HumanPrompt::respond`]. Dropping it fails the invocation.
#[derive(Debug)]
pub struct HumanPrompt {
    /// Name of the agent the human speaks for.
    pub agent: String,
    /// Transcript so far.
    pub transcript: Vec<Turn>,
    reply: oneshot::Sender<String>,
}

impl HumanPrompt {
    /// Sends the reviewer's reply. Returns `false` if nobody is waiting anymore.
    pub fn respond(self, content: impl Into<String>) -> bool {
        self.reply.send(content.into()).is_ok()
    }
}

/// Human-in-the-loop agent.
///
/// Each invocation is forwarded as a [`HumanPrompt`] through a channel (to a
/// console, a dashboard, a chat bot...) and the reply is awaited.
pub struct HumanAgent {
    name: String,
    prompts: mpsc::Sender<HumanPrompt>,
    timeout: Option<Duration>,
}

impl HumanAgent {
    /// Creates an agent and the receiving end its prompts arrive on.
    pub fn channel(name: impl Into<String>, buffer: usize) -> (Self, mpsc::Receiver<HumanPrompt>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            Self {
                name: name.into(),
                prompts: tx,
                timeout: None,
            },
            rx,
        )
    }

    /// Gives up waiting for the reviewer after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl AgentHandle for HumanAgent {
    async fn invoke(&self, transcript: &[Turn]) -> Result<AgentReply, AgentError> {
        let (tx, rx) = oneshot::channel();
        let prompt = HumanPrompt {
            agent: self.name.clone(),
            transcript: transcript.to_vec(),
            reply: tx,
        };

        self.prompts
            .send(prompt)
            .await
            .map_err(|_| AgentError::invocation("no reviewer is attached"))?;
        info!(agent = %self.name, "Waiting for human reply");

        let answer = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, rx).await {
                Ok(answer) => answer,
                Err(_) => {
                    warn!(agent = %self.name, timeout_ms = timeout.as_millis() as u64, "Human reply timed out");
                    return Err(AgentError::Timeout {
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
            },
            None => rx.await,
        };

        let content = answer.map_err(|_| AgentError::invocation("reviewer dismissed the prompt"))?;
        AgentReply::new(content).validate()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use conclave_core::Speaker;

    fn transcript() -> Vec<Turn> {
        vec![Turn::new(0, Speaker::User, "Approve the retention exception?")]
    }

    #[tokio::test]
    async fn test_reply_is_forwarded() {
        let (agent, mut prompts) = HumanAgent::channel("Reviewer", 1);
        let reviewer = tokio::spawn(async move {
            let prompt = prompts.recv().await.unwrap();
            assert_eq!(prompt.agent, "Reviewer");
            assert_eq!(prompt.transcript.len(), 1);
            prompt.respond("approved with conditions")
        });

        let reply = agent.invoke(&transcript()).await.unwrap();
        assert_eq!(reply.content, "approved with conditions");
        assert!(reviewer.await.unwrap());
    }

    #[tokio::test]
    async fn test_dropped_prompt_is_invocation_error() {
        let (agent, mut prompts) = HumanAgent::channel("Reviewer", 1);
        tokio::spawn(async move {
            let prompt = prompts.recv().await.unwrap();
            drop(prompt);
        });

        let err = agent.invoke(&transcript()).await.unwrap_err();
        assert!(matches!(err, AgentError::Invocation(_)));
    }

    #[tokio::test]
    async fn test_no_receiver_is_invocation_error() {
        let (agent, prompts) = HumanAgent::channel("Reviewer", 1);
        drop(prompts);
        let err = agent.invoke(&transcript()).await.unwrap_err();
        assert!(matches!(err, AgentError::Invocation(_)));
    }

    #[tokio::test]
    async fn test_timeout() {
        let (agent, _prompts) = HumanAgent::channel("Reviewer", 1);
        let agent = agent.with_timeout(Duration::from_millis(20));
        let err = agent.invoke(&transcript()).await.unwrap_err();
        assert_eq!(err, AgentError::Timeout { timeout_ms: 20 });
    }
}
