use crate::error::AgentError;
use crate::handle::{AgentHandle, AgentReply};
use async_trait::async_trait;
use conclave_core::{Speaker, Turn};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Role of a message sent to a chat backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Anything not said by this agent.
    User,
    /// This agent's own earlier replies.
    Assistant,
}

/// A single message in a chat completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
}

/// Boundary to a model-serving endpoint.
///
/// Credentials, HTTP clients and provider quirks live behind this trait; the
/// orchestration engine never sees them.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Non-streaming chat completion returning the reply text.
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
    ) -> Result<String, AgentError>;
}

/// Agent whose replies come from a remote model.
///
/// The transcript is rendered as a chat: the agent's own turns become
/// assistant messages and every other turn becomes a user message prefixed
/// with its speaker, e.g. `[PolicyAgent]: reviewing...`.
pub struct ModelAgent<B> {
    name: String,
    instructions: Option<String>,
    history_window: Option<usize>,
    backend: B,
}

impl<B: ChatBackend> ModelAgent<B> {
    /// Creates a model agent speaking as `name`.
    pub fn new(name: impl Into<String>, backend: B) -> Self {
        Self {
            name: name.into(),
            instructions: None,
            history_window: None,
            backend,
        }
    }

    /// Sets the system prompt.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Only send the first turn (the task) plus the last `turns` turns.
    pub fn with_history_window(mut self, turns: usize) -> Self {
        self.history_window = Some(turns);
        self
    }

    /// Renders a transcript as chat messages.
    pub fn render(&self, transcript: &[Turn]) -> Vec<ChatMessage> {
        let window: Vec<&Turn> = match self.history_window {
            Some(n) if transcript.len() > n + 1 => transcript
                .iter()
                .take(1)
                .chain(transcript.iter().skip(transcript.len() - n))
                .collect(),
            _ => transcript.iter().collect(),
        };

        window
            .into_iter()
            .filter(|t| !(t.is_failure() && t.speaker.agent_name() == Some(self.name.as_str())))
            .map(|t| match &t.speaker {
                Speaker::Agent(name) if *name == self.name => ChatMessage {
                    role: ChatRole::Assistant,
                    content: t.content.clone(),
                },
                speaker => ChatMessage {
                    role: ChatRole::User,
                    content: format!("[{speaker}]: {}", t.content),
                },
            })
            .collect()
    }
}

#[async_trait]
impl<B: ChatBackend> AgentHandle for ModelAgent<B> {
    async fn invoke(&self, transcript: &[Turn]) -> Result<AgentReply, AgentError> {
        let messages = self.render(transcript);
        debug!(agent = %self.name, messages = messages.len(), "Calling chat backend");

        let text = self
            .backend
            .complete(self.instructions.as_deref(), &messages)
            .await
            .inspect_err(|e| warn!(agent = %self.name, error = %e, "Chat backend failed"))?;

        AgentReply::new(text.trim()).validate()
    }
}
