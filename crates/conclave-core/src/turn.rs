use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of the content of every synthetic failure turn.
pub const FAILURE_MARKER_PREFIX: &str = "[agent-failure:";

/// Who authored a [`Turn`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    /// The caller that submitted the task.
    User,
    /// The orchestration engine itself.
    Orchestrator,
    /// A registered agent, by name.
    Agent(String),
}

impl Speaker {
    /// Creates an agent speaker.
    pub fn agent(name: impl Into<String>) -> Self {
        Speaker::Agent(name.into())
    }

    /// The display name of this speaker.
    pub fn name(&self) -> &str {
        match self {
            Speaker::User => "user",
            Speaker::Orchestrator => "orchestrator",
            Speaker::Agent(name) => name,
        }
    }

    /// The agent name, if this speaker is an agent.
    pub fn agent_name(&self) -> Option<&str> {
        match self {
            Speaker::Agent(name) => Some(name),
            _ => None,
        }
    }

    /// Whether this speaker is a registered agent.
    pub fn is_agent(&self) -> bool {
        matches!(self, Speaker::Agent(_))
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why an agent invocation did not produce a usable reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentFailureKind {
    /// The invocation exceeded its timeout.
    Timeout,
    /// The agent returned an error.
    InvocationError,
    /// The agent replied, but the reply was unusable.
    MalformedReply,
}

impl fmt::Display for AgentFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentFailureKind::Timeout => write!(f, "timeout"),
            AgentFailureKind::InvocationError => write!(f, "invocation_error"),
            AgentFailureKind::MalformedReply => write!(f, "malformed_reply"),
        }
    }
}

/// A single recorded utterance within a session transcript.
///
/// Sequence numbers are assigned by the conversation state on append, never
/// by the speaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Position in the transcript, starting at 0.
    pub sequence: u64,
    /// Author of this turn.
    pub speaker: Speaker,
    /// Text content.
    pub content: String,
    /// UTC timestamp of when the turn was recorded.
    pub timestamp: DateTime<Utc>,
    /// Set on synthetic turns that record an agent failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<AgentFailureKind>,
}

impl Turn {
    /// Creates a regular turn.
    pub fn new(sequence: u64, speaker: Speaker, content: impl Into<String>) -> Self {
        Self {
            sequence,
            speaker,
            content: content.into(),
            timestamp: Utc::now(),
            failure: None,
        }
    }

    /// Creates a synthetic turn recording a failed agent invocation.
    pub fn failure(
        sequence: u64,
        agent: impl Into<String>,
        kind: AgentFailureKind,
        detail: impl AsRef<str>,
    ) -> Self {
        Self {
            sequence,
            speaker: Speaker::Agent(agent.into()),
            content: format!("{FAILURE_MARKER_PREFIX}{kind}] {}", detail.as_ref()),
            timestamp: Utc::now(),
            failure: Some(kind),
        }
    }

    /// Whether this turn records a failed invocation.
    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}
