use crate::error::AgentError;
use async_trait::async_trait;
use conclave_core::Turn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One reply produced by an agent.
///
/// The engine turns it into a [`Turn`] and assigns the sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    /// Reply text.
    pub content: String,
    /// Arbitrary metadata (token usage, model id, ...). Not part of the transcript.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl AgentReply {
    /// Creates a reply with no metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attaches a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Rejects replies with no usable content.
    pub fn validate(self) -> Result<Self, AgentError> {
        if self.content.trim().is_empty() {
            return Err(AgentError::MalformedReply("reply is empty".into()));
        }
        Ok(self)
    }
}

/// A named capability that reads a transcript and produces one reply.
///
/// Implementations may be backed by a remote model, by rules, or by a human.
/// The engine awaits at most one call per session at a time and enforces its
/// own timeout around `invoke`.
#[async_trait]
pub trait AgentHandle: Send + Sync {
    /// Produce the next reply given the transcript so far.
    async fn invoke(&self, transcript: &[Turn]) -> Result<AgentReply, AgentError>;
}
