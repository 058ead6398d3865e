use crate::termination::occurs_as_word;
use async_trait::async_trait;
use conclave_agent::{AgentDescriptor, AgentHandle, AgentRegistry};
use conclave_core::{ConclaveError, ConclaveResult, Speaker, Turn};
use conclave_session::ConversationState;
use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Picks the agent that speaks next, or `None` to end the session.
///
/// Strategies only read the state; the engine owns all mutation.
#[async_trait]
pub trait SelectionStrategy: Send + Sync {
    /// Select the next speaker from `registry`.
    async fn select<'a>(
        &self,
        state: &ConversationState,
        registry: &'a AgentRegistry,
    ) -> Option<&'a AgentDescriptor>;

    /// Check the strategy against a registry before any session runs.
    fn validate(&self, _registry: &AgentRegistry) -> ConclaveResult<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RoundRobin
// ---------------------------------------------------------------------------

/// Registry order, one agent per round. Failed rounds still advance the
/// rotation, so the speaker sequence has period N.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobin;

#[async_trait]
impl SelectionStrategy for RoundRobin {
    async fn select<'a>(
        &self,
        state: &ConversationState,
        registry: &'a AgentRegistry,
    ) -> Option<&'a AgentDescriptor> {
        if registry.is_empty() {
            return None;
        }
        registry.get_index(state.round() as usize % registry.len())
    }
}

// ---------------------------------------------------------------------------
// KeywordMatch
// ---------------------------------------------------------------------------

/// Rotates through the agents whose capability tag or name occurs in the task
/// request or scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordMatch;

impl KeywordMatch {
    /// Agents relevant to `state`'s task, in registration order.
    pub fn candidates<'a>(
        state: &ConversationState,
        registry: &'a AgentRegistry,
    ) -> Vec<&'a AgentDescriptor> {
        let task = state.task();
        let mut haystack = task.request.to_lowercase();
        if let Some(scope) = &task.metadata.scope {
            haystack.push('\n');
            haystack.push_str(&scope.to_lowercase());
        }

        registry
            .iter()
            .filter(|agent| {
                let tag = agent.capability.trim().to_lowercase();
                let spaced = tag.replace(['-', '_'], " ");
                let name = agent.name.to_lowercase();
                [tag, spaced, name]
                    .iter()
                    .any(|needle| !needle.is_empty() && haystack.contains(needle.as_str()))
            })
            .collect()
    }
}

#[async_trait]
impl SelectionStrategy for KeywordMatch {
    async fn select<'a>(
        &self,
        state: &ConversationState,
        registry: &'a AgentRegistry,
    ) -> Option<&'a AgentDescriptor> {
        let candidates = Self::candidates(state, registry);
        if candidates.is_empty() {
            debug!(task_id = %state.task().id, "No agent matches the task keywords");
            return None;
        }
        candidates
            .get(state.round() as usize % candidates.len())
            .copied()
    }
}

// ---------------------------------------------------------------------------
// LeadAgent
// ---------------------------------------------------------------------------

/// The lead answers whenever the user or orchestrator spoke last; otherwise
/// the remaining agents take turns in registration order.
#[derive(Debug, Clone)]
pub struct LeadAgent {
    lead: String,
}

impl LeadAgent {
    /// Creates the strategy with `lead` as the agent answering the user.
    pub fn new(lead: impl Into<String>) -> Self {
        Self { lead: lead.into() }
    }

    /// Name of the lead agent.
    pub fn lead(&self) -> &str {
        &self.lead
    }
}

#[async_trait]
impl SelectionStrategy for LeadAgent {
    async fn select<'a>(
        &self,
        state: &ConversationState,
        registry: &'a AgentRegistry,
    ) -> Option<&'a AgentDescriptor> {
        let lead = registry.get(&self.lead)?;
        let agent_streak = state
            .turns()
            .iter()
            .rev()
            .take_while(|t| t.speaker.is_agent())
            .count();
        if agent_streak == 0 {
            return Some(lead);
        }

        let followers: Vec<&AgentDescriptor> =
            registry.iter().filter(|a| a.name != self.lead).collect();
        if followers.is_empty() {
            return Some(lead);
        }
        followers
            .get((agent_streak - 1) % followers.len())
            .copied()
    }

    fn validate(&self, registry: &AgentRegistry) -> ConclaveResult<()> {
        if registry.get(&self.lead).is_none() {
            return Err(ConclaveError::config(format!(
                "lead agent '{}' is not registered",
                self.lead
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ModeratorSelection
// ---------------------------------------------------------------------------

/// Asks a moderator agent who should speak next.
///
/// The moderator sees the transcript plus an orchestrator turn listing the
/// registered agents. Agent names are looked up in its reply as whole words,
/// ignoring case; see [`ModeratorSelection::named_in_reply`]. A reply of
/// `NONE`, a reply naming nobody, an error, or a timeout ends the session.
pub struct ModeratorSelection {
    moderator: Arc<dyn AgentHandle>,
    timeout: Duration,
}

impl ModeratorSelection {
    /// Creates the strategy; each consultation is bounded by `timeout`.
    pub fn new(moderator: Arc<dyn AgentHandle>, timeout: Duration) -> Self {
        Self { moderator, timeout }
    }

    fn briefing(state: &ConversationState, registry: &AgentRegistry) -> Vec<Turn> {
        let roster = registry
            .iter()
            .map(|a| format!("- {} ({})", a.name, a.capability))
            .collect::<Vec<_>>()
            .join("\n");
        let mut transcript = state.turns().to_vec();
        transcript.push(Turn::new(
            state.next_sequence(),
            Speaker::Orchestrator,
            format!(
                "Choose who speaks next. Reply with one agent name, or NONE if the review is finished.\n{roster}"
            ),
        ));
        transcript
    }

    /// The agent a moderator reply names.
    ///
    /// When several names occur, a reply that is exactly one name wins, then
    /// the longest name, then registration order.
    pub fn named_in_reply<'a>(
        reply: &str,
        registry: &'a AgentRegistry,
    ) -> Option<&'a AgentDescriptor> {
        let reply = reply.trim().to_lowercase();
        let bare = reply.trim_matches(|c: char| !c.is_alphanumeric());
        if bare == "none" {
            return None;
        }
        registry
            .iter()
            .enumerate()
            .filter_map(|(index, agent)| {
                let name = agent.name.to_lowercase();
                occurs_as_word(&reply, &name)
                    .then(|| ((name == bare, name.len(), Reverse(index)), agent))
            })
            .max_by_key(|(rank, _)| *rank)
            .map(|(_, agent)| agent)
    }
}

#[async_trait]
impl SelectionStrategy for ModeratorSelection {
    async fn select<'a>(
        &self,
        state: &ConversationState,
        registry: &'a AgentRegistry,
    ) -> Option<&'a AgentDescriptor> {
        let transcript = Self::briefing(state, registry);
        let reply = match tokio::time::timeout(self.timeout, self.moderator.invoke(&transcript)).await
        {
            Ok(Ok(reply)) => reply.content,
            Ok(Err(e)) => {
                warn!(error = %e, "Moderator failed to pick a speaker");
                return None;
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Moderator timed out");
                return None;
            }
        };
        let picked = Self::named_in_reply(&reply, registry);
        if picked.is_none() {
            debug!(reply = %reply, "Moderator reply names no registered agent");
        }
        picked
    }
}
