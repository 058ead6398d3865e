use chrono::{DateTime, Utc};
use conclave_core::{AgentFailureKind, Speaker, Task, Turn};
use serde::Serialize;
use uuid::Uuid;

/// The transcript and round counter of one session.
///
/// Turns can only be appended. Sequence numbers are assigned here, so they
/// are strictly increasing and gap-free by construction.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationState {
    session_id: Uuid,
    task: Task,
    participants: Vec<String>,
    turns: Vec<Turn>,
    round: u32,
    started_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ConversationState {
    /// Creates an empty state for `task` with the given agent roster.
    pub fn new(task: Task, participants: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            task,
            participants,
            turns: Vec::new(),
            round: 0,
            started_at: now,
            updated_at: now,
        }
    }

    /// Creates a state whose first turn is the task prompt, spoken by the user.
    pub fn seeded(task: Task, participants: Vec<String>) -> Self {
        let prompt = task.prompt();
        let mut state = Self::new(task, participants);
        state.append(Speaker::User, prompt);
        state
    }

    /// Appends a turn without counting a round.
    pub fn append(&mut self, speaker: Speaker, content: impl Into<String>) -> &Turn {
        let turn = Turn::new(self.next_sequence(), speaker, content);
        self.push(turn)
    }

    /// Appends an agent reply and counts one round.
    pub fn record_reply(&mut self, agent: &str, content: impl Into<String>) -> &Turn {
        self.round += 1;
        self.append(Speaker::agent(agent), content)
    }

    /// Appends a synthetic failure turn for `agent` and counts one round.
    pub fn record_failure(
        &mut self,
        agent: &str,
        kind: AgentFailureKind,
        detail: impl AsRef<str>,
    ) -> &Turn {
        self.round += 1;
        let turn = Turn::failure(self.next_sequence(), agent, kind, detail);
        self.push(turn)
    }

    fn push(&mut self, turn: Turn) -> &Turn {
        self.updated_at = turn.timestamp;
        self.turns.push(turn);
        &self.turns[self.turns.len() - 1]
    }

    /// Sequence number the next appended turn will receive.
    pub fn next_sequence(&self) -> u64 {
        self.turns.len() as u64
    }

    /// Unique id of this session.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// The task under review.
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Registered agent names in registration order.
    pub fn participants(&self) -> &[String] {
        &self.participants
    }

    /// The full transcript in speaking order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of agent rounds executed so far.
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Number of recorded turns, including the seeded request.
    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// The most recent turn.
    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// The most recent turn spoken by an agent.
    pub fn last_agent_turn(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.speaker.is_agent())
    }

    /// Whether `agent` has at least one turn, failed or not.
    pub fn has_spoken(&self, agent: &str) -> bool {
        self.turns
            .iter()
            .any(|t| t.speaker.agent_name() == Some(agent))
    }

    /// Whether every participant has at least one turn.
    pub fn all_participants_spoke(&self) -> bool {
        self.participants.iter().all(|p| self.has_spoken(p))
    }

    /// Agent names in order of first appearance in the transcript.
    pub fn speakers_in_order(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for turn in &self.turns {
            if let Some(name) = turn.speaker.agent_name() {
                if !seen.contains(&name) {
                    seen.push(name);
                }
            }
        }
        seen
    }

    /// When the session was created.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When the last turn was appended.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn roster() -> Vec<String> {
        vec!["PolicyAgent".to_string(), "DataResidencyAgent".to_string()]
    }

    #[test]
    fn test_seeded_state_starts_with_user_request() {
        let state = ConversationState::seeded(Task::new("Check GDPR data residency"), roster());
        assert_eq!(state.turn_count(), 1);
        assert_eq!(state.round(), 0);
        let first = state.last_turn().unwrap();
        assert_eq!(first.sequence, 0);
        assert_eq!(first.speaker, Speaker::User);
        assert!(state.last_agent_turn().is_none());
    }

    #[test]
    fn test_sequences_are_gap_free() {
        let mut state = ConversationState::seeded(Task::new("t"), roster());
        state.record_reply("PolicyAgent", "reviewing...");
        state.record_failure("DataResidencyAgent", AgentFailureKind::Timeout, "slow");
        state.append(Speaker::Orchestrator, "note");
        state.record_reply("PolicyAgent", "DONE");

        for (i, turn) in state.turns().iter().enumerate() {
            assert_eq!(turn.sequence, i as u64);
        }
        assert_eq!(state.round(), 3);
        assert_eq!(state.next_sequence(), 5);
    }

    #[test]
    fn test_failures_count_as_rounds_and_as_spoken() {
        let mut state = ConversationState::seeded(Task::new("t"), roster());
        state.record_failure("PolicyAgent", AgentFailureKind::InvocationError, "boom");
        assert_eq!(state.round(), 1);
        assert!(state.has_spoken("PolicyAgent"));
        assert!(!state.all_participants_spoke());
        assert!(state.last_agent_turn().unwrap().is_failure());
    }

    #[test]
    fn test_speakers_in_first_appearance_order() {
        let mut state = ConversationState::seeded(Task::new("t"), roster());
        state.record_reply("DataResidencyAgent", "a");
        state.record_reply("PolicyAgent", "b");
        state.record_reply("DataResidencyAgent", "c");
        assert_eq!(
            state.speakers_in_order(),
            vec!["DataResidencyAgent", "PolicyAgent"]
        );
        assert!(state.all_participants_spoke());
    }
}
