use conclave_core::{Speaker, TerminationSignal};
use conclave_session::ConversationState;
use serde::{Deserialize, Serialize};

/// How a completion marker is recognised in a turn's content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerMatch {
    /// The trimmed content equals the marker.
    Exact,
    /// The marker appears as a whole word or phrase: neither neighbour of the
    /// occurrence is alphanumeric. `"DONE."` and `"DONE。"` match `DONE`,
    /// `"UNDONE"` does not, and a marker may contain spaces.
    #[default]
    Token,
    /// The marker appears anywhere, case-sensitive.
    Contains,
    /// The marker appears anywhere, ignoring case.
    ContainsIgnoreCase,
}

impl MarkerMatch {
    /// Whether `content` carries `marker`.
    pub fn matches(&self, content: &str, marker: &str) -> bool {
        if marker.is_empty() {
            return false;
        }
        match self {
            MarkerMatch::Exact => content.trim() == marker,
            MarkerMatch::Token => occurs_as_word(content, marker),
            MarkerMatch::Contains => content.contains(marker),
            MarkerMatch::ContainsIgnoreCase => {
                content.to_lowercase().contains(&marker.to_lowercase())
            }
        }
    }
}

/// Whether `needle` occurs in `haystack` with no alphanumeric character
/// directly before or after it.
pub(crate) fn occurs_as_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric)
            && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Decides whether a session should stop before the next round.
///
/// Implementations must be pure functions of the state: no side effects and
/// no agent calls.
pub trait TerminationPolicy: Send + Sync {
    /// The signal to stop with, or `None` to keep going.
    fn evaluate(&self, state: &ConversationState) -> Option<TerminationSignal>;

    /// Whether the session is complete.
    fn is_complete(&self, state: &ConversationState) -> bool {
        self.evaluate(state).is_some()
    }
}

/// Stops once the round count reaches the maximum.
#[derive(Debug, Clone)]
pub struct MaxRoundsPolicy {
    max_rounds: u32,
}

impl MaxRoundsPolicy {
    /// Creates the policy.
    pub fn new(max_rounds: u32) -> Self {
        Self { max_rounds }
    }
}

impl TerminationPolicy for MaxRoundsPolicy {
    fn evaluate(&self, state: &ConversationState) -> Option<TerminationSignal> {
        (state.round() >= self.max_rounds).then_some(TerminationSignal::MaxRoundsReached)
    }
}

/// Stops when the most recent turn carries the completion marker.
///
/// Only agent and orchestrator turns count; the seeded user request and
/// failure turns never end a session.
#[derive(Debug, Clone)]
pub struct CompletionMarkerPolicy {
    marker: String,
    mode: MarkerMatch,
}

impl CompletionMarkerPolicy {
    /// Creates the policy.
    pub fn new(marker: impl Into<String>, mode: MarkerMatch) -> Self {
        Self {
            marker: marker.into(),
            mode,
        }
    }
}

impl TerminationPolicy for CompletionMarkerPolicy {
    fn evaluate(&self, state: &ConversationState) -> Option<TerminationSignal> {
        let last = state.last_turn()?;
        if last.speaker == Speaker::User || last.is_failure() {
            return None;
        }
        self.mode
            .matches(&last.content, &self.marker)
            .then_some(TerminationSignal::ExplicitCompletionMarkerSeen)
    }
}

/// Stops when the latest agent turn says no further action is needed.
#[derive(Debug, Clone)]
pub struct NoFurtherActionPolicy {
    phrases: Vec<String>,
}

impl NoFurtherActionPolicy {
    /// Creates the policy; phrases are matched case-insensitively.
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }
}

impl TerminationPolicy for NoFurtherActionPolicy {
    fn evaluate(&self, state: &ConversationState) -> Option<TerminationSignal> {
        let last = state.last_turn()?;
        if !last.speaker.is_agent() || last.is_failure() {
            return None;
        }
        let content = last.content.to_lowercase();
        self.phrases
            .iter()
            .any(|p| content.contains(p.as_str()))
            .then_some(TerminationSignal::NoFurtherActionAgentSelected)
    }
}

/// Stops once every registered agent has replied successfully at least once,
/// optionally only when a given speaker spoke last.
#[derive(Debug, Clone, Default)]
pub struct AllAgentsSpokenPolicy {
    last_speaker: Option<String>,
}

impl AllAgentsSpokenPolicy {
    /// Creates the policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Additionally require `speaker` to have the last word.
    pub fn closed_by(mut self, speaker: impl Into<String>) -> Self {
        self.last_speaker = Some(speaker.into());
        self
    }
}

impl TerminationPolicy for AllAgentsSpokenPolicy {
    fn evaluate(&self, state: &ConversationState) -> Option<TerminationSignal> {
        if state.participants().is_empty() {
            return None;
        }
        let everyone_replied = state.participants().iter().all(|p| {
            state
                .turns()
                .iter()
                .any(|t| t.speaker.agent_name() == Some(p.as_str()) && !t.is_failure())
        });
        if !everyone_replied {
            return None;
        }
        if let Some(expected) = &self.last_speaker {
            if state.last_turn().map(|t| t.speaker.name()) != Some(expected.as_str()) {
                return None;
            }
        }
        Some(TerminationSignal::NoFurtherActionAgentSelected)
    }
}

/// Ordered list of policies; the first match wins.
#[derive(Default)]
pub struct CompositePolicy {
    policies: Vec<Box<dyn TerminationPolicy>>,
}

impl CompositePolicy {
    /// Creates an empty composite.
    pub fn new() -> Self {
        Self::default()
    }

    /// Round ceiling first, then the completion marker.
    pub fn standard(max_rounds: u32, marker: impl Into<String>, mode: MarkerMatch) -> Self {
        Self::new()
            .then(MaxRoundsPolicy::new(max_rounds))
            .then(CompletionMarkerPolicy::new(marker, mode))
    }

    /// Appends a policy with lower precedence than those already added.
    pub fn then(mut self, policy: impl TerminationPolicy + 'static) -> Self {
        self.policies.push(Box::new(policy));
        self
    }

    /// Number of composed policies.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether no policy is composed.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl TerminationPolicy for CompositePolicy {
    fn evaluate(&self, state: &ConversationState) -> Option<TerminationSignal> {
        self.policies.iter().find_map(|p| p.evaluate(state))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use conclave_core::{AgentFailureKind, Task};

    fn state() -> ConversationState {
        ConversationState::seeded(
            Task::new("Check GDPR data residency"),
            vec!["PolicyAgent".into(), "DataResidencyAgent".into()],
        )
    }

    #[test]
    fn test_marker_match_modes() {
        assert!(MarkerMatch::Exact.matches("  DONE \n", "DONE"));
        assert!(!MarkerMatch::Exact.matches("DONE.", "DONE"));

        assert!(MarkerMatch::Token.matches("Review finished. DONE.", "DONE"));
        assert!(MarkerMatch::Token.matches("[DONE]", "[DONE]"));
        assert!(!MarkerMatch::Token.matches("UNDONE work remains", "DONE"));
        assert!(!MarkerMatch::Token.matches("done", "DONE"));
        assert!(MarkerMatch::Token.matches("審査完了 DONE。", "DONE"));
        assert!(MarkerMatch::Token.matches("REVIEW COMPLETE", "REVIEW COMPLETE"));
        assert!(MarkerMatch::Token.matches("All checked: REVIEW COMPLETE.", "REVIEW COMPLETE"));
        assert!(!MarkerMatch::Token.matches("PREVIEW COMPLETED", "REVIEW COMPLETE"));

        assert!(MarkerMatch::Contains.matches("UNDONE", "DONE"));
        assert!(!MarkerMatch::Contains.matches("done", "DONE"));
        assert!(MarkerMatch::ContainsIgnoreCase.matches("all done here", "DONE"));
        assert!(!MarkerMatch::ContainsIgnoreCase.matches("anything", ""));
    }

    #[test]
    fn test_max_rounds() {
        let mut s = state();
        let policy = MaxRoundsPolicy::new(2);
        s.record_reply("PolicyAgent", "a");
        assert!(!policy.is_complete(&s));
        s.record_failure("DataResidencyAgent", AgentFailureKind::Timeout, "slow");
        assert_eq!(policy.evaluate(&s), Some(TerminationSignal::MaxRoundsReached));
    }

    #[test]
    fn test_marker_ignores_user_request_and_failures() {
        let s = ConversationState::seeded(Task::new("DONE"), vec!["A".into()]);
        let policy = CompletionMarkerPolicy::new("DONE", MarkerMatch::Token);
        assert_eq!(policy.evaluate(&s), None);

        let mut s = state();
        s.record_failure("PolicyAgent", AgentFailureKind::MalformedReply, "DONE");
        assert_eq!(policy.evaluate(&s), None);

        s.record_reply("PolicyAgent", "DONE");
        assert_eq!(
            policy.evaluate(&s),
            Some(TerminationSignal::ExplicitCompletionMarkerSeen)
        );
    }

    #[test]
    fn test_marker_only_checks_latest_turn() {
        let mut s = state();
        let policy = CompletionMarkerPolicy::new("DONE", MarkerMatch::Token);
        s.record_reply("PolicyAgent", "DONE");
        s.record_reply("DataResidencyAgent", "wait, one more thing");
        assert_eq!(policy.evaluate(&s), None);
    }

    #[test]
    fn test_no_further_action() {
        let mut s = state();
        let policy = NoFurtherActionPolicy::new(["No action needed"]);
        s.record_reply("PolicyAgent", "Tool output attached.");
        assert_eq!(policy.evaluate(&s), None);
        s.record_reply("DataResidencyAgent", "No action needed.");
        assert_eq!(
            policy.evaluate(&s),
            Some(TerminationSignal::NoFurtherActionAgentSelected)
        );
    }

    #[test]
    fn test_all_agents_spoken() {
        let mut s = state();
        let policy = AllAgentsSpokenPolicy::new();
        s.record_reply("PolicyAgent", "a");
        s.record_failure("DataResidencyAgent", AgentFailureKind::Timeout, "slow");
        assert_eq!(policy.evaluate(&s), None);
        s.record_reply("DataResidencyAgent", "b");
        assert!(policy.is_complete(&s));

        let closed = AllAgentsSpokenPolicy::new().closed_by("PolicyAgent");
        assert!(!closed.is_complete(&s));
        s.record_reply("PolicyAgent", "c");
        assert!(closed.is_complete(&s));
    }

    #[test]
    fn test_composite_precedence() {
        let mut s = state();
        let policy = CompositePolicy::standard(1, "DONE", MarkerMatch::Token)
            .then(NoFurtherActionPolicy::new(["no action needed"]));
        assert_eq!(policy.len(), 3);
        assert_eq!(policy.evaluate(&s), None);

        // Ceiling, marker and phrase all match: the ceiling wins.
        s.record_reply("PolicyAgent", "DONE, no action needed");
        assert_eq!(policy.evaluate(&s), Some(TerminationSignal::MaxRoundsReached));

        let policy = CompositePolicy::standard(5, "DONE", MarkerMatch::Token)
            .then(NoFurtherActionPolicy::new(["no action needed"]));
        assert_eq!(
            policy.evaluate(&s),
            Some(TerminationSignal::ExplicitCompletionMarkerSeen)
        );
    }
}
