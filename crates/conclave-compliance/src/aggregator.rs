use crate::report::{AgentFinding, ComplianceReport, ComplianceStatus};
use conclave_core::{TerminationSignal, Turn};
use conclave_session::ConversationState;
use std::collections::BTreeSet;
use tracing::debug;

/// Reduces a finished transcript to a [`ComplianceReport`].
///
/// Each agent's last turn is its finding (last-write-wins). Status precedence:
///
/// 1. `NonCompliant` if any successful finding contains a negative marker
///    (case-insensitive).
/// 2. `Inconclusive` if the session hit the round ceiling or was cancelled,
///    if selection stopped before every agent spoke, if an agent's final
///    turn is a failure, or if there are no findings.
/// 3. `Compliant` otherwise.
#[derive(Debug, Clone, Default)]
pub struct ResponseAggregator {
    negative_markers: BTreeSet<String>,
}

impl ResponseAggregator {
    /// Creates an aggregator with the given negative markers.
    pub fn new<I, S>(negative_markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let negative_markers = negative_markers
            .into_iter()
            .map(|m| m.as_ref().trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        Self { negative_markers }
    }

    /// Configured markers, lowercased and sorted.
    pub fn negative_markers(&self) -> impl Iterator<Item = &str> {
        self.negative_markers.iter().map(String::as_str)
    }

    /// Builds the report for a finished session.
    pub fn aggregate(
        &self,
        state: &ConversationState,
        signal: TerminationSignal,
    ) -> ComplianceReport {
        let findings = last_turn_per_agent(state.turns());

        let matched_markers: Vec<String> = findings
            .iter()
            .filter(|f| !f.failed)
            .flat_map(|f| {
                let text = f.finding.to_lowercase();
                self.negative_markers
                    .iter()
                    .filter(move |m| text.contains(m.as_str()))
                    .cloned()
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let silent_agents: Vec<String> = state
            .participants()
            .iter()
            .filter(|p| !state.has_spoken(p))
            .cloned()
            .collect();

        let status = if !matched_markers.is_empty() {
            ComplianceStatus::NonCompliant
        } else if is_inconclusive(signal, &findings, silent_agents.is_empty()) {
            ComplianceStatus::Inconclusive
        } else {
            ComplianceStatus::Compliant
        };

        let summary = format!(
            "{status}: {} finding(s) from {}/{} agent(s), {} failed; stopped by {signal} after {} round(s)",
            findings.len(),
            state.participants().len() - silent_agents.len(),
            state.participants().len(),
            findings.iter().filter(|f| f.failed).count(),
            state.round(),
        );
        debug!(session_id = %state.session_id(), %status, %signal, "Session aggregated");

        ComplianceReport {
            task_id: state.task().id,
            session_id: state.session_id(),
            signal,
            status,
            rounds: state.round(),
            findings,
            matched_markers,
            silent_agents,
            summary,
            concluded_at: state.updated_at(),
        }
    }
}

fn last_turn_per_agent(turns: &[Turn]) -> Vec<AgentFinding> {
    let mut findings: Vec<AgentFinding> = Vec::new();
    for turn in turns {
        let Some(agent) = turn.speaker.agent_name() else {
            continue;
        };
        let finding = AgentFinding {
            agent: agent.to_string(),
            finding: turn.content.clone(),
            sequence: turn.sequence,
            failed: turn.is_failure(),
        };
        match findings.iter_mut().find(|f| f.agent == agent) {
            Some(existing) => *existing = finding,
            None => findings.push(finding),
        }
    }
    findings
}

fn is_inconclusive(
    signal: TerminationSignal,
    findings: &[AgentFinding],
    everyone_spoke: bool,
) -> bool {
    signal.is_forced()
        || (signal == TerminationSignal::SelectionStrategyReturnedNone && !everyone_spoke)
        || findings.is_empty()
        || findings.iter().any(|f| f.failed)
}
