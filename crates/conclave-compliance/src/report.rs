use chrono::{DateTime, Utc};
use conclave_core::TerminationSignal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall compliance status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    /// No negative finding and the session concluded normally.
    Compliant,
    /// At least one finding carries a negative marker.
    NonCompliant,
    /// The session did not produce enough evidence either way.
    Inconclusive,
}

impl std::fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComplianceStatus::Compliant => write!(f, "compliant"),
            ComplianceStatus::NonCompliant => write!(f, "non_compliant"),
            ComplianceStatus::Inconclusive => write!(f, "inconclusive"),
        }
    }
}

/// An agent's final finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentFinding {
    pub agent: String,
    pub finding: String,
    /// Sequence number of the turn the finding was taken from.
    pub sequence: u64,
    /// Whether the final turn was a recorded failure.
    pub failed: bool,
}

/// A finished session's compliance report.
///
/// Derived entirely from the transcript and termination signal, so building
/// it twice from the same session yields equal reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub task_id: Uuid,
    pub session_id: Uuid,
    pub signal: TerminationSignal,
    pub status: ComplianceStatus,
    pub rounds: u32,
    /// One finding per agent that spoke, in order of first appearance.
    pub findings: Vec<AgentFinding>,
    /// Negative markers found in the findings, sorted.
    pub matched_markers: Vec<String>,
    /// Registered agents that never spoke.
    pub silent_agents: Vec<String>,
    pub summary: String,
    /// Timestamp of the last turn in the transcript.
    pub concluded_at: DateTime<Utc>,
}

impl ComplianceReport {
    /// The finding reported by `agent`.
    pub fn finding_for(&self, agent: &str) -> Option<&AgentFinding> {
        self.findings.iter().find(|f| f.agent == agent)
    }

    /// Findings whose final turn was a failure.
    pub fn failed_findings(&self) -> Vec<&AgentFinding> {
        self.findings.iter().filter(|f| f.failed).collect()
    }

    /// `(agent, finding)` pairs in speaking order.
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        self.findings
            .iter()
            .map(|f| (f.agent.as_str(), f.finding.as_str()))
            .collect()
    }
}
