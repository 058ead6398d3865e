use crate::termination::MarkerMatch;
use conclave_core::{ConclaveError, ConclaveResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Built-in selection strategies that can be named in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKind {
    /// Registry order, one agent per round.
    #[default]
    RoundRobin,
    /// Agents whose capability tag matches the task, in rotation.
    KeywordMatch,
    /// `lead_agent` answers the user, the others follow.
    LeadAgent,
}

/// Extra termination policy composed after the round ceiling and marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationKind {
    /// Ceiling and completion marker only.
    #[default]
    CompletionMarker,
    /// Also stop when an agent says no further action is needed.
    NoFurtherAction,
    /// Also stop once every agent has replied.
    AllAgentsSpoken,
}

fn default_max_rounds() -> u32 {
    10
}

fn default_per_agent_timeout_ms() -> u64 {
    30_000
}

fn default_completion_marker() -> String {
    "DONE".into()
}

fn default_negative_finding_markers() -> Vec<String> {
    vec!["non-compliant".into(), "noncompliant".into(), "violation".into()]
}

fn default_no_action_phrases() -> Vec<String> {
    vec!["no action needed".into()]
}

/// Session configuration. Every field has a default, so an empty TOML table
/// is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Hard ceiling on rounds per session.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    /// Upper bound on a single agent invocation, in milliseconds.
    #[serde(default = "default_per_agent_timeout_ms")]
    pub per_agent_timeout_ms: u64,
    /// Text that ends the session when an agent emits it.
    #[serde(default = "default_completion_marker")]
    pub completion_marker: String,
    /// How the completion marker is matched.
    #[serde(default)]
    pub marker_match: MarkerMatch,
    /// Substrings that make a finding non-compliant.
    #[serde(default = "default_negative_finding_markers")]
    pub negative_finding_markers: Vec<String>,
    /// Phrases recognised by the no-further-action policy.
    #[serde(default = "default_no_action_phrases")]
    pub no_action_phrases: Vec<String>,
    /// Which built-in selection strategy to use.
    #[serde(default)]
    pub selection_strategy: SelectionKind,
    /// Lead agent for [`SelectionKind::LeadAgent`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_agent: Option<String>,
    /// Which extra termination policy to compose.
    #[serde(default)]
    pub termination_policy: TerminationKind,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            per_agent_timeout_ms: default_per_agent_timeout_ms(),
            completion_marker: default_completion_marker(),
            marker_match: MarkerMatch::default(),
            negative_finding_markers: default_negative_finding_markers(),
            no_action_phrases: default_no_action_phrases(),
            selection_strategy: SelectionKind::default(),
            lead_agent: None,
            termination_policy: TerminationKind::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> ConclaveResult<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| ConclaveError::config(format!("invalid orchestrator config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub async fn load(path: impl AsRef<Path>) -> ConclaveResult<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            ConclaveError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> ConclaveResult<()> {
        if self.max_rounds == 0 {
            return Err(ConclaveError::config("max_rounds must be greater than 0"));
        }
        if self.per_agent_timeout_ms == 0 {
            return Err(ConclaveError::config(
                "per_agent_timeout_ms must be greater than 0",
            ));
        }
        if self.completion_marker.trim().is_empty() {
            return Err(ConclaveError::config("completion_marker must not be empty"));
        }
        if self.selection_strategy == SelectionKind::LeadAgent
            && self.lead_agent.as_deref().map_or(true, |l| l.trim().is_empty())
        {
            return Err(ConclaveError::config(
                "selection_strategy = \"lead_agent\" requires lead_agent",
            ));
        }
        Ok(())
    }

    /// Per-agent timeout as a [`Duration`].
    pub fn per_agent_timeout(&self) -> Duration {
        Duration::from_millis(self.per_agent_timeout_ms)
    }

    /// Builder-style override of the round ceiling.
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Builder-style override of the per-agent timeout.
    pub fn with_per_agent_timeout(mut self, timeout: Duration) -> Self {
        self.per_agent_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Builder-style override of the completion marker.
    pub fn with_completion_marker(mut self, marker: impl Into<String>) -> Self {
        self.completion_marker = marker.into();
        self
    }
}
