use conclave_core::AgentFailureKind;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Health of an agent as seen by its most recent invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentHealth {
    /// Never invoked.
    #[default]
    Idle,
    /// Last invocation produced a reply.
    Healthy,
    /// Last invocation failed.
    Failing,
}

/// Invocation counters for a single agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgentStats {
    /// Agent name.
    pub agent: String,
    /// Current health.
    pub health: AgentHealth,
    /// Total invocations, successful or not.
    pub invocations: u64,
    /// Failed invocations.
    pub failures: u64,
    /// Failures caused by the per-agent timeout.
    pub timeouts: u64,
    /// Wall-clock time spent waiting on the agent.
    pub duration_ms: u64,
    /// Most recent failure kind, if any.
    pub last_failure: Option<AgentFailureKind>,
}

/// Aggregate counters across every agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonitorTotals {
    /// Total invocations.
    pub invocations: u64,
    /// Total failures.
    pub failures: u64,
    /// Total timeouts.
    pub timeouts: u64,
    /// Total wall-clock time in milliseconds.
    pub duration_ms: u64,
}

/// Tracks invocation metrics per agent name. Shareable across concurrent
/// sessions.
pub struct AgentMonitor {
    stats: Arc<RwLock<HashMap<String, AgentStats>>>,
}

impl AgentMonitor {
    pub fn new() -> Self {
        Self {
            stats: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Record a successful reply.
    pub async fn record_success(&self, agent: &str, elapsed: Duration) {
        let mut stats = self.stats.write().await;
        let entry = Self::entry(&mut stats, agent);
        entry.invocations += 1;
        entry.duration_ms += elapsed.as_millis() as u64;
        entry.health = AgentHealth::Healthy;
    }

    /// Record a failed invocation.
    pub async fn record_failure(&self, agent: &str, kind: AgentFailureKind, elapsed: Duration) {
        let mut stats = self.stats.write().await;
        let entry = Self::entry(&mut stats, agent);
        entry.invocations += 1;
        entry.failures += 1;
        if kind == AgentFailureKind::Timeout {
            entry.timeouts += 1;
        }
        entry.duration_ms += elapsed.as_millis() as u64;
        entry.health = AgentHealth::Failing;
        entry.last_failure = Some(kind);
    }

    /// Stats for one agent.
    pub async fn get(&self, agent: &str) -> Option<AgentStats> {
        self.stats.read().await.get(agent).cloned()
    }

    /// Stats for every agent seen so far, sorted by name.
    pub async fn snapshot(&self) -> Vec<AgentStats> {
        let stats = self.stats.read().await;
        let mut all: Vec<AgentStats> = stats.values().cloned().collect();
        all.sort_by(|a, b| a.agent.cmp(&b.agent));
        all
    }

    /// Totals across every agent.
    pub async fn totals(&self) -> MonitorTotals {
        let stats = self.stats.read().await;
        stats
            .values()
            .fold(MonitorTotals::default(), |mut total, s| {
                total.invocations += s.invocations;
                total.failures += s.failures;
                total.timeouts += s.timeouts;
                total.duration_ms += s.duration_ms;
                total
            })
    }

    /// Serialize the current state as JSON.
    pub async fn to_json(&self) -> serde_json::Value {
        let agents = self.snapshot().await;
        let totals = self.totals().await;
        serde_json::json!({
            "agents": agents,
            "totals": totals,
        })
    }

    fn entry<'a>(stats: &'a mut HashMap<String, AgentStats>, agent: &str) -> &'a mut AgentStats {
        stats
            .entry(agent.to_string())
            .or_insert_with(|| AgentStats {
                agent: agent.to_string(),
                ..AgentStats::default()
            })
    }
}

impl Default for AgentMonitor {
    fn default() -> Self {
        Self::new()
    }
}
