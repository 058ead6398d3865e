use anyhow::{bail, Context};
use conclave_agent::{
    AgentDescriptor, AgentHandle, Exhaustion, RetryPolicy, RetryingAgent, RuleAgent,
    ScriptedAgent,
};
use conclave_orchestrator::OrchestratorConfig;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// Top-level `conclave.toml`.
#[derive(Debug, Deserialize)]
pub struct ConclaveConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
}

/// One agent declared in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    #[serde(default)]
    pub capability: String,
    #[serde(flatten)]
    pub kind: AgentKind,
    /// Wrap the agent with bounded retries.
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentKind {
    /// Keyword rules over the latest turn.
    Rule {
        default_reply: String,
        #[serde(default)]
        rules: Vec<RuleSpec>,
    },
    /// A fixed list of replies.
    Scripted {
        replies: Vec<String>,
        #[serde(default)]
        exhaustion: Exhaustion,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleSpec {
    pub keyword: String,
    pub reply: String,
}

impl AgentSpec {
    /// Build the agent handle and wrap it in a descriptor.
    pub fn into_descriptor(self) -> AgentDescriptor {
        let handle: Arc<dyn AgentHandle> = match self.kind {
            AgentKind::Rule {
                default_reply,
                rules,
            } => Arc::new(
                rules
                    .into_iter()
                    .fold(RuleAgent::new(&self.name, default_reply), |agent, r| {
                        agent.rule(r.keyword, r.reply)
                    }),
            ),
            AgentKind::Scripted {
                replies,
                exhaustion,
            } => Arc::new(ScriptedAgent::new(&self.name, replies).with_exhaustion(exhaustion)),
        };
        let handle: Arc<dyn AgentHandle> = match self.retry {
            Some(policy) => Arc::new(RetryingAgent::new(handle, policy)),
            None => handle,
        };
        let capability = if self.capability.trim().is_empty() {
            self.name.to_lowercase()
        } else {
            self.capability
        };
        AgentDescriptor::new(self.name, capability, handle)
    }
}

impl ConclaveConfig {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(raw).context("Failed to parse config")?;
        config.orchestrator.validate()?;
        if config.agents.is_empty() {
            bail!("config declares no [[agents]]");
        }
        Ok(config)
    }

    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&raw)
    }
}
