use crate::error::AgentError;
use crate::handle::{AgentHandle, AgentReply};
use async_trait::async_trait;
use conclave_core::Turn;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What a [`ScriptedAgent`] does once every scripted reply has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exhaustion {
    /// Keep repeating the last reply.
    #[default]
    RepeatLast,
    /// Start again from the first reply.
    Cycle,
    /// Fail the invocation.
    Fail,
}

/// Replies from a fixed script.
///
/// The position in the script is the number of turns this agent already has
/// in the transcript, so the agent holds no state and can serve concurrent
/// sessions.
#[derive(Debug, Clone)]
pub struct ScriptedAgent {
    name: String,
    replies: Vec<String>,
    exhaustion: Exhaustion,
}

impl ScriptedAgent {
    /// Creates a scripted agent speaking as `name`.
    pub fn new(name: impl Into<String>, replies: Vec<String>) -> Self {
        Self {
            name: name.into(),
            replies,
            exhaustion: Exhaustion::default(),
        }
    }

    /// Sets the behaviour after the script runs out.
    pub fn with_exhaustion(mut self, exhaustion: Exhaustion) -> Self {
        self.exhaustion = exhaustion;
        self
    }

    fn reply_at(&self, spoken: usize) -> Option<&String> {
        if self.replies.is_empty() {
            return None;
        }
        if spoken < self.replies.len() {
            return self.replies.get(spoken);
        }
        match self.exhaustion {
            Exhaustion::RepeatLast => self.replies.last(),
            Exhaustion::Cycle => self.replies.get(spoken % self.replies.len()),
            Exhaustion::Fail => None,
        }
    }
}

#[async_trait]
impl AgentHandle for ScriptedAgent {
    async fn invoke(&self, transcript: &[Turn]) -> Result<AgentReply, AgentError> {
        let spoken = transcript
            .iter()
            .filter(|t| t.speaker.agent_name() == Some(self.name.as_str()))
            .count();
        debug!(agent = %self.name, spoken, "Scripted agent replying");
        self.reply_at(spoken)
            .map(|r| AgentReply::new(r.clone()))
            .ok_or_else(|| AgentError::invocation(format!("script of '{}' exhausted", self.name)))
    }
}

/// Replies according to keyword rules matched against the latest turn from
/// another speaker.
///
/// Rules are checked in insertion order and matched case-insensitively; the
/// first match wins. Without a match the default reply is used.
#[derive(Debug, Clone)]
pub struct RuleAgent {
    name: String,
    rules: Vec<(String, String)>,
    default_reply: String,
}

impl RuleAgent {
    /// Creates a rule agent with a fallback reply.
    pub fn new(name: impl Into<String>, default_reply: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            default_reply: default_reply.into(),
        }
    }

    /// Adds a rule: when `keyword` appears, reply with `reply`.
    pub fn rule(mut self, keyword: impl Into<String>, reply: impl Into<String>) -> Self {
        self.rules.push((keyword.into().to_lowercase(), reply.into()));
        self
    }
}

#[async_trait]
impl AgentHandle for RuleAgent {
    async fn invoke(&self, transcript: &[Turn]) -> Result<AgentReply, AgentError> {
        let prompt = transcript
            .iter()
            .rev()
            .find(|t| t.speaker.agent_name() != Some(self.name.as_str()) && !t.is_failure())
            .map(|t| t.content.to_lowercase())
            .unwrap_or_default();

        let reply = self
            .rules
            .iter()
            .find(|(keyword, _)| prompt.contains(keyword.as_str()))
            .map(|(_, reply)| reply.as_str())
            .unwrap_or(self.default_reply.as_str());

        Ok(AgentReply::new(reply))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use conclave_core::Speaker;

    fn transcript(turns: &[(&str, &str)]) -> Vec<Turn> {
        turns
            .iter()
            .enumerate()
            .map(|(i, (speaker, content))| {
                let speaker = if *speaker == "user" {
                    Speaker::User
                } else {
                    Speaker::agent(*speaker)
                };
                Turn::new(i as u64, speaker, *content)
            })
            .collect()
    }

    fn script() -> Vec<String> {
        vec!["first".to_string(), "second".to_string()]
    }

    #[tokio::test]
    async fn test_script_follows_own_turn_count() {
        let agent = ScriptedAgent::new("A", script());
        let t = transcript(&[("user", "go")]);
        assert_eq!(agent.invoke(&t).await.unwrap().content, "first");

        let t = transcript(&[("user", "go"), ("A", "first"), ("B", "x")]);
        assert_eq!(agent.invoke(&t).await.unwrap().content, "second");
    }

    #[tokio::test]
    async fn test_exhaustion_modes() {
        let t = transcript(&[("user", "go"), ("A", "1"), ("A", "2"), ("A", "3")]);

        let repeat = ScriptedAgent::new("A", script());
        assert_eq!(repeat.invoke(&t).await.unwrap().content, "second");

        let cycle = ScriptedAgent::new("A", script()).with_exhaustion(Exhaustion::Cycle);
        assert_eq!(cycle.invoke(&t).await.unwrap().content, "second");

        let fail = ScriptedAgent::new("A", script()).with_exhaustion(Exhaustion::Fail);
        let err = fail.invoke(&t).await.unwrap_err();
        assert!(matches!(err, AgentError::Invocation(_)));
    }

    #[tokio::test]
    async fn test_empty_script_fails() {
        let agent = ScriptedAgent::new("A", vec![]);
        assert!(agent.invoke(&transcript(&[("user", "go")])).await.is_err());
    }

    #[tokio::test]
    async fn test_rule_agent_matches_latest_other_turn() {
        let agent = RuleAgent::new("Residency", "No action needed.")
            .rule("us region", "non-compliant: EU data stored in US region")
            .rule("eu", "EU data stays in EU regions");

        let t = transcript(&[("user", "Data is replicated to a US Region bucket")]);
        assert_eq!(
            agent.invoke(&t).await.unwrap().content,
            "non-compliant: EU data stored in US region"
        );

        let t = transcript(&[("user", "US region"), ("Policy", "reviewing EU policy")]);
        assert_eq!(
            agent.invoke(&t).await.unwrap().content,
            "EU data stays in EU regions"
        );

        let t = transcript(&[("user", "anything else")]);
        assert_eq!(agent.invoke(&t).await.unwrap().content, "No action needed.");
    }
}
