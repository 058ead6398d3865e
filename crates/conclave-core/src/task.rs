use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Optional context attached to a [`Task`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Compliance scope, e.g. "GDPR" or "ISO 27001 A.8".
    #[serde(default)]
    pub scope: Option<String>,
    /// The system under review.
    #[serde(default)]
    pub target_system: Option<String>,
    /// Free-form labels, kept sorted for deterministic serialization.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// An immutable compliance request submitted by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier for this task.
    pub id: Uuid,
    /// The natural-language compliance request.
    pub request: String,
    /// Optional scope and target information.
    #[serde(default)]
    pub metadata: TaskMetadata,
    /// UTC timestamp of when the task was created.
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Creates a task with a fresh id and empty metadata.
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            request: request.into(),
            metadata: TaskMetadata::default(),
            created_at: Utc::now(),
        }
    }

    /// Sets the compliance scope.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.metadata.scope = Some(scope.into());
        self
    }

    /// Sets the target system.
    pub fn with_target_system(mut self, target: impl Into<String>) -> Self {
        self.metadata.target_system = Some(target.into());
        self
    }

    /// Adds a free-form label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    /// The request followed by any scope and target lines.
    ///
    /// This is the text a session is seeded with.
    pub fn prompt(&self) -> String {
        let mut prompt = self.request.clone();
        if let Some(scope) = &self.metadata.scope {
            prompt.push_str(&format!("\nScope: {scope}"));
        }
        if let Some(target) = &self.metadata.target_system {
            prompt.push_str(&format!("\nTarget system: {target}"));
        }
        prompt
    }
}
