use async_trait::async_trait;
use conclave_compliance::ComplianceStatus;
use conclave_core::{AgentFailureKind, TerminationSignal, Turn};
use conclave_session::{TranscriptEntry, TranscriptStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Lifecycle events emitted by the engine while a session runs.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The session was seeded and is about to run its first round.
    SessionStarted {
        session_id: Uuid,
        task_id: Uuid,
        agents: Vec<String>,
    },
    /// The selection strategy picked an agent for the round.
    AgentSelected {
        session_id: Uuid,
        round: u32,
        agent: String,
    },
    /// A turn was appended to the transcript.
    TurnAppended { session_id: Uuid, turn: Turn },
    /// An agent invocation failed; a failure turn follows.
    AgentFailed {
        session_id: Uuid,
        round: u32,
        agent: String,
        kind: AgentFailureKind,
        error: String,
    },
    /// The session stopped and its report was produced.
    SessionEnded {
        session_id: Uuid,
        signal: TerminationSignal,
        rounds: u32,
        status: ComplianceStatus,
    },
}

impl SessionEvent {
    /// Session the event belongs to.
    pub fn session_id(&self) -> Uuid {
        match self {
            SessionEvent::SessionStarted { session_id, .. }
            | SessionEvent::AgentSelected { session_id, .. }
            | SessionEvent::TurnAppended { session_id, .. }
            | SessionEvent::AgentFailed { session_id, .. }
            | SessionEvent::SessionEnded { session_id, .. } => *session_id,
        }
    }
}

/// Receives session events. Observers must not block for long; the engine
/// awaits each one in turn.
#[async_trait]
pub trait SessionObserver: Send + Sync {
    /// Handle one event.
    async fn on_event(&self, event: &SessionEvent);
}

/// Dispatches events to several observers in registration order.
#[derive(Clone, Default)]
pub struct ObserverChain {
    observers: Vec<Arc<dyn SessionObserver>>,
}

impl ObserverChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer to the chain.
    pub fn add(&mut self, observer: Arc<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    /// Emit an event to every observer.
    pub async fn emit(&self, event: SessionEvent) {
        for observer in &self.observers {
            observer.on_event(&event).await;
        }
    }

    /// Number of observers in the chain.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Whether the chain has no observers.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

/// Observer that persists every appended turn to a [`TranscriptStore`].
///
/// Store errors are logged and never interrupt the session.
pub struct TranscriptRecorder {
    store: Arc<dyn TranscriptStore>,
}

impl TranscriptRecorder {
    pub fn new(store: Arc<dyn TranscriptStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn TranscriptStore> {
        &self.store
    }
}

#[async_trait]
impl SessionObserver for TranscriptRecorder {
    async fn on_event(&self, event: &SessionEvent) {
        if let SessionEvent::TurnAppended { session_id, turn } = event {
            let entry = TranscriptEntry::new(*session_id, turn.clone());
            if let Err(e) = self.store.append(entry).await {
                warn!(session_id = %session_id, sequence = turn.sequence, error = %e, "Failed to record transcript turn");
            }
        }
    }
}
