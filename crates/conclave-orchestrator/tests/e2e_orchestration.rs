//! End-to-end sessions over scripted, failing and slow agents.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use conclave_agent::{
    AgentDescriptor, AgentError, AgentHandle, AgentReply, Exhaustion, ScriptedAgent,
};
use conclave_compliance::ComplianceStatus;
use conclave_core::{AgentFailureKind, Speaker, Task, TerminationSignal, Turn};
use conclave_orchestrator::{
    CancellationToken, Orchestrator, OrchestratorConfig, SessionEvent, SessionObserver,
    TranscriptRecorder,
};
use conclave_session::{FileTranscriptStore, TranscriptStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

fn scripted(name: &str, replies: &[&str]) -> AgentDescriptor {
    AgentDescriptor::new(
        name,
        name.to_lowercase(),
        Arc::new(ScriptedAgent::new(
            name,
            replies.iter().map(|r| r.to_string()).collect(),
        )),
    )
}

fn cycling(name: &str, replies: &[&str]) -> AgentDescriptor {
    AgentDescriptor::new(
        name,
        name.to_lowercase(),
        Arc::new(
            ScriptedAgent::new(name, replies.iter().map(|r| r.to_string()).collect())
                .with_exhaustion(Exhaustion::Cycle),
        ),
    )
}

/// Never answers within any reasonable timeout.
struct Sleeper;

#[async_trait]
impl AgentHandle for Sleeper {
    async fn invoke(&self, _transcript: &[Turn]) -> Result<AgentReply, AgentError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(AgentReply::new("too late"))
    }
}

/// Always errors.
struct Broken;

#[async_trait]
impl AgentHandle for Broken {
    async fn invoke(&self, _transcript: &[Turn]) -> Result<AgentReply, AgentError> {
        Err(AgentError::invocation("backend unavailable"))
    }
}

fn fast_config(max_rounds: u32) -> OrchestratorConfig {
    OrchestratorConfig::default()
        .with_max_rounds(max_rounds)
        .with_per_agent_timeout(Duration::from_millis(50))
}

fn assert_gap_free(turns: &[Turn]) {
    for (i, turn) in turns.iter().enumerate() {
        assert_eq!(turn.sequence, i as u64);
    }
}

#[tokio::test]
async fn test_gdpr_data_residency_scenario() {
    let orchestrator = Orchestrator::builder(fast_config(4))
        .agent(scripted("PolicyAgent", &["reviewing...", "DONE"]))
        .agent(scripted(
            "DataResidencyAgent",
            &["non-compliant: EU data stored in US region"],
        ))
        .build()
        .unwrap();

    let outcome = orchestrator
        .run(Task::new("Check GDPR data residency"))
        .await
        .unwrap();

    assert_eq!(outcome.signal, TerminationSignal::ExplicitCompletionMarkerSeen);
    assert_eq!(outcome.state.round(), 3);
    assert_eq!(outcome.report.status, ComplianceStatus::NonCompliant);
    assert_eq!(outcome.report.matched_markers, vec!["non-compliant"]);
    assert_eq!(
        outcome.report.pairs(),
        vec![
            ("PolicyAgent", "DONE"),
            (
                "DataResidencyAgent",
                "non-compliant: EU data stored in US region"
            ),
        ]
    );
    assert_gap_free(outcome.state.turns());
}

#[tokio::test]
async fn test_empty_registry_creates_no_turns() {
    let observed = Arc::new(EventLog::default());
    let result = Orchestrator::builder(OrchestratorConfig::default())
        .observer(observed.clone())
        .build();
    let err = match result {
        Ok(_) => panic!("empty registry must not build"),
        Err(e) => e,
    };
    assert!(err.is_config());
    assert!(observed.events.lock().await.is_empty());
}

#[tokio::test]
async fn test_single_agent_hits_ceiling() {
    let orchestrator = Orchestrator::builder(fast_config(1))
        .agent(scripted("PolicyAgent", &["still reviewing"]))
        .build()
        .unwrap();
    let outcome = orchestrator.run(Task::new("review")).await.unwrap();

    assert_eq!(outcome.signal, TerminationSignal::MaxRoundsReached);
    assert_eq!(outcome.report.status, ComplianceStatus::Inconclusive);
    assert_eq!(outcome.state.turn_count(), 2);
}

#[tokio::test]
async fn test_multi_word_completion_marker_ends_session() {
    let orchestrator = Orchestrator::builder(
        fast_config(5).with_completion_marker("REVIEW COMPLETE"),
    )
    .agent(scripted("PolicyAgent", &["REVIEW COMPLETE"]))
    .build()
    .unwrap();
    let outcome = orchestrator.run(Task::new("review")).await.unwrap();

    assert_eq!(outcome.signal, TerminationSignal::ExplicitCompletionMarkerSeen);
    assert_eq!(outcome.state.round(), 1);
    assert_eq!(outcome.report.status, ComplianceStatus::Compliant);
}

#[tokio::test]
async fn test_round_ceiling_never_exceeded() {
    for max_rounds in [1, 2, 5, 9] {
        let orchestrator = Orchestrator::builder(fast_config(max_rounds))
            .agent(cycling("A", &["a1", "a2"]))
            .agent(cycling("B", &["b1"]))
            .agent(AgentDescriptor::new("C", "c", Arc::new(Broken)))
            .build()
            .unwrap();
        let outcome = orchestrator.run(Task::new("review")).await.unwrap();
        assert_eq!(outcome.state.round(), max_rounds);
        assert_eq!(outcome.state.turn_count(), max_rounds as usize + 1);
        assert_gap_free(outcome.state.turns());
    }
}

#[tokio::test]
async fn test_round_robin_has_period_n() {
    let orchestrator = Orchestrator::builder(fast_config(7))
        .agent(cycling("A", &["a"]))
        .agent(AgentDescriptor::new("B", "b", Arc::new(Broken)))
        .agent(cycling("C", &["c"]))
        .build()
        .unwrap();
    let outcome = orchestrator.run(Task::new("review")).await.unwrap();

    let speakers: Vec<&str> = outcome.state.turns()[1..]
        .iter()
        .map(|t| t.speaker.name())
        .collect();
    assert_eq!(speakers, vec!["A", "B", "C", "A", "B", "C", "A"]);
}

#[tokio::test]
async fn test_seed_turn_is_the_user_request() {
    let orchestrator = Orchestrator::builder(fast_config(1))
        .agent(scripted("A", &["ok"]))
        .build()
        .unwrap();
    let task = Task::new("Check GDPR data residency").with_scope("EU customers");
    let outcome = orchestrator.run(task.clone()).await.unwrap();

    let seed = &outcome.state.turns()[0];
    assert_eq!(seed.speaker, Speaker::User);
    assert_eq!(seed.content, task.prompt());
    assert_eq!(outcome.report.task_id, task.id);
}

#[tokio::test]
async fn test_aggregation_is_idempotent() {
    let orchestrator = Orchestrator::builder(fast_config(4))
        .agent(cycling("A", &["fine", "violation in logs"]))
        .agent(cycling("B", &["fine"]))
        .build()
        .unwrap();
    let outcome = orchestrator.run(Task::new("review")).await.unwrap();

    let aggregator = conclave_compliance::ResponseAggregator::new(
        &orchestrator.config().negative_finding_markers,
    );
    let first = aggregator.aggregate(&outcome.state, outcome.signal);
    let second = aggregator.aggregate(&outcome.state, outcome.signal);
    assert_eq!(first, second);
    assert_eq!(first, outcome.report);
}

#[tokio::test]
async fn test_last_write_wins() {
    // A speaks at rounds 1 and 3 with two agents; its second reply is the finding.
    let orchestrator = Orchestrator::builder(fast_config(4))
        .agent(scripted("A", &["violation suspected", "resolved after review"]))
        .agent(scripted("B", &["ok"]))
        .build()
        .unwrap();
    let outcome = orchestrator.run(Task::new("review")).await.unwrap();

    assert_eq!(
        outcome.report.finding_for("A").unwrap().finding,
        "resolved after review"
    );
    assert_eq!(outcome.report.status, ComplianceStatus::Inconclusive);
    assert!(outcome.report.matched_markers.is_empty());
}

#[tokio::test]
async fn test_timeouts_do_not_abort_the_session() {
    let orchestrator = Orchestrator::builder(fast_config(5))
        .agent(AgentDescriptor::new("A", "slow", Arc::new(Sleeper)))
        .agent(scripted("B", &["looking", "DONE"]))
        .build()
        .unwrap();
    let outcome = orchestrator.run(Task::new("review")).await.unwrap();

    assert_eq!(outcome.signal, TerminationSignal::ExplicitCompletionMarkerSeen);
    assert_eq!(outcome.state.round(), 4);
    let a_turns: Vec<&Turn> = outcome
        .state
        .turns()
        .iter()
        .filter(|t| t.speaker.agent_name() == Some("A"))
        .collect();
    assert_eq!(a_turns.len(), 2);
    for turn in a_turns {
        assert_eq!(turn.failure, Some(AgentFailureKind::Timeout));
        assert!(turn.content.starts_with("[agent-failure:timeout]"));
    }
    assert!(outcome.report.finding_for("A").unwrap().failed);
    assert_eq!(outcome.report.status, ComplianceStatus::Inconclusive);

    let stats = orchestrator.monitor().get("A").await.unwrap();
    assert_eq!(stats.timeouts, 2);
}

#[tokio::test]
async fn test_cancellation_keeps_partial_transcript() {
    let orchestrator = Orchestrator::builder(
        OrchestratorConfig::default().with_per_agent_timeout(Duration::from_secs(60)),
    )
    .agent(scripted("A", &["first look done"]))
    .agent(AgentDescriptor::new("B", "slow", Arc::new(Sleeper)))
    .build()
    .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let outcome = orchestrator
        .run_until_cancelled(Task::new("review"), cancel)
        .await
        .unwrap();

    assert_eq!(outcome.signal, TerminationSignal::Cancelled);
    assert_eq!(outcome.state.round(), 1);
    assert_eq!(outcome.state.turn_count(), 2);
    assert_eq!(outcome.report.signal, TerminationSignal::Cancelled);
    assert_eq!(outcome.report.status, ComplianceStatus::Inconclusive);
    assert_eq!(outcome.report.pairs(), vec![("A", "first look done")]);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let orchestrator = Orchestrator::builder(fast_config(3))
        .agent(scripted("A", &["ok"]))
        .build()
        .unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = orchestrator
        .run_until_cancelled(Task::new("review"), cancel)
        .await
        .unwrap();
    assert_eq!(outcome.signal, TerminationSignal::Cancelled);
    assert_eq!(outcome.state.turn_count(), 1);
    assert!(outcome.report.findings.is_empty());
}

#[tokio::test]
async fn test_concurrent_sessions_are_independent() {
    let orchestrator = Arc::new(
        Orchestrator::builder(fast_config(5))
            .agent(scripted("A", &["checking", "DONE"]))
            .agent(scripted("B", &["all clear"]))
            .build()
            .unwrap(),
    );

    let mut handles = Vec::new();
    for i in 0..8 {
        let orchestrator = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            orchestrator.run(Task::new(format!("review #{i}"))).await
        }));
    }

    let mut session_ids = Vec::new();
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.signal, TerminationSignal::ExplicitCompletionMarkerSeen);
        assert_eq!(outcome.state.turn_count(), 4);
        assert_gap_free(outcome.state.turns());
        session_ids.push(outcome.state.session_id());
    }
    session_ids.sort();
    session_ids.dedup();
    assert_eq!(session_ids.len(), 8);

    let a = orchestrator.monitor().get("A").await.unwrap();
    assert_eq!(a.invocations, 16);
}

#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<SessionEvent>>,
}

#[async_trait]
impl SessionObserver for EventLog {
    async fn on_event(&self, event: &SessionEvent) {
        self.events.lock().await.push(event.clone());
    }
}

#[tokio::test]
async fn test_observer_sees_full_lifecycle() {
    let log = Arc::new(EventLog::default());
    let orchestrator = Orchestrator::builder(fast_config(2))
        .agent(scripted("A", &["ok"]))
        .agent(AgentDescriptor::new("B", "b", Arc::new(Broken)))
        .observer(log.clone())
        .build()
        .unwrap();
    let outcome = orchestrator.run(Task::new("review")).await.unwrap();

    let events = log.events.lock().await;
    let kinds: Vec<String> = events
        .iter()
        .map(|e| serde_json::to_value(e).unwrap()["event"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        kinds,
        vec![
            "session_started",
            "turn_appended",
            "agent_selected",
            "turn_appended",
            "agent_selected",
            "agent_failed",
            "turn_appended",
            "session_ended",
        ]
    );
    assert!(events
        .iter()
        .all(|e| e.session_id() == outcome.state.session_id()));
}

#[tokio::test]
async fn test_transcript_recorder_writes_jsonl() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileTranscriptStore::new(dir.path().to_path_buf()).await.unwrap());
    let orchestrator = Orchestrator::builder(fast_config(3))
        .agent(scripted("A", &["ok", "DONE"]))
        .agent(scripted("B", &["fine"]))
        .observer(Arc::new(TranscriptRecorder::new(store.clone())))
        .build()
        .unwrap();
    let outcome = orchestrator.run(Task::new("review")).await.unwrap();

    let entries = store.read(outcome.state.session_id()).await.unwrap();
    let persisted: Vec<Turn> = entries.into_iter().map(|e| e.turn).collect();
    assert_eq!(persisted, outcome.state.turns());
}
