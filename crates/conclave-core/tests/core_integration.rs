#![allow(clippy::unwrap_used, clippy::expect_used)]

use conclave_core::*;

// ---------------------------------------------------------------------------
// 1. Turns survive a JSON round trip with speaker and failure intact
// ---------------------------------------------------------------------------

#[test]
fn failure_turn_serialization_keeps_kind() {
    let turn = Turn::failure(
        4,
        "DataResidencyAgent",
        AgentFailureKind::MalformedReply,
        "empty reply",
    );

    let json = serde_json::to_string(&turn).unwrap();
    let deserialized: Turn = serde_json::from_str(&json).unwrap();

    assert_eq!(deserialized.sequence, 4);
    assert_eq!(deserialized.speaker.agent_name(), Some("DataResidencyAgent"));
    assert_eq!(deserialized.failure, Some(AgentFailureKind::MalformedReply));
    assert!(deserialized.content.starts_with(FAILURE_MARKER_PREFIX));
    assert_eq!(deserialized.timestamp, turn.timestamp);
}

// ---------------------------------------------------------------------------
// 2. Error display and classification
// ---------------------------------------------------------------------------

#[test]
fn config_error_display() {
    let err = ConclaveError::config("agent registry is empty");
    assert!(err.is_config());
    assert_eq!(err.to_string(), "Config error: agent registry is empty");

    let io = ConclaveError::from(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "missing",
    ));
    assert!(!io.is_config());
    assert!(io.to_string().starts_with("IO error"));
}

// ---------------------------------------------------------------------------
// 3. Tasks serialize with their metadata
// ---------------------------------------------------------------------------

#[test]
fn task_serialization_roundtrip() {
    let task = Task::new("Check GDPR data residency")
        .with_scope("GDPR")
        .with_label("ticket", "CMP-118");

    let json = serde_json::to_string(&task).unwrap();
    let parsed: Task = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, task);
    assert_eq!(parsed.metadata.labels.get("ticket").map(String::as_str), Some("CMP-118"));
}
