//! Core types and error definitions for the Conclave orchestration engine.
//!
//! This crate provides the foundational types shared across all Conclave crates:
//! error handling, the compliance [`Task`], conversation [`Turn`]s and the
//! [`TerminationSignal`] that explains why a session stopped.
//!
//! # Main types
//!
//! - [`ConclaveError`]: Unified error enum for all Conclave subsystems.
//! - [`ConclaveResult`]: Convenience alias for `Result<T, ConclaveError>`.
//! - [`Task`]: An immutable compliance request submitted by a caller.
//! - [`Speaker`]: Who authored a turn (user, orchestrator or a named agent).
//! - [`Turn`]: A single recorded utterance within a session transcript.
//! - [`TerminationSignal`]: The reason a session's round loop stopped.

/// Error types.
pub mod error;
/// Termination signals.
pub mod signal;
/// Compliance tasks.
pub mod task;
/// Transcript turns and speakers.
pub mod turn;

pub use error::{ConclaveError, ConclaveResult};
pub use signal::TerminationSignal;
pub use task::{Task, TaskMetadata};
pub use turn::{AgentFailureKind, Speaker, Turn, FAILURE_MARKER_PREFIX};
