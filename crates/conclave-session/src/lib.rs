//! Conversation state and transcript persistence for Conclave sessions.
//!
//! - [`ConversationState`]: the append-only transcript and round counter owned
//!   by a single running session.
//! - [`TranscriptStore`]: sink for recorded turns, with file and in-memory
//!   implementations.

/// Append-only conversation state.
pub mod state;
/// Transcript persistence.
pub mod transcript;

pub use state::ConversationState;
pub use transcript::{
    FileTranscriptStore, MemoryTranscriptStore, TranscriptEntry, TranscriptStore,
};
