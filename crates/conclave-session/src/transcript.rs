use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conclave_core::{ConclaveError, ConclaveResult, Turn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// TranscriptEntry
// ---------------------------------------------------------------------------

/// One persisted turn, tagged with its session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Session the turn belongs to.
    pub session_id: Uuid,
    /// When the entry was written.
    pub recorded_at: DateTime<Utc>,
    /// The recorded turn.
    pub turn: Turn,
}

impl TranscriptEntry {
    /// Wraps a turn for persistence.
    pub fn new(session_id: Uuid, turn: Turn) -> Self {
        Self {
            session_id,
            recorded_at: Utc::now(),
            turn,
        }
    }
}

// ---------------------------------------------------------------------------
// TranscriptStore trait
// ---------------------------------------------------------------------------

/// Sink for session transcripts.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Appends one entry.
    async fn append(&self, entry: TranscriptEntry) -> ConclaveResult<()>;
    /// Reads all entries of a session ordered by turn sequence.
    async fn read(&self, session_id: Uuid) -> ConclaveResult<Vec<TranscriptEntry>>;
}

// ---------------------------------------------------------------------------
// FileTranscriptStore
// ---------------------------------------------------------------------------

/// Stores one JSON Lines file per session.
pub struct FileTranscriptStore {
    dir: PathBuf,
}

impl FileTranscriptStore {
    /// Opens (and creates if needed) a transcript directory.
    pub async fn new(dir: PathBuf) -> ConclaveResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn transcript_path(&self, session_id: Uuid) -> PathBuf {
        self.dir.join(format!("{session_id}.transcript.jsonl"))
    }
}

#[async_trait]
impl TranscriptStore for FileTranscriptStore {
    async fn append(&self, entry: TranscriptEntry) -> ConclaveResult<()> {
        let path = self.transcript_path(entry.session_id);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn read(&self, session_id: Uuid) -> ConclaveResult<Vec<TranscriptEntry>> {
        let path = self.transcript_path(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = tokio::fs::read_to_string(&path).await?;
        let mut entries: Vec<TranscriptEntry> = data
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort_by_key(|e| e.turn.sequence);
        Ok(entries)
    }
}

// ---------------------------------------------------------------------------
// MemoryTranscriptStore
// ---------------------------------------------------------------------------

/// In-memory store, mostly useful in tests and short-lived tools.
#[derive(Default)]
pub struct MemoryTranscriptStore {
    sessions: RwLock<HashMap<Uuid, Vec<TranscriptEntry>>>,
}

impl MemoryTranscriptStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions with at least one entry.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl TranscriptStore for MemoryTranscriptStore {
    async fn append(&self, entry: TranscriptEntry) -> ConclaveResult<()> {
        let mut sessions = self.sessions.write().await;
        let entries = sessions.entry(entry.session_id).or_default();
        if let Some(last) = entries.last() {
            if entry.turn.sequence <= last.turn.sequence {
                return Err(ConclaveError::Session(format!(
                    "turn {} appended after turn {}",
                    entry.turn.sequence, last.turn.sequence
                )));
            }
        }
        entries.push(entry);
        Ok(())
    }

    async fn read(&self, session_id: Uuid) -> ConclaveResult<Vec<TranscriptEntry>> {
        Ok(self
            .sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
