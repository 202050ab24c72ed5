//! Persistence Provider interface.
//!
//! [`PersistenceProvider`] is the only surface the executor sees: four
//! operations, no file paths or database handles. [`RepairJournal`] answers
//! "what would undo-last undo" without widening that surface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use stitch_core::{EventId, Message, RepairOperation, SessionId};

use crate::errors::Result;

/// How a backup was taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BackupKind {
    /// Full physical copy of the session file.
    Snapshot,
    /// A marker into the repair event log; nothing was copied.
    Virtual,
}

/// Reference to a backup taken before a repair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupHandle {
    /// Session the backup belongs to.
    pub session_id: SessionId,
    /// Provider-specific backup identifier.
    pub backup_id: String,
    /// When the backup was taken.
    pub created_at: DateTime<Utc>,
    /// Physical or virtual.
    pub kind: BackupKind,
}

/// What an undo should reverse.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UndoRef {
    /// Restore the state captured by a backup.
    Backup(BackupHandle),
    /// Revert a single repair event.
    Event(EventId),
}

/// Acknowledgement of a durable write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    /// Session written to.
    pub session_id: SessionId,
    /// Event appended, for the event-sourced provider.
    pub event_id: Option<EventId>,
}

/// Durable recording of repairs.
///
/// A call either fully succeeds or leaves nothing durable behind.
/// Implementations do no locking of their own: concurrent writers to the
/// same session must be serialized by the caller.
#[async_trait]
pub trait PersistenceProvider: Send + Sync {
    /// Current (repaired) message set for a session.
    async fn load_messages(&self, session_id: SessionId) -> Result<Vec<Message>>;

    /// Capture the current state before a repair.
    async fn create_backup(&self, session_id: SessionId) -> Result<BackupHandle>;

    /// Durably record a validated repair.
    async fn apply_repair(&self, op: &RepairOperation) -> Result<Ack>;

    /// Reverse an earlier repair or restore a backup.
    async fn undo(&self, target: &UndoRef) -> Result<Ack>;
}

/// Tracks which repair `undo_last` should reverse.
#[async_trait]
pub trait RepairJournal: Send + Sync {
    /// Newest undoable reference for the session, if any.
    async fn last_undoable(&self, session_id: SessionId) -> Result<Option<UndoRef>>;

    /// Drop a backup whose repair never became durable, so that
    /// `last_undoable` no longer offers it.
    async fn discard_backup(&self, handle: &BackupHandle) -> Result<()>;
}

/// A provider the executor can drive end to end.
pub trait RepairBackend: PersistenceProvider + RepairJournal {}

impl<T: PersistenceProvider + RepairJournal> RepairBackend for T {}

/// Synchronous source of base (unrepaired) message sets.
pub trait MessageSource: Send + Sync {
    /// All messages recorded for `session_id`.
    fn load(&self, session_id: SessionId) -> Result<Vec<Message>>;
}
