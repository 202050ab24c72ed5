//! Mutation provider: rewrites session files in place.
//!
//! Backups are full copies under `<backup_dir>/<session_id>/`, named
//! `<millis>-<uuid>.jsonl` so lexical order is creation order. Restoring a
//! backup renames it to `*.jsonl.restored`, and a backup whose repair failed
//! is renamed to `*.jsonl.abandoned`. Neither is ever deleted.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stitch_core::{Message, RepairOperation, SessionId};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::{Result, StoreError};
use crate::jsonl_store::{JsonlMessageStore, write_atomic};
use crate::provider::{
    Ack, BackupHandle, BackupKind, MessageSource, PersistenceProvider, RepairJournal, UndoRef,
};

const BACKUP_EXT: &str = "jsonl";
const RESTORED_SUFFIX: &str = ".restored";
const ABANDONED_SUFFIX: &str = ".abandoned";

/// Provider that edits `parent_id` directly in the session file.
#[derive(Clone, Debug)]
pub struct MutationProvider {
    store: JsonlMessageStore,
    backup_dir: PathBuf,
}

impl MutationProvider {
    /// Create a provider over `store`, keeping backups in `backup_dir`.
    pub fn new(store: JsonlMessageStore, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            backup_dir: backup_dir.into(),
        }
    }

    /// The underlying message store.
    pub fn store(&self) -> &JsonlMessageStore {
        &self.store
    }

    /// Backups for a session that have not been restored, newest first.
    pub fn pending_backups(&self, session_id: SessionId) -> Result<Vec<BackupHandle>> {
        let dir = self.session_backup_dir(session_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids: Vec<String> = fs::read_dir(&dir)?
            .filter_map(std::result::Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                name.strip_suffix(&format!(".{BACKUP_EXT}")).map(str::to_owned)
            })
            .collect();
        ids.sort_unstable_by(|a, b| b.cmp(a));
        Ok(ids
            .into_iter()
            .map(|backup_id| BackupHandle {
                session_id,
                created_at: created_at_of(&backup_id),
                backup_id,
                kind: BackupKind::Snapshot,
            })
            .collect())
    }

    fn session_backup_dir(&self, session_id: SessionId) -> PathBuf {
        self.backup_dir.join(session_id.to_string())
    }

    fn backup_path(&self, handle: &BackupHandle) -> PathBuf {
        self.session_backup_dir(handle.session_id)
            .join(format!("{}.{BACKUP_EXT}", handle.backup_id))
    }

    fn restore(&self, handle: &BackupHandle) -> Result<Ack> {
        if handle.kind != BackupKind::Snapshot {
            return Err(StoreError::InvalidOperation(
                "mutation provider can only restore snapshot backups".into(),
            ));
        }
        let path = self.backup_path(handle);
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::BackupNotFound(handle.backup_id.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        self.store.write_raw(handle.session_id, &contents)?;
        fs::rename(&path, suffixed(&path, RESTORED_SUFFIX))?;
        info!(session_id = %handle.session_id, backup_id = %handle.backup_id, "restored backup");
        Ok(Ack {
            session_id: handle.session_id,
            event_id: None,
        })
    }

    fn abandon(&self, handle: &BackupHandle) -> Result<()> {
        let path = self.backup_path(handle);
        match fs::rename(&path, suffixed(&path, ABANDONED_SUFFIX)) {
            Ok(()) => {
                debug!(session_id = %handle.session_id, backup_id = %handle.backup_id, "abandoned backup");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::BackupNotFound(handle.backup_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn created_at_of(backup_id: &str) -> DateTime<Utc> {
    backup_id
        .split('-')
        .next()
        .and_then(|ms| ms.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_default()
}

#[async_trait]
impl PersistenceProvider for MutationProvider {
    async fn load_messages(&self, session_id: SessionId) -> Result<Vec<Message>> {
        self.store.load(session_id)
    }

    async fn create_backup(&self, session_id: SessionId) -> Result<BackupHandle> {
        let contents = self.store.read_raw(session_id)?;
        let now = Utc::now();
        let created_at = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);
        let handle = BackupHandle {
            session_id,
            backup_id: format!("{:013}-{}", created_at.timestamp_millis(), Uuid::now_v7()),
            created_at,
            kind: BackupKind::Snapshot,
        };
        write_atomic(&self.backup_path(&handle), &contents)?;
        debug!(%session_id, backup_id = %handle.backup_id, "created backup");
        Ok(handle)
    }

    async fn apply_repair(&self, op: &RepairOperation) -> Result<Ack> {
        let _ = self.store.rewrite_parent(
            op.session_id,
            op.message_id,
            Some(op.old_parent),
            Some(op.new_parent),
        )?;
        info!(
            session_id = %op.session_id,
            message_id = %op.message_id,
            new_parent = %op.new_parent,
            "repair written to session file"
        );
        Ok(Ack {
            session_id: op.session_id,
            event_id: None,
        })
    }

    async fn undo(&self, target: &UndoRef) -> Result<Ack> {
        match target {
            UndoRef::Backup(handle) => self.restore(handle),
            UndoRef::Event(id) => Err(StoreError::InvalidOperation(format!(
                "mutation provider keeps no event log (asked to revert {id})"
            ))),
        }
    }
}

#[async_trait]
impl RepairJournal for MutationProvider {
    async fn last_undoable(&self, session_id: SessionId) -> Result<Option<UndoRef>> {
        let pending = self.pending_backups(session_id)?;
        if pending.is_empty() {
            return Ok(None);
        }
        // A backup identical to the live file belongs to a repair that never
        // landed; restoring it would undo nothing.
        let current = self.store.read_raw(session_id)?;
        for handle in pending {
            if fs::read_to_string(self.backup_path(&handle))? == current {
                self.abandon(&handle)?;
                continue;
            }
            return Ok(Some(UndoRef::Backup(handle)));
        }
        Ok(None)
    }

    async fn discard_backup(&self, handle: &BackupHandle) -> Result<()> {
        self.abandon(handle)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
