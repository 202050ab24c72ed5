//! Event-sourced provider: base messages are never written.
//!
//! `apply_repair` appends a [`RepairEvent`]; `undo` appends a revert marker.
//! Current state is the base message set with the log replayed over it
//! (see [`materialize`]), optionally served from a [`MaterializedCache`].

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use stitch_core::{EventId, Message, RepairOperation, SessionId};
use tracing::{debug, info};

use crate::cache::MaterializedCache;
use crate::errors::{Result, StoreError};
use crate::event::{RepairEvent, RepairEventKind};
use crate::event_store::{AuditReport, RepairEventStore};
use crate::materialize::materialize;
use crate::provider::{
    Ack, BackupHandle, BackupKind, MessageSource, PersistenceProvider, RepairJournal, UndoRef,
};

const VIRTUAL_BACKUP_PREFIX: &str = "seq-";

/// Provider that records repairs as append-only events.
pub struct EventSourcedProvider {
    source: Arc<dyn MessageSource>,
    events: Arc<RepairEventStore>,
    cache: Option<Arc<MaterializedCache>>,
}

impl EventSourcedProvider {
    /// Create a provider reading base messages from `source`.
    pub fn new(source: Arc<dyn MessageSource>, events: Arc<RepairEventStore>) -> Self {
        Self {
            source,
            events,
            cache: None,
        }
    }

    /// Serve materialized state through `cache`.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<MaterializedCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The event log.
    pub fn events(&self) -> &RepairEventStore {
        &self.events
    }

    /// The materialized-view cache, if any.
    pub fn cache(&self) -> Option<&MaterializedCache> {
        self.cache.as_deref()
    }

    /// Every event for a session, in replay order.
    pub fn history(&self, session_id: SessionId) -> Result<Vec<RepairEvent>> {
        self.events.list_by_session(session_id)
    }

    /// Recompute every stored digest for a session.
    pub fn audit(&self, session_id: SessionId) -> Result<AuditReport> {
        self.events.audit(session_id)
    }

    /// Drop cached state for a session, e.g. after its base file changed.
    pub fn invalidate(&self, session_id: SessionId) {
        if let Some(cache) = &self.cache {
            cache.invalidate(session_id);
        }
    }

    fn materialized(&self, session_id: SessionId) -> Result<Arc<Vec<Message>>> {
        let marker = self.events.latest_marker(session_id)?;
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(session_id, marker.as_ref()) {
                return Ok(hit);
            }
        }

        let base = self.source.load(session_id)?;
        let events = self.events.list_by_session(session_id)?;
        let messages = Arc::new(materialize(base, &events));
        debug!(%session_id, events = events.len(), "materialized session");

        if let Some(cache) = &self.cache {
            cache.put(session_id, marker, Arc::clone(&messages));
        }
        Ok(messages)
    }

    fn revert(&self, target: EventId, operator: &str) -> Result<RepairEvent> {
        let event = self.events.append_revert(target, operator)?;
        self.invalidate(event.session_id);
        info!(
            session_id = %event.session_id,
            event_id = %event.event_id,
            reverts = %target,
            "repair reverted"
        );
        Ok(event)
    }

    fn rewind_to(&self, handle: &BackupHandle) -> Result<Ack> {
        let floor = handle
            .backup_id
            .strip_prefix(VIRTUAL_BACKUP_PREFIX)
            .and_then(|n| n.parse::<i64>().ok())
            .ok_or_else(|| StoreError::BackupNotFound(handle.backup_id.clone()))?;

        let events = self.events.list_by_session(handle.session_id)?;
        let reverted: HashSet<EventId> = events.iter().filter_map(RepairEvent::reverts).collect();
        let pending: Vec<&RepairEvent> = events
            .iter()
            .filter(|e| {
                e.kind == RepairEventKind::Repair
                    && e.sequence > floor
                    && !reverted.contains(&e.event_id)
            })
            .collect();
        if pending.is_empty() {
            return Err(StoreError::InvalidOperation(format!(
                "nothing to revert after backup {}",
                handle.backup_id
            )));
        }

        let targets: Vec<EventId> = pending.iter().rev().map(|e| e.event_id).collect();
        let reverts = self.events.append_reverts(&targets, "undo")?;
        self.invalidate(handle.session_id);
        info!(
            session_id = %handle.session_id,
            backup_id = %handle.backup_id,
            reverted = reverts.len(),
            "rewound to backup"
        );
        Ok(Ack {
            session_id: handle.session_id,
            event_id: reverts.last().map(|e| e.event_id),
        })
    }
}

impl std::fmt::Debug for EventSourcedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSourcedProvider")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PersistenceProvider for EventSourcedProvider {
    async fn load_messages(&self, session_id: SessionId) -> Result<Vec<Message>> {
        Ok(self.materialized(session_id)?.as_ref().clone())
    }

    async fn create_backup(&self, session_id: SessionId) -> Result<BackupHandle> {
        let sequence = self
            .events
            .latest_marker(session_id)?
            .map_or(0, |m| m.sequence);
        Ok(BackupHandle {
            session_id,
            backup_id: format!("{VIRTUAL_BACKUP_PREFIX}{sequence}"),
            created_at: Utc::now(),
            kind: BackupKind::Virtual,
        })
    }

    async fn apply_repair(&self, op: &RepairOperation) -> Result<Ack> {
        let current = self.materialized(op.session_id)?;
        let message = current
            .iter()
            .find(|m| m.id == op.message_id)
            .ok_or_else(|| StoreError::MessageNotFound(op.message_id.to_string()))?;
        if message.parent_id != op.old_parent {
            return Err(StoreError::InvalidOperation(format!(
                "stale repair: {} no longer has parent {:?}",
                op.message_id,
                op.old_parent.map(|p| p.to_string())
            )));
        }

        let event = self.events.append_repair(op)?;
        self.invalidate(op.session_id);
        info!(
            session_id = %op.session_id,
            message_id = %op.message_id,
            event_id = %event.event_id,
            new_parent = %op.new_parent,
            "repair event appended"
        );
        Ok(Ack {
            session_id: op.session_id,
            event_id: Some(event.event_id),
        })
    }

    async fn undo(&self, target: &UndoRef) -> Result<Ack> {
        match target {
            UndoRef::Event(id) => {
                let event = self.revert(*id, "undo")?;
                Ok(Ack {
                    session_id: event.session_id,
                    event_id: Some(event.event_id),
                })
            }
            UndoRef::Backup(handle) if handle.kind == BackupKind::Virtual => self.rewind_to(handle),
            UndoRef::Backup(_) => Err(StoreError::InvalidOperation(
                "event-sourced provider can only rewind to virtual backups".into(),
            )),
        }
    }
}

#[async_trait]
impl RepairJournal for EventSourcedProvider {
    async fn last_undoable(&self, session_id: SessionId) -> Result<Option<UndoRef>> {
        Ok(self
            .events
            .last_unreverted_repair(session_id)?
            .map(|e| UndoRef::Event(e.event_id)))
    }

    async fn discard_backup(&self, handle: &BackupHandle) -> Result<()> {
        // virtual markers hold no state of their own
        debug!(session_id = %handle.session_id, backup_id = %handle.backup_id, "nothing to discard");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
