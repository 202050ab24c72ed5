//! Transactional API over the repair event log.
//!
//! Every append runs in one transaction: sequence assignment, revert checks
//! and the insert either all land or none do.

use std::path::Path;

use rusqlite::Connection;
use serde::Serialize;
use stitch_core::{EventId, RepairOperation, SessionId};
use tracing::{debug, warn};

use crate::errors::{Result, StoreError};
use crate::event::{RepairEvent, RepairEventKind};
use crate::sqlite::connection::{self, ConnectionConfig, ConnectionPool, PooledConnection};
use crate::sqlite::migrations::run_migrations;
use crate::sqlite::repositories::repair_event::RepairEventRepo;

/// Position of the newest event in a session's log.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMarker {
    /// Newest event.
    pub event_id: EventId,
    /// Its sequence.
    pub sequence: i64,
    /// Its stored `created_at` text.
    pub created_at: String,
}

/// Result of re-hashing a session's log.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    /// Events checked.
    pub events: usize,
    /// Events whose stored digest no longer matches their content.
    pub tampered: Vec<EventId>,
}

impl AuditReport {
    /// No tampering found.
    pub fn is_clean(&self) -> bool {
        self.tampered.is_empty()
    }
}

/// The repair event log.
pub struct RepairEventStore {
    pool: ConnectionPool,
}

impl RepairEventStore {
    /// Wrap an already-migrated pool.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Open (and migrate) a file-backed log.
    pub fn open(path: &Path, config: &ConnectionConfig) -> Result<Self> {
        Self::migrated(connection::new_file(path, config)?)
    }

    /// Open (and migrate) an in-memory log.
    pub fn open_in_memory() -> Result<Self> {
        Self::migrated(connection::new_in_memory(&ConnectionConfig::default())?)
    }

    fn migrated(pool: ConnectionPool) -> Result<Self> {
        {
            let conn = pool.get()?;
            let _ = run_migrations(&conn)?;
        }
        Ok(Self::new(pool))
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    /// Append a repair event for `op`.
    pub fn append_repair(&self, op: &RepairOperation) -> Result<RepairEvent> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let sequence = RepairEventRepo::next_sequence(&tx, &op.session_id.to_string())?;
        let event = RepairEvent::repair(op, sequence);
        RepairEventRepo::insert(&tx, &(&event).into())?;
        tx.commit()?;
        debug!(
            session_id = %event.session_id,
            event_id = %event.event_id,
            sequence,
            "appended repair event"
        );
        Ok(event)
    }

    /// Append a revert marker for `target`.
    ///
    /// The target must be a repair event that has not been reverted.
    pub fn append_revert(&self, target: EventId, operator: &str) -> Result<RepairEvent> {
        self.append_reverts(&[target], operator)?
            .pop()
            .ok_or_else(|| StoreError::EventNotFound(target.to_string()))
    }

    /// Append revert markers for every target, in order, as one transaction.
    ///
    /// If any target is rejected or any insert fails, nothing is appended.
    pub fn append_reverts(&self, targets: &[EventId], operator: &str) -> Result<Vec<RepairEvent>> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let mut appended = Vec::with_capacity(targets.len());
        for target in targets {
            appended.push(Self::insert_revert(&tx, *target, operator)?);
        }
        tx.commit()?;
        for event in &appended {
            debug!(
                session_id = %event.session_id,
                event_id = %event.event_id,
                reverts = ?event.reverts(),
                "appended revert event"
            );
        }
        Ok(appended)
    }

    fn insert_revert(conn: &Connection, target: EventId, operator: &str) -> Result<RepairEvent> {
        let original: RepairEvent = RepairEventRepo::get_by_id(conn, &target.to_string())?
            .ok_or_else(|| StoreError::EventNotFound(target.to_string()))?
            .try_into()?;
        if original.kind != RepairEventKind::Repair {
            return Err(StoreError::InvalidOperation(format!(
                "event {target} is a revert marker and cannot be reverted"
            )));
        }
        if RepairEventRepo::is_reverted(conn, &target.to_string())? {
            return Err(StoreError::InvalidOperation(format!(
                "event {target} is already reverted"
            )));
        }

        let sequence = RepairEventRepo::next_sequence(conn, &original.session_id.to_string())?;
        let event = RepairEvent::revert(&original, sequence, operator);
        RepairEventRepo::insert(conn, &(&event).into())?;
        Ok(event)
    }

    /// Fetch one event.
    pub fn get(&self, event_id: EventId) -> Result<Option<RepairEvent>> {
        let conn = self.conn()?;
        RepairEventRepo::get_by_id(&conn, &event_id.to_string())?
            .map(RepairEvent::try_from)
            .transpose()
    }

    /// Every event for a session, in replay order.
    pub fn list_by_session(&self, session_id: SessionId) -> Result<Vec<RepairEvent>> {
        let conn = self.conn()?;
        RepairEventRepo::list_by_session(&conn, &session_id.to_string())?
            .into_iter()
            .map(RepairEvent::try_from)
            .collect()
    }

    /// Position of the newest event, or `None` for an empty log.
    pub fn latest_marker(&self, session_id: SessionId) -> Result<Option<EventMarker>> {
        let conn = self.conn()?;
        RepairEventRepo::latest(&conn, &session_id.to_string())?
            .map(|row| {
                Ok(EventMarker {
                    event_id: row
                        .event_id
                        .parse()
                        .map_err(|e| StoreError::InvalidRow(format!("event_id: {e}")))?,
                    sequence: row.sequence,
                    created_at: row.created_at,
                })
            })
            .transpose()
    }

    /// Newest repair event that has not been reverted.
    pub fn last_unreverted_repair(&self, session_id: SessionId) -> Result<Option<RepairEvent>> {
        let conn = self.conn()?;
        RepairEventRepo::latest_unreverted_repair(&conn, &session_id.to_string())?
            .map(RepairEvent::try_from)
            .transpose()
    }

    /// Whether a revert marker exists for `event_id`.
    pub fn is_reverted(&self, event_id: EventId) -> Result<bool> {
        let conn = self.conn()?;
        RepairEventRepo::is_reverted(&conn, &event_id.to_string())
    }

    /// Number of events stored for a session.
    pub fn count(&self, session_id: SessionId) -> Result<usize> {
        let conn = self.conn()?;
        let n = RepairEventRepo::count_by_session(&conn, &session_id.to_string())?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    /// Recompute every digest for a session.
    pub fn audit(&self, session_id: SessionId) -> Result<AuditReport> {
        let events = self.list_by_session(session_id)?;
        let tampered: Vec<EventId> = events
            .iter()
            .filter(|e| !e.verify_digest())
            .map(|e| e.event_id)
            .collect();
        if !tampered.is_empty() {
            warn!(%session_id, count = tampered.len(), "repair events failed digest check");
        }
        Ok(AuditReport {
            events: events.len(),
            tampered,
        })
    }

    #[cfg(test)]
    pub(crate) fn raw_conn(&self) -> PooledConnection {
        self.pool.get().unwrap()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
