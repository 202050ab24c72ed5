//! Repair event repository: insert and query `repairs_events` rows.
//!
//! There is no update or delete: the table's triggers abort both.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;
use crate::sqlite::row_types::RepairEventRow;

const COLUMNS: &str = "event_id, session_id, sequence, message_id, old_parent, new_parent, \
     operator, reason, confidence, validation_passed, is_reverted, reverts_event_id, digest, created_at";

/// Repair event repository.
pub struct RepairEventRepo;

impl RepairEventRepo {
    /// Insert one row.
    pub fn insert(conn: &Connection, row: &RepairEventRow) -> Result<()> {
        let _ = conn.execute(
            &format!(
                "INSERT INTO repairs_events ({COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
            ),
            params![
                row.event_id,
                row.session_id,
                row.sequence,
                row.message_id,
                row.old_parent,
                row.new_parent,
                row.operator,
                row.reason,
                row.confidence,
                row.validation_passed,
                row.is_reverted,
                row.reverts_event_id,
                row.digest,
                row.created_at,
            ],
        )?;
        Ok(())
    }

    /// Fetch a row by event ID.
    pub fn get_by_id(conn: &Connection, event_id: &str) -> Result<Option<RepairEventRow>> {
        Ok(conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM repairs_events WHERE event_id = ?1"),
                params![event_id],
                Self::map_row,
            )
            .optional()?)
    }

    /// All rows for a session in replay order (`created_at`, then sequence).
    pub fn list_by_session(conn: &Connection, session_id: &str) -> Result<Vec<RepairEventRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM repairs_events WHERE session_id = ?1 \
             ORDER BY created_at ASC, sequence ASC"
        ))?;
        let rows = stmt
            .query_map(params![session_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Newest row for a session.
    pub fn latest(conn: &Connection, session_id: &str) -> Result<Option<RepairEventRow>> {
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM repairs_events WHERE session_id = ?1 \
                     ORDER BY created_at DESC, sequence DESC LIMIT 1"
                ),
                params![session_id],
                Self::map_row,
            )
            .optional()?)
    }

    /// Newest repair row that no revert marker points at.
    pub fn latest_unreverted_repair(
        conn: &Connection,
        session_id: &str,
    ) -> Result<Option<RepairEventRow>> {
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM repairs_events e WHERE e.session_id = ?1 \
                     AND e.is_reverted = 0 \
                     AND NOT EXISTS (SELECT 1 FROM repairs_events r WHERE r.reverts_event_id = e.event_id) \
                     ORDER BY e.created_at DESC, e.sequence DESC LIMIT 1"
                ),
                params![session_id],
                Self::map_row,
            )
            .optional()?)
    }

    /// Whether a revert marker exists for `event_id`.
    pub fn is_reverted(conn: &Connection, event_id: &str) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM repairs_events WHERE reverts_event_id = ?1",
            params![event_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Next sequence number for a session (1-based).
    pub fn next_sequence(conn: &Connection, session_id: &str) -> Result<i64> {
        let max: Option<i64> = conn.query_row(
            "SELECT MAX(sequence) FROM repairs_events WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0) + 1)
    }

    /// Number of rows for a session.
    pub fn count_by_session(conn: &Connection, session_id: &str) -> Result<i64> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM repairs_events WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RepairEventRow> {
        Ok(RepairEventRow {
            event_id: row.get(0)?,
            session_id: row.get(1)?,
            sequence: row.get(2)?,
            message_id: row.get(3)?,
            old_parent: row.get(4)?,
            new_parent: row.get(5)?,
            operator: row.get(6)?,
            reason: row.get(7)?,
            confidence: row.get(8)?,
            validation_passed: row.get(9)?,
            is_reverted: row.get(10)?,
            reverts_event_id: row.get(11)?,
            digest: row.get(12)?,
            created_at: row.get(13)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RepairEvent;
    use crate::sqlite::migrations::run_migrations;
    use crate::test_support::operation;
    use stitch_core::{MessageId, SessionId};

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        let _ = run_migrations(&conn).unwrap();
        conn
    }

    fn repair(session: SessionId, sequence: i64) -> RepairEvent {
        RepairEvent::repair(
            &operation(session, MessageId::new(), None, MessageId::new()),
            sequence,
        )
    }

    #[test]
    fn insert_and_get() {
        let conn = setup();
        let event = repair(SessionId::new(), 1);
        let row = RepairEventRow::from(&event);
        RepairEventRepo::insert(&conn, &row).unwrap();
        let fetched = RepairEventRepo::get_by_id(&conn, &row.event_id).unwrap().unwrap();
        assert_eq!(fetched, row);
        assert!(RepairEventRepo::get_by_id(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn sequence_and_listing_are_per_session() {
        let conn = setup();
        let (s1, s2) = (SessionId::new(), SessionId::new());
        assert_eq!(RepairEventRepo::next_sequence(&conn, &s1.to_string()).unwrap(), 1);
        RepairEventRepo::insert(&conn, &RepairEventRow::from(&repair(s1, 1))).unwrap();
        RepairEventRepo::insert(&conn, &RepairEventRow::from(&repair(s1, 2))).unwrap();
        RepairEventRepo::insert(&conn, &RepairEventRow::from(&repair(s2, 1))).unwrap();

        assert_eq!(RepairEventRepo::next_sequence(&conn, &s1.to_string()).unwrap(), 3);
        let listed = RepairEventRepo::list_by_session(&conn, &s1.to_string()).unwrap();
        assert_eq!(listed.iter().map(|r| r.sequence).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(RepairEventRepo::count_by_session(&conn, &s2.to_string()).unwrap(), 1);
    }

    #[test]
    fn duplicate_sequence_is_rejected() {
        let conn = setup();
        let sid = SessionId::new();
        RepairEventRepo::insert(&conn, &RepairEventRow::from(&repair(sid, 1))).unwrap();
        assert!(RepairEventRepo::insert(&conn, &RepairEventRow::from(&repair(sid, 1))).is_err());
    }

    #[test]
    fn updates_and_deletes_abort() {
        let conn = setup();
        let row = RepairEventRow::from(&repair(SessionId::new(), 1));
        RepairEventRepo::insert(&conn, &row).unwrap();
        assert!(
            conn.execute("UPDATE repairs_events SET reason = 'x'", [])
                .is_err()
        );
        assert!(conn.execute("DELETE FROM repairs_events", []).is_err());
        assert_eq!(RepairEventRepo::get_by_id(&conn, &row.event_id).unwrap().unwrap(), row);
    }

    #[test]
    fn event_can_be_reverted_once() {
        let conn = setup();
        let sid = SessionId::new();
        let original = repair(sid, 1);
        RepairEventRepo::insert(&conn, &RepairEventRow::from(&original)).unwrap();
        RepairEventRepo::insert(&conn, &RepairEventRow::from(&RepairEvent::revert(&original, 2, "op"))).unwrap();
        assert!(
            RepairEventRepo::insert(&conn, &RepairEventRow::from(&RepairEvent::revert(&original, 3, "op")))
                .is_err()
        );
        assert!(RepairEventRepo::is_reverted(&conn, &original.event_id.to_string()).unwrap());
    }

    #[test]
    fn latest_unreverted_skips_reverted_and_markers() {
        let conn = setup();
        let sid = SessionId::new();
        let first = repair(sid, 1);
        let second = repair(sid, 2);
        RepairEventRepo::insert(&conn, &RepairEventRow::from(&first)).unwrap();
        RepairEventRepo::insert(&conn, &RepairEventRow::from(&second)).unwrap();
        RepairEventRepo::insert(&conn, &RepairEventRow::from(&RepairEvent::revert(&second, 3, "op"))).unwrap();

        let latest = RepairEventRepo::latest_unreverted_repair(&conn, &sid.to_string())
            .unwrap()
            .unwrap();
        assert_eq!(latest.event_id, first.event_id.to_string());
        let newest = RepairEventRepo::latest(&conn, &sid.to_string()).unwrap().unwrap();
        assert_eq!(newest.sequence, 3);
    }
}
