//! Raw row shape of `repairs_events` and conversion to [`RepairEvent`].

use chrono::{DateTime, Utc};
use stitch_core::{EventId, MessageId, SessionId};

use crate::errors::StoreError;
use crate::event::{RepairEvent, RepairEventKind};

/// One `repairs_events` row, as stored.
#[derive(Clone, Debug, PartialEq)]
pub struct RepairEventRow {
    /// Event ID.
    pub event_id: String,
    /// Session ID.
    pub session_id: String,
    /// Per-session sequence.
    pub sequence: i64,
    /// Re-parented message.
    pub message_id: String,
    /// Parent before the repair.
    pub old_parent: Option<String>,
    /// Parent after the repair.
    pub new_parent: String,
    /// Operator.
    pub operator: String,
    /// Reason.
    pub reason: String,
    /// Confidence.
    pub confidence: f64,
    /// Validator verdict.
    pub validation_passed: bool,
    /// Revert marker flag.
    pub is_reverted: bool,
    /// Target of a revert marker.
    pub reverts_event_id: Option<String>,
    /// Stored digest.
    pub digest: String,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl From<&RepairEvent> for RepairEventRow {
    fn from(event: &RepairEvent) -> Self {
        Self {
            event_id: event.event_id.to_string(),
            session_id: event.session_id.to_string(),
            sequence: event.sequence,
            message_id: event.message_id.to_string(),
            old_parent: event.old_parent.map(|p| p.to_string()),
            new_parent: event.new_parent.to_string(),
            operator: event.operator.clone(),
            reason: event.reason.clone(),
            confidence: event.confidence,
            validation_passed: event.validation_passed,
            is_reverted: event.is_reverted(),
            reverts_event_id: event.reverts().map(|id| id.to_string()),
            digest: event.digest.clone(),
            created_at: event.created_at_text(),
        }
    }
}

impl TryFrom<RepairEventRow> for RepairEvent {
    type Error = StoreError;

    fn try_from(row: RepairEventRow) -> Result<Self, Self::Error> {
        let kind = match (row.is_reverted, &row.reverts_event_id) {
            (false, None) => RepairEventKind::Repair,
            (true, Some(target)) => RepairEventKind::Revert {
                reverts: parse_id(target, "reverts_event_id")?,
            },
            _ => {
                return Err(StoreError::InvalidRow(format!(
                    "event {}: is_reverted and reverts_event_id disagree",
                    row.event_id
                )));
            }
        };
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| StoreError::InvalidRow(format!("created_at {:?}: {e}", row.created_at)))?
            .with_timezone(&Utc);

        Ok(Self {
            event_id: parse_id::<EventId>(&row.event_id, "event_id")?,
            session_id: parse_id::<SessionId>(&row.session_id, "session_id")?,
            sequence: row.sequence,
            kind,
            message_id: parse_id::<MessageId>(&row.message_id, "message_id")?,
            old_parent: row
                .old_parent
                .as_deref()
                .map(|p| parse_id::<MessageId>(p, "old_parent"))
                .transpose()?,
            new_parent: parse_id::<MessageId>(&row.new_parent, "new_parent")?,
            operator: row.operator,
            reason: row.reason,
            confidence: row.confidence,
            validation_passed: row.validation_passed,
            created_at,
            digest: row.digest,
        })
    }
}

fn parse_id<T>(raw: &str, column: &str) -> Result<T, StoreError>
where
    T: std::str::FromStr<Err = uuid::Error>,
{
    raw.parse()
        .map_err(|e| StoreError::InvalidRow(format!("{column} {raw:?}: {e}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
