//! Durable repair events.
//!
//! A [`RepairEvent`] is sealed with a SHA-256 digest over every other field
//! at creation. The digest is stored and never recomputed on write; audit
//! recomputes it to detect out-of-band edits.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use stitch_core::{EventId, MessageId, RepairOperation, SessionId};

/// Closed set of event kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RepairEventKind {
    /// Re-parent `message_id` under `new_parent`.
    Repair,
    /// Mark an earlier repair as undone.
    Revert {
        /// The repair being undone.
        reverts: EventId,
    },
}

/// One immutable row of the repair log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairEvent {
    /// Event ID.
    pub event_id: EventId,
    /// Session the repair applies to.
    pub session_id: SessionId,
    /// Per-session append order.
    pub sequence: i64,
    /// Repair or revert.
    pub kind: RepairEventKind,
    /// Re-parented message.
    pub message_id: MessageId,
    /// Parent before the repair.
    pub old_parent: Option<MessageId>,
    /// Parent after the repair.
    pub new_parent: MessageId,
    /// Who made the change.
    pub operator: String,
    /// Why.
    pub reason: String,
    /// Suggester confidence.
    pub confidence: f64,
    /// Whether the validator accepted the change.
    pub validation_passed: bool,
    /// Creation time, microsecond precision.
    pub created_at: DateTime<Utc>,
    /// Lowercase hex SHA-256 over all other fields.
    pub digest: String,
}

/// Fixed-order view hashed into the digest.
#[derive(Serialize)]
struct DigestInput<'a> {
    event_id: EventId,
    session_id: SessionId,
    sequence: i64,
    kind: &'a RepairEventKind,
    message_id: MessageId,
    old_parent: Option<MessageId>,
    new_parent: MessageId,
    operator: &'a str,
    reason: &'a str,
    confidence: f64,
    validation_passed: bool,
    is_reverted: bool,
    created_at: String,
}

impl RepairEvent {
    /// Build and seal a repair event for `op`.
    pub fn repair(op: &RepairOperation, sequence: i64) -> Self {
        Self {
            event_id: EventId::new(),
            session_id: op.session_id,
            sequence,
            kind: RepairEventKind::Repair,
            message_id: op.message_id,
            old_parent: op.old_parent,
            new_parent: op.new_parent,
            operator: op.operator.clone(),
            reason: op.reason.clone(),
            confidence: op.confidence,
            validation_passed: true,
            created_at: now_micros(),
            digest: String::new(),
        }
        .seal()
    }

    /// Build and seal a revert marker for `target`.
    ///
    /// The marker copies the target's message and parents so the log reads
    /// on its own; replay ignores them.
    pub fn revert(target: &Self, sequence: i64, operator: &str) -> Self {
        Self {
            event_id: EventId::new(),
            session_id: target.session_id,
            sequence,
            kind: RepairEventKind::Revert {
                reverts: target.event_id,
            },
            message_id: target.message_id,
            old_parent: target.old_parent,
            new_parent: target.new_parent,
            operator: operator.to_string(),
            reason: format!("revert {}", target.event_id),
            confidence: target.confidence,
            validation_passed: true,
            created_at: now_micros(),
            digest: String::new(),
        }
        .seal()
    }

    /// Whether this is a revert marker.
    pub fn is_reverted(&self) -> bool {
        matches!(self.kind, RepairEventKind::Revert { .. })
    }

    /// The event this one reverts, if any.
    pub fn reverts(&self) -> Option<EventId> {
        match self.kind {
            RepairEventKind::Revert { reverts } => Some(reverts),
            RepairEventKind::Repair => None,
        }
    }

    /// `created_at` in the stored text form.
    pub fn created_at_text(&self) -> String {
        format_timestamp(self.created_at)
    }

    /// Recompute the digest from the current field values.
    pub fn compute_digest(&self) -> String {
        let input = DigestInput {
            event_id: self.event_id,
            session_id: self.session_id,
            sequence: self.sequence,
            kind: &self.kind,
            message_id: self.message_id,
            old_parent: self.old_parent,
            new_parent: self.new_parent,
            operator: &self.operator,
            reason: &self.reason,
            confidence: self.confidence,
            validation_passed: self.validation_passed,
            is_reverted: self.is_reverted(),
            created_at: self.created_at_text(),
        };
        // Plain data with string keys; serialization cannot fail.
        let bytes = serde_json::to_vec(&input).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        format!("{:x}", hasher.finalize())
    }

    /// Whether the stored digest still matches the content.
    pub fn verify_digest(&self) -> bool {
        self.digest == self.compute_digest()
    }

    fn seal(mut self) -> Self {
        self.digest = self.compute_digest();
        self
    }
}

fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// RFC 3339 UTC with microseconds; sorts lexically in time order.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
