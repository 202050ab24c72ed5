//! Repair operations and the rejection taxonomy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{MessageId, SessionId};

/// A validated re-parenting, not yet durable.
///
/// Built by the executor after validation succeeds and handed to a
/// persistence provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RepairOperation {
    /// Session the message belongs to.
    pub session_id: SessionId,
    /// Message being reattached.
    pub message_id: MessageId,
    /// Parent before the repair.
    pub old_parent: Option<MessageId>,
    /// Parent after the repair.
    pub new_parent: MessageId,
    /// Free-form justification.
    pub reason: String,
    /// Suggester confidence for this pairing, in `[0, 1]`.
    pub confidence: f64,
    /// Who asked for the repair.
    pub operator: String,
    /// When the operation was built.
    pub timestamp: DateTime<Utc>,
}

/// Why the validator refused a proposed re-parenting.
///
/// Display strings start with the taxonomy name so callers can render them
/// directly.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", rename_all = "camelCase")]
pub enum RejectReason {
    /// The proposed parent (or the message itself) is not in the session.
    #[error("TargetNotFound: {id} does not resolve to a message in this session")]
    TargetNotFound {
        /// The unresolved ID.
        id: MessageId,
    },
    /// The proposed parent descends from the message.
    #[error("CycleDetected: attaching {message} under {parent} would create a cycle")]
    CycleDetected {
        /// Message being reattached.
        message: MessageId,
        /// Proposed parent.
        parent: MessageId,
    },
    /// The proposed parent is newer than the message.
    #[error(
        "TimestampViolation: parent {parent} ({parent_time}) is later than {message} ({message_time})"
    )]
    TimestampViolation {
        /// Message being reattached.
        message: MessageId,
        /// Its timestamp.
        message_time: DateTime<Utc>,
        /// Proposed parent.
        parent: MessageId,
        /// The parent's timestamp.
        parent_time: DateTime<Utc>,
    },
    /// The message is an interior node, not the root of a detached subtree.
    #[error("NotAnOrphanRoot: {id} is not the root of a detached subtree")]
    NotAnOrphanRoot {
        /// The interior message.
        id: MessageId,
    },
}

impl RejectReason {
    /// Bare taxonomy name.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::TargetNotFound { .. } => "TargetNotFound",
            Self::CycleDetected { .. } => "CycleDetected",
            Self::TimestampViolation { .. } => "TimestampViolation",
            Self::NotAnOrphanRoot { .. } => "NotAnOrphanRoot",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
