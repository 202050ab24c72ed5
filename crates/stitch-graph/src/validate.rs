//! Repair Validator.

use std::collections::HashSet;

use stitch_core::{MessageId, RejectReason, Session};

/// Outcome of validating a proposed re-parenting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// The change keeps every structural invariant.
    Accept,
    /// The change is refused.
    Reject(RejectReason),
}

impl Verdict {
    /// Whether the verdict is [`Verdict::Accept`].
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }

    /// Convert into a `Result`.
    pub fn into_result(self) -> Result<(), RejectReason> {
        match self {
            Self::Accept => Ok(()),
            Self::Reject(reason) => Err(reason),
        }
    }
}

/// Check whether `message_id` may be re-parented under `new_parent`
/// (`None` detaches it to a root).
///
/// Checks run in order and the first failure wins: target existence,
/// cycles, timestamp ordering, orphan-root status. Pure; safe to call
/// speculatively.
pub fn validate(session: &Session, message_id: MessageId, new_parent: Option<MessageId>) -> Verdict {
    match check(session, message_id, new_parent) {
        Ok(()) => Verdict::Accept,
        Err(reason) => Verdict::Reject(reason),
    }
}

fn check(
    session: &Session,
    message_id: MessageId,
    new_parent: Option<MessageId>,
) -> Result<(), RejectReason> {
    let message = session
        .message(message_id)
        .ok_or(RejectReason::TargetNotFound { id: message_id })?;

    let parent = match new_parent {
        Some(id) => Some(
            session
                .message(id)
                .ok_or(RejectReason::TargetNotFound { id })?,
        ),
        None => None,
    };

    if let Some(parent) = parent {
        let cycle = RejectReason::CycleDetected {
            message: message_id,
            parent: parent.id,
        };
        // Walk the raw links: a cycle the builder cut is still in the data.
        let mut seen = HashSet::new();
        let mut cursor = Some(parent.id);
        while let Some(id) = cursor {
            if id == message_id || !seen.insert(id) {
                return Err(cycle);
            }
            cursor = session.message(id).and_then(|m| m.parent_id);
        }

        if parent.timestamp > message.timestamp {
            return Err(RejectReason::TimestampViolation {
                message: message_id,
                message_time: message.timestamp,
                parent: parent.id,
                parent_time: parent.timestamp,
            });
        }
    }

    if !session.is_detached_root(message_id) {
        return Err(RejectReason::NotAnOrphanRoot { id: message_id });
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
