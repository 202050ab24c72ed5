//! Materialization: current message state as a left fold over the log.
//!
//! Revert markers are collected first; every repair they point at is
//! skipped as if it never happened. The remaining repairs are applied in
//! replay order, each setting its message's `parent_id` to `new_parent`.

use std::collections::{HashMap, HashSet};

use stitch_core::{EventId, Message, MessageId};
use tracing::warn;

use crate::event::{RepairEvent, RepairEventKind};

/// Apply `events` (already in replay order) to `base`.
pub fn materialize(base: Vec<Message>, events: &[RepairEvent]) -> Vec<Message> {
    let reverted: HashSet<EventId> = events.iter().filter_map(RepairEvent::reverts).collect();

    let mut positions: HashMap<MessageId, usize> = HashMap::with_capacity(base.len());
    for (pos, message) in base.iter().enumerate() {
        let _ = positions.entry(message.id).or_insert(pos);
    }

    events
        .iter()
        .filter(|e| e.kind == RepairEventKind::Repair && !reverted.contains(&e.event_id))
        .fold(base, |mut messages, event| {
            match positions.get(&event.message_id) {
                Some(pos) => messages[*pos].parent_id = Some(event.new_parent),
                None => warn!(
                    event_id = %event.event_id,
                    message_id = %event.message_id,
                    "repair event names a message missing from the base set"
                ),
            }
            messages
        })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
