//! Raw-data health checks.
//!
//! The report is descriptive only: nothing here deletes or rewrites messages.

use std::collections::BTreeMap;

use stitch_core::{IntegrityReport, Message, MessageId};

use crate::forest::{Forest, chronological};

/// Integrity report for a raw message set, without classifying threads.
pub fn integrity_report(messages: &[Message]) -> IntegrityReport {
    Forest::index(messages.to_vec()).report
}

/// Sibling groups (same resolved parent) with the same kind and the same
/// non-empty text, each group oldest first.
pub(crate) fn duplicate_blocks(nodes: &[Message], parent: &[Option<usize>]) -> Vec<Vec<MessageId>> {
    let mut groups: BTreeMap<(usize, &'static str, String), Vec<&Message>> = BTreeMap::new();
    for (pos, message) in nodes.iter().enumerate() {
        let Some(p) = parent[pos] else { continue };
        let text = collapse_whitespace(&message.text());
        if text.is_empty() {
            continue;
        }
        groups
            .entry((p, message.kind.as_str(), text))
            .or_default()
            .push(message);
    }

    let mut blocks: Vec<Vec<&Message>> = groups.into_values().filter(|g| g.len() > 1).collect();
    for group in &mut blocks {
        group.sort_by(|a, b| chronological(a, b));
    }
    blocks.sort_by(|a, b| chronological(a[0], b[0]));
    blocks
        .into_iter()
        .map(|g| g.into_iter().map(|m| m.id).collect())
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
