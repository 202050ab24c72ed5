//! Indexed parent-link forest shared by the builder and the integrity report.
//!
//! Indexing de-duplicates IDs, resolves parents, and breaks every cycle at
//! its earliest message so the remaining structure is a true forest.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use stitch_core::{IntegrityReport, Message, MessageId};
use tracing::warn;

use crate::integrity::duplicate_blocks;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unseen,
    OnPath,
    Done,
}

/// Messages plus resolved parent/child adjacency, by position.
pub(crate) struct Forest {
    pub(crate) nodes: Vec<Message>,
    pub(crate) index: HashMap<MessageId, usize>,
    pub(crate) parent: Vec<Option<usize>>,
    pub(crate) children: Vec<Vec<usize>>,
    pub(crate) synthetic: HashSet<usize>,
    pub(crate) report: IntegrityReport,
}

impl Forest {
    pub(crate) fn index(messages: Vec<Message>) -> Self {
        let records = messages.len();
        let mut report = IntegrityReport {
            records,
            ..IntegrityReport::default()
        };

        let mut nodes = Vec::with_capacity(records);
        let mut index = HashMap::with_capacity(records);
        for message in messages {
            if index.contains_key(&message.id) {
                if !report.duplicate_ids.contains(&message.id) {
                    report.duplicate_ids.push(message.id);
                }
                continue;
            }
            let _ = index.insert(message.id, nodes.len());
            nodes.push(message);
        }
        if !report.duplicate_ids.is_empty() {
            warn!(
                count = report.duplicate_ids.len(),
                "duplicate message ids, keeping first occurrence"
            );
        }

        let mut parent: Vec<Option<usize>> = nodes
            .iter()
            .map(|m| m.parent_id.and_then(|p| index.get(&p).copied()))
            .collect();
        for (pos, message) in nodes.iter().enumerate() {
            if message.parent_id.is_some() && parent[pos].is_none() {
                report.unresolved_parents.push(message.id);
            }
        }

        let synthetic = break_cycles(&nodes, &mut parent);
        report.cyclic_components = synthetic.len();

        let mut children = vec![Vec::new(); nodes.len()];
        for (pos, p) in parent.iter().enumerate() {
            if let Some(p) = p {
                children[*p].push(pos);
            }
        }
        for list in &mut children {
            list.sort_by(|a, b| chronological(&nodes[*a], &nodes[*b]));
        }

        report.duplicate_blocks = duplicate_blocks(&nodes, &parent);

        Self {
            nodes,
            index,
            parent,
            children,
            synthetic: synthetic.into_iter().collect(),
            report,
        }
    }

    /// Positions with no resolved parent, oldest first.
    pub(crate) fn roots(&self) -> Vec<usize> {
        let mut roots: Vec<usize> = (0..self.nodes.len())
            .filter(|pos| self.parent[*pos].is_none())
            .collect();
        roots.sort_by(|a, b| chronological(&self.nodes[*a], &self.nodes[*b]));
        roots
    }

    /// Subtree under `root` in preorder, children oldest first.
    pub(crate) fn preorder(&self, root: usize) -> Vec<usize> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(pos) = stack.pop() {
            order.push(pos);
            stack.extend(self.children[pos].iter().rev());
        }
        order
    }

    /// Longest downward path length (in nodes) for every node under `root`.
    pub(crate) fn heights(&self, order: &[usize]) -> HashMap<usize, usize> {
        let mut heights = HashMap::with_capacity(order.len());
        for pos in order.iter().rev() {
            let below = self.children[*pos]
                .iter()
                .filter_map(|c| heights.get(c).copied())
                .max()
                .unwrap_or(0);
            let _ = heights.insert(*pos, below + 1);
        }
        heights
    }

    /// Synthetic root IDs, oldest first.
    pub(crate) fn synthetic_ids(&self) -> Vec<MessageId> {
        let mut ids: Vec<&Message> = self.synthetic.iter().map(|p| &self.nodes[*p]).collect();
        ids.sort_by(|a, b| chronological(a, b));
        ids.into_iter().map(|m| m.id).collect()
    }
}

/// Order by timestamp, then ID.
pub(crate) fn chronological(a: &Message, b: &Message) -> Ordering {
    a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id))
}

/// Cut each cycle at its earliest message; returns the cut positions.
fn break_cycles(nodes: &[Message], parent: &mut [Option<usize>]) -> Vec<usize> {
    let mut state = vec![Visit::Unseen; nodes.len()];
    let mut cuts = Vec::new();

    for start in 0..nodes.len() {
        if state[start] != Visit::Unseen {
            continue;
        }
        let mut path: Vec<usize> = Vec::new();
        let mut cursor = Some(start);
        while let Some(pos) = cursor {
            match state[pos] {
                Visit::Done => break,
                Visit::OnPath => {
                    let Some(entry) = path.iter().position(|p| *p == pos) else {
                        break;
                    };
                    let Some(cut) = path[entry..]
                        .iter()
                        .copied()
                        .min_by(|a, b| chronological(&nodes[*a], &nodes[*b]))
                    else {
                        break;
                    };
                    warn!(message_id = %nodes[cut].id, "parent links form a cycle, promoting earliest message to root");
                    parent[cut] = None;
                    cuts.push(cut);
                    break;
                }
                Visit::Unseen => {
                    state[pos] = Visit::OnPath;
                    path.push(pos);
                    cursor = parent[pos];
                }
            }
        }
        for pos in path {
            state[pos] = Visit::Done;
        }
    }
    cuts
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
