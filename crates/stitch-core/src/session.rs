//! Threads and the built [`Session`].
//!
//! A session is built fresh from a message set on every load and is never
//! mutated afterwards; a repair triggers a full rebuild.

use std::collections::HashMap;

use serde::Serialize;

use crate::ids::{MessageId, SessionId, ThreadId};
use crate::message::Message;

/// Classification of a thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ThreadKind {
    /// The primary conversation path.
    Main,
    /// A branch that reconnects to the main path.
    SideDiscussion,
    /// A subtree with no resolvable connection to the main path.
    Orphan,
}

/// A classified run of messages.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    /// Stable ID derived from the first message.
    pub thread_id: ThreadId,
    /// Messages, parents before children.
    pub messages: Vec<Message>,
    /// Classification.
    pub kind: ThreadKind,
    /// Corruption likelihood (orphans only, `0.0` otherwise).
    pub corruption_score: f64,
    /// Main-thread message this thread reconnects to.
    pub rejoin_point: Option<MessageId>,
}

impl Thread {
    /// First message of the thread.
    pub fn root(&self) -> Option<&Message> {
        self.messages.first()
    }

    /// Whether the thread holds `id`.
    pub fn contains(&self, id: MessageId) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the thread has no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Structural health of the raw message set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    /// Records seen before de-duplication.
    pub records: usize,
    /// IDs that appeared more than once (first occurrence kept).
    pub duplicate_ids: Vec<MessageId>,
    /// Messages whose `parent_id` names a message not in the session.
    pub unresolved_parents: Vec<MessageId>,
    /// Components whose parent links form a cycle.
    pub cyclic_components: usize,
    /// Sibling groups with identical kind and text.
    pub duplicate_blocks: Vec<Vec<MessageId>>,
}

impl IntegrityReport {
    /// No duplicates, dangling parents, cycles, or repeated blocks.
    pub fn is_clean(&self) -> bool {
        self.duplicate_ids.is_empty()
            && self.unresolved_parents.is_empty()
            && self.cyclic_components == 0
            && self.duplicate_blocks.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Main,
    Side(usize),
    Orphan(usize),
}

/// A classified session.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session ID.
    pub session_id: SessionId,
    /// Primary thread (absent only for an empty session).
    pub main: Option<Thread>,
    /// Side discussions.
    pub side: Vec<Thread>,
    /// Orphan threads.
    pub orphans: Vec<Thread>,
    /// Total messages across all threads.
    pub message_count: usize,
    /// Total threads.
    pub thread_count: usize,
    /// Root of the main thread.
    pub designated_root: Option<MessageId>,
    /// Messages promoted to root because their component had no entry point.
    pub synthetic_roots: Vec<MessageId>,
    /// Raw-data health report.
    pub integrity: IntegrityReport,
    #[serde(skip)]
    index: HashMap<MessageId, (Slot, usize)>,
}

impl Session {
    /// Assemble a session from classified threads.
    pub fn assemble(
        session_id: SessionId,
        main: Option<Thread>,
        side: Vec<Thread>,
        orphans: Vec<Thread>,
        synthetic_roots: Vec<MessageId>,
        integrity: IntegrityReport,
    ) -> Self {
        let mut index = HashMap::new();
        if let Some(thread) = &main {
            for (pos, message) in thread.messages.iter().enumerate() {
                let _ = index.insert(message.id, (Slot::Main, pos));
            }
        }
        for (t, thread) in side.iter().enumerate() {
            for (pos, message) in thread.messages.iter().enumerate() {
                let _ = index.insert(message.id, (Slot::Side(t), pos));
            }
        }
        for (t, thread) in orphans.iter().enumerate() {
            for (pos, message) in thread.messages.iter().enumerate() {
                let _ = index.insert(message.id, (Slot::Orphan(t), pos));
            }
        }

        let designated_root = main.as_ref().and_then(Thread::root).map(|m| m.id);
        let thread_count = usize::from(main.is_some()) + side.len() + orphans.len();

        Self {
            session_id,
            main,
            side,
            orphans,
            message_count: index.len(),
            thread_count,
            designated_root,
            synthetic_roots,
            integrity,
            index,
        }
    }

    /// A session with no messages and no main thread.
    pub fn empty(session_id: SessionId) -> Self {
        Self::assemble(
            session_id,
            None,
            Vec::new(),
            Vec::new(),
            Vec::new(),
            IntegrityReport::default(),
        )
    }

    /// Whether the session has no messages.
    pub fn is_empty(&self) -> bool {
        self.message_count == 0
    }

    /// All threads: main first, then side discussions, then orphans.
    pub fn threads(&self) -> impl Iterator<Item = &Thread> {
        self.main
            .iter()
            .chain(self.side.iter())
            .chain(self.orphans.iter())
    }

    /// All messages, thread by thread.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.threads().flat_map(|t| t.messages.iter())
    }

    /// Clone every message, for rebuilding.
    pub fn to_messages(&self) -> Vec<Message> {
        self.messages().cloned().collect()
    }

    /// Whether `id` is in the session.
    pub fn contains(&self, id: MessageId) -> bool {
        self.index.contains_key(&id)
    }

    /// Look up a message.
    pub fn message(&self, id: MessageId) -> Option<&Message> {
        let (slot, pos) = self.index.get(&id)?;
        self.slot_thread(*slot)?.messages.get(*pos)
    }

    /// Thread containing `id`.
    pub fn thread_of(&self, id: MessageId) -> Option<&Thread> {
        let (slot, _) = self.index.get(&id)?;
        self.slot_thread(*slot)
    }

    /// Look up a thread by ID.
    pub fn thread(&self, thread_id: ThreadId) -> Option<&Thread> {
        self.threads().find(|t| t.thread_id == thread_id)
    }

    /// Parent of `id`, only when it resolves inside the session.
    pub fn resolved_parent(&self, id: MessageId) -> Option<MessageId> {
        self.message(id)?
            .parent_id
            .filter(|parent| self.contains(*parent))
    }

    /// Whether `id` roots a detached subtree: no resolvable parent, or a
    /// synthetic root chosen to break a cycle.
    pub fn is_detached_root(&self, id: MessageId) -> bool {
        self.contains(id)
            && (self.resolved_parent(id).is_none() || self.synthetic_roots.contains(&id))
    }

    /// Whether `id` sits on the main thread.
    pub fn is_main(&self, id: MessageId) -> bool {
        matches!(self.index.get(&id), Some((Slot::Main, _)))
    }

    fn slot_thread(&self, slot: Slot) -> Option<&Thread> {
        match slot {
            Slot::Main => self.main.as_ref(),
            Slot::Side(i) => self.side.get(i),
            Slot::Orphan(i) => self.orphans.get(i),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
