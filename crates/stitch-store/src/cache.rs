//! Materialized-state cache for the event-sourced provider.
//!
//! Entries are keyed by session and tagged with the log marker they were
//! built from. A lookup with a different marker is a miss, so appends make
//! stale entries unreachable even before they are invalidated. Changes to
//! the base session file are not tracked; call [`MaterializedCache::invalidate`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use stitch_core::{Message, SessionId};

use crate::event_store::EventMarker;

struct CacheEntry {
    marker: Option<EventMarker>,
    messages: Arc<Vec<Message>>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<SessionId, CacheEntry>,
    hits: u64,
    misses: u64,
}

/// Cache statistics.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Number of cached sessions.
    pub size: usize,
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate (0.0 to 1.0).
    pub hit_rate: f64,
}

/// Thread-safe cache of materialized message sets.
#[derive(Default)]
pub struct MaterializedCache {
    inner: Mutex<CacheInner>,
}

impl MaterializedCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached messages for `session_id`, if built at `marker`.
    pub fn get(
        &self,
        session_id: SessionId,
        marker: Option<&EventMarker>,
    ) -> Option<Arc<Vec<Message>>> {
        let mut inner = self.inner.lock();
        let found = inner
            .entries
            .get(&session_id)
            .filter(|entry| entry.marker.as_ref() == marker)
            .map(|entry| Arc::clone(&entry.messages));
        if found.is_some() {
            inner.hits += 1;
        } else {
            inner.misses += 1;
        }
        found
    }

    /// Store the materialized state for `session_id` at `marker`.
    pub fn put(
        &self,
        session_id: SessionId,
        marker: Option<EventMarker>,
        messages: Arc<Vec<Message>>,
    ) {
        let _ = self
            .inner
            .lock()
            .entries
            .insert(session_id, CacheEntry { marker, messages });
    }

    /// Drop the entry for `session_id`.
    pub fn invalidate(&self, session_id: SessionId) {
        let _ = self.inner.lock().entries.remove(&session_id);
    }

    /// Drop every entry and reset stats.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.hits = 0;
        inner.misses = 0;
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let total = inner.hits + inner.misses;
        CacheStats {
            size: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
            #[allow(clippy::cast_precision_loss)]
            hit_rate: if total == 0 {
                0.0
            } else {
                inner.hits as f64 / total as f64
            },
        }
    }
}

impl std::fmt::Debug for MaterializedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaterializedCache")
            .field("stats", &self.stats())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
