//! # stitch-store
//!
//! Durable recording of session repairs.
//!
//! - **Provider interface**: [`PersistenceProvider`] (load, backup, apply, undo)
//!   and [`RepairJournal`] (what `undo_last` should undo)
//! - **Message store**: [`JsonlMessageStore`], one JSON-lines file per session
//! - **Mutation provider**: [`MutationProvider`] rewrites `parent_id` in place
//!   after a full-file backup
//! - **Event-sourced provider**: [`EventSourcedProvider`] appends digest-sealed
//!   [`RepairEvent`]s to a `SQLite` log and materializes state by replay
//! - **Cache**: [`MaterializedCache`] keyed by session and newest event marker

#![deny(unsafe_code)]

pub mod cache;
pub mod errors;
pub mod event;
pub mod event_sourced;
pub mod event_store;
pub mod jsonl_store;
pub mod materialize;
pub mod mutation;
pub mod provider;
pub mod sqlite;

#[cfg(test)]
mod test_support;

pub use cache::{CacheStats, MaterializedCache};
pub use errors::{Result, StoreError};
pub use event::{RepairEvent, RepairEventKind};
pub use event_sourced::EventSourcedProvider;
pub use event_store::{AuditReport, EventMarker, RepairEventStore};
pub use jsonl_store::JsonlMessageStore;
pub use materialize::materialize;
pub use mutation::MutationProvider;
pub use provider::{
    Ack, BackupHandle, BackupKind, MessageSource, PersistenceProvider, RepairBackend,
    RepairJournal, UndoRef,
};
pub use sqlite::connection::ConnectionConfig;
