//! # stitch-core
//!
//! Foundation types shared by every stitch crate.
//!
//! - **Branded IDs**: `MessageId`, `SessionId`, `ThreadId`, `EventId` as UUID newtypes
//! - **Messages**: [`Message`] (loaded, derived fields) and [`MessageRecord`] (JSON-lines wire shape)
//! - **Parsing**: [`parse_jsonl`] with per-line malformed-record recovery
//! - **Threads and sessions**: [`Thread`], [`ThreadKind`], [`Session`], [`IntegrityReport`]
//! - **Repairs**: [`RepairOperation`] and the [`RejectReason`] taxonomy
//! - **Logging**: `tracing` subscriber setup and a capture layer for tests

#![deny(unsafe_code)]

pub mod ids;
pub mod jsonl;
pub mod logging;
pub mod message;
pub mod repair;
pub mod session;

pub use ids::{EventId, MessageId, SessionId, ThreadId};
pub use jsonl::{MalformedRecord, ParsedRecords, parse_jsonl};
pub use message::{Message, MessageKind, MessageRecord};
pub use repair::{RejectReason, RepairOperation};
pub use session::{IntegrityReport, Session, Thread, ThreadKind};
