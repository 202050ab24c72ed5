//! Error types for the persistence layer.
//!
//! [`StoreError`] is returned by both providers, the message store, and the
//! repair event log.

use thiserror::Error;

/// Errors that can occur while reading or recording repairs.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// No message file exists for the session.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Requested repair event was not found.
    #[error("event not found: {0}")]
    EventNotFound(String),

    /// Requested backup was not found.
    #[error("backup not found: {0}")]
    BackupNotFound(String),

    /// The message named by an operation is not in the session.
    #[error("message not found: {0}")]
    MessageNotFound(String),

    /// The operation does not apply to the current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A stored row could not be decoded.
    #[error("invalid row: {0}")]
    InvalidRow(String),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
