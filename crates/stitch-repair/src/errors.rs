//! Error types for the repair executor and service.

use stitch_core::{RejectReason, SessionId, ThreadId};
use stitch_settings::SettingsError;
use stitch_store::StoreError;
use thiserror::Error;

/// Errors surfaced to callers of the repair API.
#[derive(Debug, Error)]
pub enum RepairError {
    /// The validator refused the repair. Nothing was written.
    #[error("repair rejected: {0}")]
    Rejected(#[from] RejectReason),

    /// The provider's durable step failed. No partial state is visible.
    #[error("ProviderWriteFailed: {0}")]
    ProviderWriteFailed(#[source] StoreError),

    /// Reading the session's messages failed.
    #[error("failed to load session: {0}")]
    Load(#[source] StoreError),

    /// No thread with this ID in the session.
    #[error("thread not found: {0}")]
    ThreadNotFound(ThreadId),

    /// Suggestions were asked for a thread that is not an orphan.
    #[error("thread {0} is not an orphan thread")]
    NotAnOrphanThread(ThreadId),

    /// No repair or backup is left to undo.
    #[error("nothing to undo for session {0}")]
    NothingToUndo(SessionId),

    /// Configuration could not be loaded or is invalid.
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    /// A backend could not be opened.
    #[error("failed to open storage: {0}")]
    Open(#[source] StoreError),
}

impl RepairError {
    /// The validator's reason, for rejections.
    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            Self::Rejected(reason) => Some(reason),
            _ => None,
        }
    }

    /// Error category string for callers that render or count failures.
    pub fn category(&self) -> &str {
        match self {
            Self::Rejected(reason) => reason.code(),
            Self::ProviderWriteFailed(_) => "ProviderWriteFailed",
            Self::Load(_) => "load",
            Self::ThreadNotFound(_) => "thread_not_found",
            Self::NotAnOrphanThread(_) => "not_an_orphan_thread",
            Self::NothingToUndo(_) => "nothing_to_undo",
            Self::Settings(_) => "settings",
            Self::Open(_) => "open",
        }
    }
}

/// Convenience type alias for repair results.
pub type Result<T> = std::result::Result<T, RepairError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
