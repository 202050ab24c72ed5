//! Repair Executor.
//!
//! One repair request moves through
//! `Proposed -> Validated -> Persisted -> Materialized`. A validator refusal
//! ends in `Rejected` with nothing written; a provider failure during backup
//! or apply ends in `Failed`. The executor never retries: a failed write may
//! or may not be durable, and the caller must re-read before trying again.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use stitch_core::{MessageId, RepairOperation, Session, SessionId};
use stitch_graph::{CandidateSuggester, GraphBuilder, Verdict, validate};
use stitch_store::{Ack, BackupHandle, RepairBackend, UndoRef};
use tracing::{debug, error, info, warn};

use crate::errors::{RepairError, Result};

/// Lifecycle of one repair request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RepairState {
    /// Received, not yet checked.
    Proposed,
    /// Accepted by the validator.
    Validated,
    /// Durably recorded by the provider.
    Persisted,
    /// Session rebuilt from the new state.
    Materialized,
    /// Refused by the validator.
    Rejected,
    /// The provider's write failed.
    Failed,
}

impl RepairState {
    /// Lowercase name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Validated => "validated",
            Self::Persisted => "persisted",
            Self::Materialized => "materialized",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transition is possible.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Materialized | Self::Rejected | Self::Failed)
    }
}

impl fmt::Display for RepairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A caller's request to re-parent one message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepairRequest {
    /// Session to repair.
    pub session_id: SessionId,
    /// Orphan root to reattach.
    pub message_id: MessageId,
    /// Proposed parent.
    pub new_parent: MessageId,
    /// Who is asking.
    pub operator: String,
    /// Why.
    pub reason: String,
}

/// Result of a materialized repair.
#[derive(Clone, Debug)]
pub struct RepairOutcome {
    /// The operation handed to the provider.
    pub operation: RepairOperation,
    /// Backup taken before the write.
    pub backup: BackupHandle,
    /// Provider acknowledgement.
    pub ack: Ack,
    /// Session rebuilt after the write.
    pub session: Session,
}

/// Tracks and logs the state of one request.
struct Run {
    session_id: SessionId,
    message_id: MessageId,
    state: RepairState,
}

impl Run {
    fn new(session_id: SessionId, message_id: MessageId) -> Self {
        debug!(%session_id, %message_id, state = RepairState::Proposed.as_str(), "repair state");
        Self {
            session_id,
            message_id,
            state: RepairState::Proposed,
        }
    }

    fn advance(&mut self, next: RepairState) {
        debug!(
            session_id = %self.session_id,
            message_id = %self.message_id,
            from = self.state.as_str(),
            state = next.as_str(),
            "repair state"
        );
        self.state = next;
    }

    fn reject(&mut self, reason: stitch_core::RejectReason) -> RepairError {
        self.advance(RepairState::Rejected);
        info!(
            session_id = %self.session_id,
            message_id = %self.message_id,
            code = reason.code(),
            %reason,
            "repair rejected"
        );
        RepairError::Rejected(reason)
    }

    fn fail(&mut self, step: &str, err: stitch_store::StoreError) -> RepairError {
        self.advance(RepairState::Failed);
        error!(
            session_id = %self.session_id,
            message_id = %self.message_id,
            step,
            error = %err,
            "repair provider write failed"
        );
        RepairError::ProviderWriteFailed(err)
    }
}

/// Drives validation, backup, persistence and rebuild for repairs.
#[derive(Clone)]
pub struct RepairExecutor {
    backend: Arc<dyn RepairBackend>,
    builder: GraphBuilder,
    suggester: CandidateSuggester,
}

impl fmt::Debug for RepairExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepairExecutor")
            .field("builder", &self.builder)
            .field("suggester", &self.suggester)
            .finish_non_exhaustive()
    }
}

impl RepairExecutor {
    /// Create an executor over `backend`.
    pub fn new(
        backend: Arc<dyn RepairBackend>,
        builder: GraphBuilder,
        suggester: CandidateSuggester,
    ) -> Self {
        Self {
            backend,
            builder,
            suggester,
        }
    }

    /// The graph builder used for every rebuild.
    pub fn builder(&self) -> &GraphBuilder {
        &self.builder
    }

    /// The suggester used for confidence values.
    pub fn suggester(&self) -> &CandidateSuggester {
        &self.suggester
    }

    /// The persistence backend.
    pub fn backend(&self) -> &Arc<dyn RepairBackend> {
        &self.backend
    }

    /// Load and classify the current state of a session.
    pub async fn load(&self, session_id: SessionId) -> Result<Session> {
        let messages = self
            .backend
            .load_messages(session_id)
            .await
            .map_err(RepairError::Load)?;
        Ok(self.builder.build(session_id, messages))
    }

    /// Validate a request against the current state and return the session
    /// it would produce. Writes nothing.
    ///
    /// The preview is rebuilt from the provider's full record set, so
    /// duplicate and malformed-parent findings match a real repair.
    pub async fn preview(
        &self,
        session_id: SessionId,
        message_id: MessageId,
        new_parent: MessageId,
    ) -> Result<Session> {
        let mut messages = self
            .backend
            .load_messages(session_id)
            .await
            .map_err(RepairError::Load)?;
        let session = self.builder.build(session_id, messages.clone());
        validate(&session, message_id, Some(new_parent)).into_result()?;
        if let Some(target) = messages.iter_mut().find(|m| m.id == message_id) {
            target.parent_id = Some(new_parent);
        }
        Ok(self.builder.build(session_id, messages))
    }

    /// Run one repair to completion.
    pub async fn execute(&self, request: RepairRequest) -> Result<RepairOutcome> {
        let session_id = request.session_id;
        let mut run = Run::new(session_id, request.message_id);

        let session = self.load(session_id).await?;
        if let Verdict::Reject(reason) =
            validate(&session, request.message_id, Some(request.new_parent))
        {
            return Err(run.reject(reason));
        }
        run.advance(RepairState::Validated);

        let operation = self.operation(&session, request);

        let backup = match self.backend.create_backup(session_id).await {
            Ok(handle) => handle,
            Err(e) => return Err(run.fail("create_backup", e)),
        };
        let ack = match self.backend.apply_repair(&operation).await {
            Ok(ack) => ack,
            Err(e) => {
                if let Err(discard) = self.backend.discard_backup(&backup).await {
                    warn!(
                        %session_id,
                        backup_id = %backup.backup_id,
                        error = %discard,
                        "could not discard backup of failed repair"
                    );
                }
                return Err(run.fail("apply_repair", e));
            }
        };
        run.advance(RepairState::Persisted);

        let session = self.load(session_id).await?;
        run.advance(RepairState::Materialized);
        info!(
            %session_id,
            message_id = %operation.message_id,
            new_parent = %operation.new_parent,
            confidence = operation.confidence,
            "repair applied"
        );

        Ok(RepairOutcome {
            operation,
            backup,
            ack,
            session,
        })
    }

    /// Undo the newest undoable repair and return the rebuilt session.
    pub async fn undo_last(&self, session_id: SessionId) -> Result<Session> {
        let target = self
            .backend
            .last_undoable(session_id)
            .await
            .map_err(RepairError::Load)?
            .ok_or(RepairError::NothingToUndo(session_id))?;

        if let Err(e) = self.backend.undo(&target).await {
            error!(%session_id, error = %e, "undo failed");
            return Err(RepairError::ProviderWriteFailed(e));
        }
        match &target {
            UndoRef::Event(event_id) => info!(%session_id, %event_id, "repair undone"),
            UndoRef::Backup(handle) => {
                info!(%session_id, backup_id = %handle.backup_id, "backup restored");
            }
        }
        self.load(session_id).await
    }

    fn operation(&self, session: &Session, request: RepairRequest) -> RepairOperation {
        let old_parent = session.message(request.message_id).and_then(|m| m.parent_id);
        let confidence = match (
            session.message(request.message_id),
            session.message(request.new_parent),
        ) {
            (Some(orphan), Some(parent)) => self.suggester.score_pair(orphan, parent),
            _ => 0.0,
        };
        RepairOperation {
            session_id: request.session_id,
            message_id: request.message_id,
            old_parent,
            new_parent: request.new_parent,
            reason: request.reason,
            confidence,
            operator: request.operator,
            timestamp: Utc::now(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use stitch_core::RejectReason;
    use stitch_store::{JsonlMessageStore, MutationProvider};

    fn executor(dir: &std::path::Path) -> RepairExecutor {
        let provider = MutationProvider::new(JsonlMessageStore::new(dir), dir.join("backups"));
        RepairExecutor::new(
            Arc::new(provider),
            GraphBuilder::default(),
            CandidateSuggester::default(),
        )
    }

    fn record(
        session_id: SessionId,
        id: MessageId,
        parent: Option<MessageId>,
        secs: u8,
        text: &str,
    ) -> String {
        serde_json::json!({
            "id": id,
            "parent_id": parent,
            "kind": "user",
            "content": text,
            "timestamp": format!("2023-11-14T22:13:2{secs}Z"),
            "session_id": session_id,
        })
        .to_string()
    }

    /// A(root), B(A), C(null) written to `dir`, plus any `extra` lines.
    fn scenario(
        dir: &std::path::Path,
        extra: impl Fn(SessionId, MessageId) -> Vec<String>,
    ) -> (SessionId, [MessageId; 3]) {
        let sid = SessionId::new();
        let (a, b, c) = (MessageId::new(), MessageId::new(), MessageId::new());
        let mut lines = vec![
            record(sid, a, None, 0, "rust logging setup question"),
            record(sid, b, Some(a), 1, "rust logging setup answer"),
            record(sid, c, None, 2, "rust logging setup followup"),
        ];
        lines.extend(extra(sid, c));
        let mut contents = lines.join("\n");
        contents.push('\n');
        std::fs::write(dir.join(format!("{sid}.jsonl")), contents).unwrap();
        (sid, [a, b, c])
    }

    #[test]
    fn terminal_states() {
        assert!(RepairState::Materialized.is_terminal());
        assert!(RepairState::Rejected.is_terminal());
        assert!(RepairState::Failed.is_terminal());
        assert!(!RepairState::Validated.is_terminal());
        assert_eq!(RepairState::Persisted.to_string(), "persisted");
    }

    #[tokio::test]
    async fn preview_joins_orphan_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(dir.path());
        let (sid, [_, b, c]) = scenario(dir.path(), |_, _| Vec::new());
        let raw = std::fs::read_to_string(dir.path().join(format!("{sid}.jsonl"))).unwrap();
        assert_eq!(executor.load(sid).await.unwrap().orphans.len(), 1);

        let preview = executor.preview(sid, c, b).await.unwrap();
        assert!(preview.orphans.is_empty());
        assert!(preview.is_main(c));
        let after = std::fs::read_to_string(dir.path().join(format!("{sid}.jsonl"))).unwrap();
        assert_eq!(after, raw);
        assert!(!dir.path().join("backups").exists());
    }

    #[tokio::test]
    async fn preview_matches_the_applied_repair_with_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(dir.path());
        let (sid, [_, b, c]) = scenario(dir.path(), |sid, c| {
            vec![record(sid, c, None, 3, "second copy of the followup")]
        });

        let preview = executor.preview(sid, c, b).await.unwrap();
        assert_eq!(preview.integrity.records, 4);
        assert_eq!(preview.integrity.duplicate_ids, vec![c]);

        let outcome = executor
            .execute(RepairRequest {
                session_id: sid,
                message_id: c,
                new_parent: b,
                operator: "op".into(),
                reason: "reattach".into(),
            })
            .await
            .unwrap();
        assert_eq!(outcome.session.integrity, preview.integrity);
        assert_eq!(outcome.session, preview);
    }

    #[tokio::test]
    async fn preview_reports_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(dir.path());
        let (sid, [a, b, _]) = scenario(dir.path(), |_, _| Vec::new());
        assert_matches!(
            executor.preview(sid, b, a).await,
            Err(RepairError::Rejected(RejectReason::NotAnOrphanRoot { .. }))
        );
    }
}
