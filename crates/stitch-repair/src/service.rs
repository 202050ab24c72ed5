//! Caller-facing repair API.
//!
//! [`RepairService`] is what a CLI or TUI talks to: build a session, list
//! candidates for an orphan, preview, propose and undo repairs. It owns no
//! presentation; rejections come back as typed [`RejectReason`]s.
//!
//! [`RejectReason`]: stitch_core::RejectReason

use std::sync::Arc;

use stitch_core::{MessageId, Session, SessionId, ThreadId, ThreadKind};
use stitch_graph::{
    CandidateSuggester, CorruptionAssessment, GraphBuilder, LexicalSimilarity, SimilarityStrategy,
};
use stitch_settings::StitchSettings;
use stitch_store::{EventSourcedProvider, RepairBackend};
use tracing::debug;

use crate::errors::{RepairError, Result};
use crate::executor::{RepairExecutor, RepairOutcome, RepairRequest};

/// Entry point for session analysis and repair.
#[derive(Clone, Debug)]
pub struct RepairService {
    executor: RepairExecutor,
    event_log: Option<Arc<EventSourcedProvider>>,
}

impl RepairService {
    /// Service over `backend` using lexical similarity.
    pub fn new(backend: Arc<dyn RepairBackend>, settings: &StitchSettings) -> Self {
        Self::with_similarity(backend, settings, Arc::new(LexicalSimilarity))
    }

    /// Service over `backend` with a custom similarity strategy.
    pub fn with_similarity(
        backend: Arc<dyn RepairBackend>,
        settings: &StitchSettings,
        similarity: Arc<dyn SimilarityStrategy>,
    ) -> Self {
        let builder = GraphBuilder::from_settings(settings, Arc::clone(&similarity));
        let suggester = CandidateSuggester::new(settings.suggest.clone(), similarity);
        Self {
            executor: RepairExecutor::new(backend, builder, suggester),
            event_log: None,
        }
    }

    /// Service over an event-sourced provider, keeping access to its log.
    pub fn event_sourced(
        provider: Arc<EventSourcedProvider>,
        settings: &StitchSettings,
        similarity: Arc<dyn SimilarityStrategy>,
    ) -> Self {
        let backend: Arc<dyn RepairBackend> = Arc::clone(&provider) as Arc<dyn RepairBackend>;
        let mut service = Self::with_similarity(backend, settings, similarity);
        service.event_log = Some(provider);
        service
    }

    /// The underlying executor.
    pub fn executor(&self) -> &RepairExecutor {
        &self.executor
    }

    /// The event log, when running on the event-sourced backend.
    pub fn event_log(&self) -> Option<&EventSourcedProvider> {
        self.event_log.as_deref()
    }

    /// Load and classify a session.
    pub async fn build_session(&self, session_id: SessionId) -> Result<Session> {
        self.executor.load(session_id).await
    }

    /// Corruption assessments for every orphan root, with fired factors.
    pub async fn assess_orphans(&self, session_id: SessionId) -> Result<Vec<CorruptionAssessment>> {
        let session = self.build_session(session_id).await?;
        Ok(self.executor.builder().scorer().assess_orphans(&session))
    }

    /// Ranked reattachment candidates for an orphan thread.
    pub async fn suggest_repairs(
        &self,
        session_id: SessionId,
        thread_id: ThreadId,
    ) -> Result<Vec<(MessageId, f64)>> {
        let session = self.build_session(session_id).await?;
        let thread = session
            .thread(thread_id)
            .ok_or(RepairError::ThreadNotFound(thread_id))?;
        if thread.kind != ThreadKind::Orphan {
            return Err(RepairError::NotAnOrphanThread(thread_id));
        }
        let candidates = self.executor.suggester().suggest(&session, thread);
        debug!(%session_id, %thread_id, count = candidates.len(), "suggested repairs");
        Ok(candidates
            .into_iter()
            .map(|c| (c.message_id, c.confidence))
            .collect())
    }

    /// The session a repair would produce, without writing anything.
    pub async fn preview_repair(
        &self,
        session_id: SessionId,
        message_id: MessageId,
        new_parent: MessageId,
    ) -> Result<Session> {
        self.executor.preview(session_id, message_id, new_parent).await
    }

    /// Validate, persist and materialize a repair; return the new session.
    pub async fn propose_repair(
        &self,
        session_id: SessionId,
        message_id: MessageId,
        new_parent: MessageId,
        operator: &str,
        reason: &str,
    ) -> Result<Session> {
        let outcome = self
            .propose(RepairRequest {
                session_id,
                message_id,
                new_parent,
                operator: operator.to_string(),
                reason: reason.to_string(),
            })
            .await?;
        Ok(outcome.session)
    }

    /// Like [`Self::propose_repair`], returning the full outcome.
    pub async fn propose(&self, request: RepairRequest) -> Result<RepairOutcome> {
        self.executor.execute(request).await
    }

    /// Undo the newest repair and return the rebuilt session.
    pub async fn undo_last(&self, session_id: SessionId) -> Result<Session> {
        self.executor.undo_last(session_id).await
    }
}
