//! End-to-end repair scenarios on both backends.

mod common;

use assert_matches::assert_matches;
use common::{Harness, line, write_session};
use stitch_core::{MessageId, RejectReason, SessionId, ThreadId, ThreadKind};
use stitch_repair::RepairError;
use stitch_settings::StorageBackend;

#[tokio::test]
async fn orphan_is_detected_scored_and_ranked() {
    for h in Harness::both() {
        let (sid, [a, b, c]) = common::scenario_one(&h.settings);
        let session = h.service.build_session(sid).await.unwrap();

        let main = session.main.as_ref().unwrap();
        assert_eq!(main.messages.iter().map(|m| m.id).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(session.orphans.len(), 1);
        let orphan = &session.orphans[0];
        assert_eq!(orphan.kind, ThreadKind::Orphan);
        assert_eq!(orphan.root().unwrap().id, c);
        assert!(orphan.corruption_score >= 0.4);

        let assessments = h.service.assess_orphans(sid).await.unwrap();
        assert_eq!(assessments.len(), 1);
        assert!(assessments[0].factors.contains(&"null_parent"));

        let candidates = h.service.suggest_repairs(sid, orphan.thread_id).await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].0, b);
        assert_eq!(candidates[1].0, a);
        assert!(candidates[0].1 > candidates[1].1);
    }
}

#[tokio::test]
async fn accepted_repair_joins_main() {
    for h in Harness::both() {
        let (sid, [a, b, c]) = common::scenario_one(&h.settings);
        let session = h
            .service
            .propose_repair(sid, c, b, "alice", "resume lost its parent")
            .await
            .unwrap();

        assert!(session.orphans.is_empty());
        assert!(session.side.is_empty());
        let main = session.main.as_ref().unwrap();
        assert_eq!(main.messages.iter().map(|m| m.id).collect::<Vec<_>>(), vec![a, b, c]);

        let reloaded = h.service.build_session(sid).await.unwrap();
        assert_eq!(reloaded, session);
    }
}

#[tokio::test]
async fn cycle_is_rejected_after_repair() {
    for h in Harness::both() {
        let (sid, [a, b, c]) = common::scenario_one(&h.settings);
        let _ = h.service.propose_repair(sid, c, b, "alice", "reattach").await.unwrap();
        let before = h.raw(sid);

        let err = h
            .service
            .propose_repair(sid, a, c, "alice", "bad idea")
            .await
            .unwrap_err();
        assert_matches!(err, RepairError::Rejected(RejectReason::CycleDetected { .. }));
        assert!(err.to_string().contains("CycleDetected"));
        assert_eq!(h.raw(sid), before);
    }
}

#[tokio::test]
async fn event_log_keeps_repair_and_revert() {
    let h = Harness::new(StorageBackend::EventSourced);
    let (sid, [_, b, c]) = common::scenario_one(&h.settings);
    let original = h.service.build_session(sid).await.unwrap();

    let _ = h.service.propose_repair(sid, c, b, "alice", "reattach").await.unwrap();
    let undone = h.service.undo_last(sid).await.unwrap();
    assert_eq!(undone, original);

    let log = h.service.event_log().unwrap();
    assert_eq!(log.events().count(sid).unwrap(), 2);
    let history = log.history(sid).unwrap();
    assert_eq!(history[0].message_id, c);
    assert!(!history[0].is_reverted());
    assert!(history[1].is_reverted());
    assert_eq!(history[1].reverts(), Some(history[0].event_id));
    assert!(log.audit(sid).unwrap().is_clean());
}

#[tokio::test]
async fn undo_restores_original_on_both_backends() {
    for h in Harness::both() {
        let (sid, [_, b, c]) = common::scenario_one(&h.settings);
        let original = h.service.build_session(sid).await.unwrap();
        let raw = h.raw(sid);

        let _ = h.service.propose_repair(sid, c, b, "alice", "reattach").await.unwrap();
        let undone = h.service.undo_last(sid).await.unwrap();

        assert_eq!(undone, original);
        assert_eq!(h.raw(sid), raw);
        assert_matches!(
            h.service.undo_last(sid).await,
            Err(RepairError::NothingToUndo(id)) if id == sid
        );
    }
}

#[tokio::test]
async fn preview_writes_nothing() {
    for h in Harness::both() {
        let (sid, [_, b, c]) = common::scenario_one(&h.settings);
        let raw = h.raw(sid);
        let preview = h.service.preview_repair(sid, c, b).await.unwrap();
        assert!(preview.orphans.is_empty());

        let current = h.service.build_session(sid).await.unwrap();
        assert_eq!(current.orphans.len(), 1);
        assert_eq!(h.raw(sid), raw);
        assert_matches!(
            h.service.undo_last(sid).await,
            Err(RepairError::NothingToUndo(_))
        );
    }
}

#[tokio::test]
async fn suggestions_need_an_orphan_thread() {
    let h = Harness::new(StorageBackend::EventSourced);
    let (sid, _) = common::scenario_one(&h.settings);
    let session = h.service.build_session(sid).await.unwrap();
    let main_id = session.main.as_ref().unwrap().thread_id;

    assert_matches!(
        h.service.suggest_repairs(sid, main_id).await,
        Err(RepairError::NotAnOrphanThread(_))
    );
    assert_matches!(
        h.service.suggest_repairs(sid, ThreadId::new()).await,
        Err(RepairError::ThreadNotFound(_))
    );
}

#[tokio::test]
async fn timestamp_and_interior_rejections() {
    let h = Harness::new(StorageBackend::Mutation);
    let sid = SessionId::new();
    let (a, b, c, late) = (MessageId::new(), MessageId::new(), MessageId::new(), MessageId::new());
    write_session(
        &h.settings,
        sid,
        &[
            line(sid, a, None, 0, "start"),
            line(sid, b, Some(a), 1, "reply"),
            line(sid, c, None, 2, "lost"),
            line(sid, late, Some(b), 10, "later reply"),
        ],
    );

    assert_matches!(
        h.service.propose_repair(sid, c, late, "op", "r").await,
        Err(RepairError::Rejected(RejectReason::TimestampViolation { .. }))
    );
    assert_matches!(
        h.service.propose_repair(sid, b, a, "op", "r").await,
        Err(RepairError::Rejected(RejectReason::NotAnOrphanRoot { .. }))
    );
    assert_matches!(
        h.service.propose_repair(sid, c, MessageId::new(), "op", "r").await,
        Err(RepairError::Rejected(RejectReason::TargetNotFound { .. }))
    );
}

#[tokio::test]
async fn missing_session_is_a_load_error() {
    for h in Harness::both() {
        assert_matches!(
            h.service.build_session(SessionId::new()).await,
            Err(RepairError::Load(_))
        );
    }
}

#[tokio::test]
async fn malformed_lines_are_skipped_and_kept() {
    let h = Harness::new(StorageBackend::Mutation);
    let sid = SessionId::new();
    let (a, b, c) = (MessageId::new(), MessageId::new(), MessageId::new());
    write_session(
        &h.settings,
        sid,
        &[
            line(sid, a, None, 0, "rust logging setup question"),
            "{not json".to_string(),
            line(sid, b, Some(a), 1, "rust logging setup answer"),
            line(sid, c, None, 2, "rust logging setup followup"),
        ],
    );

    let session = h.service.build_session(sid).await.unwrap();
    assert_eq!(session.message_count, 3);
    let _ = h.service.propose_repair(sid, c, b, "op", "reattach").await.unwrap();
    assert!(h.raw(sid).contains("{not json\n"));
}

#[tokio::test]
async fn malformed_duplicate_does_not_absorb_the_repair() {
    for h in Harness::both() {
        let sid = SessionId::new();
        let (a, b, c) = (MessageId::new(), MessageId::new(), MessageId::new());
        let mut broken: serde_json::Value =
            serde_json::from_str(&line(sid, c, None, 2, "stale copy")).unwrap();
        broken["timestamp"] = serde_json::Value::String("yesterday".into());
        let broken = broken.to_string();
        write_session(
            &h.settings,
            sid,
            &[
                line(sid, a, None, 0, "rust logging setup question"),
                line(sid, b, Some(a), 1, "rust logging setup answer"),
                broken.clone(),
                line(sid, c, None, 2, "rust logging setup followup"),
            ],
        );

        let session = h.service.propose_repair(sid, c, b, "alice", "reattach").await.unwrap();
        assert!(session.orphans.is_empty());
        let main = session.main.as_ref().unwrap();
        assert_eq!(main.messages.iter().map(|m| m.id).collect::<Vec<_>>(), vec![a, b, c]);
        assert!(h.raw(sid).contains(&broken));
    }
}
