//! Shared fixtures for store tests.

use chrono::{TimeZone, Utc};
use serde_json::json;
use stitch_core::{MessageId, RepairOperation, SessionId};

use crate::jsonl_store::JsonlMessageStore;

pub(crate) fn line(
    session_id: SessionId,
    id: MessageId,
    parent: Option<MessageId>,
    secs: i64,
    text: &str,
) -> String {
    let timestamp = Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
    json!({
        "id": id,
        "parent_id": parent,
        "kind": "user",
        "content": text,
        "timestamp": timestamp,
        "session_id": session_id,
    })
    .to_string()
}

pub(crate) fn write_session(store: &JsonlMessageStore, session_id: SessionId, contents: &str) {
    std::fs::create_dir_all(store.root()).unwrap();
    std::fs::write(store.session_path(session_id), contents).unwrap();
}

/// Scenario-1 session file: A(root, t=0), B(A, t=1), C(null, t=2).
pub(crate) fn scenario_file(store: &JsonlMessageStore) -> (SessionId, [MessageId; 3]) {
    let sid = SessionId::new();
    let (a, b, c) = (MessageId::new(), MessageId::new(), MessageId::new());
    let contents = format!(
        "{}\n{}\n{}\n",
        line(sid, a, None, 0, "rust logging setup question"),
        line(sid, b, Some(a), 1, "rust logging setup answer"),
        line(sid, c, None, 2, "rust logging setup followup"),
    );
    write_session(store, sid, &contents);
    (sid, [a, b, c])
}

pub(crate) fn operation(
    session_id: SessionId,
    message_id: MessageId,
    old_parent: Option<MessageId>,
    new_parent: MessageId,
) -> RepairOperation {
    RepairOperation {
        session_id,
        message_id,
        old_parent,
        new_parent,
        reason: "reattach orphan".into(),
        confidence: 0.8,
        operator: "tester".into(),
        timestamp: Utc::now(),
    }
}
