//! Shared fixtures for end-to-end repair tests.

#![allow(dead_code)]

use std::path::Path;

use serde_json::json;
use stitch_core::{MessageId, SessionId};
use stitch_repair::RepairService;
use stitch_settings::{StitchSettings, StorageBackend};
use tempfile::TempDir;

const BASE_SECS: i64 = 1_700_000_000;

/// One JSON-lines record.
pub fn line(
    session_id: SessionId,
    id: MessageId,
    parent: Option<MessageId>,
    secs: i64,
    text: &str,
) -> String {
    let timestamp = chrono::DateTime::from_timestamp(BASE_SECS + secs, 0).unwrap();
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

/// Settings rooted in `dir`.
pub fn settings(dir: &Path, backend: StorageBackend) -> StitchSettings {
    let mut settings = StitchSettings::default();
    settings.storage.backend = backend;
    settings.storage.sessions_dir = dir.join("sessions").display().to_string();
    settings.storage.database_path = dir.join("repairs.db").display().to_string();
    settings
}

/// Path of a session's file.
pub fn session_path(settings: &StitchSettings, session_id: SessionId) -> std::path::PathBuf {
    Path::new(&settings.storage.sessions_dir).join(format!("{session_id}.jsonl"))
}

/// Write a session file from records.
pub fn write_session(settings: &StitchSettings, session_id: SessionId, lines: &[String]) {
    std::fs::create_dir_all(&settings.storage.sessions_dir).unwrap();
    let mut contents = lines.join("\n");
    contents.push('\n');
    std::fs::write(session_path(settings, session_id), contents).unwrap();
}

/// A(root, t=0), B(A, t=1), C(null, t=2) sharing a topic.
pub fn scenario_one(settings: &StitchSettings) -> (SessionId, [MessageId; 3]) {
    let sid = SessionId::new();
    let (a, b, c) = (MessageId::new(), MessageId::new(), MessageId::new());
    write_session(
        settings,
        sid,
        &[
            line(sid, a, None, 0, "rust logging setup question"),
            line(sid, b, Some(a), 1, "rust logging setup answer"),
            line(sid, c, None, 2, "rust logging setup followup"),
        ],
    );
    (sid, [a, b, c])
}

/// A service for `backend` in a fresh temp dir.
pub struct Harness {
    pub dir: TempDir,
    pub settings: StitchSettings,
    pub service: RepairService,
}

impl Harness {
    pub fn new(backend: StorageBackend) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path(), backend);
        let service = stitch_repair::open(&settings).unwrap();
        Self {
            dir,
            settings,
            service,
        }
    }

    pub fn both() -> [Self; 2] {
        [
            Self::new(StorageBackend::Mutation),
            Self::new(StorageBackend::EventSourced),
        ]
    }

    pub fn raw(&self, session_id: SessionId) -> String {
        std::fs::read_to_string(session_path(&self.settings, session_id)).unwrap()
    }
}
