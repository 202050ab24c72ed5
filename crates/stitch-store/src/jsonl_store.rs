//! JSON-lines message store: one `<session_id>.jsonl` file per session.
//!
//! Rewrites touch a single record's `parent_id` and go through a temp file
//! plus `rename`, so a reader sees either the old file or the new one. Every
//! other line, including lines that do not parse, is written back
//! byte-for-byte.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use stitch_core::{Message, MessageId, MessageRecord, ParsedRecords, SessionId, parse_jsonl};
use tracing::debug;

use crate::errors::{Result, StoreError};
use crate::provider::MessageSource;

/// Directory of session files.
#[derive(Clone, Debug)]
pub struct JsonlMessageStore {
    root: PathBuf,
}

impl JsonlMessageStore {
    /// Store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the session files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a session's file.
    pub fn session_path(&self, session_id: SessionId) -> PathBuf {
        self.root.join(format!("{session_id}.jsonl"))
    }

    /// Raw file contents.
    pub fn read_raw(&self, session_id: SessionId) -> Result<String> {
        match fs::read_to_string(self.session_path(session_id)) {
            Ok(raw) => Ok(raw),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::SessionNotFound(session_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace a session's file atomically.
    pub fn write_raw(&self, session_id: SessionId, contents: &str) -> Result<()> {
        write_atomic(&self.session_path(session_id), contents)
    }

    /// Parse a session file, keeping the malformed-line report.
    pub fn load_parsed(&self, session_id: SessionId) -> Result<ParsedRecords> {
        Ok(parse_jsonl(&self.read_raw(session_id)?, session_id))
    }

    /// Set `parent_id` of `message_id` to `new_parent` and return the old
    /// value.
    ///
    /// When `expected` is given, the stored parent must equal it or the
    /// rewrite is refused with [`StoreError::InvalidOperation`]. Only the
    /// first record with the ID is touched.
    pub fn rewrite_parent(
        &self,
        session_id: SessionId,
        message_id: MessageId,
        expected: Option<Option<MessageId>>,
        new_parent: Option<MessageId>,
    ) -> Result<Option<MessageId>> {
        let raw = self.read_raw(session_id)?;
        let mut out = String::with_capacity(raw.len() + 64);
        let mut previous = None;

        for line in raw.split_inclusive('\n') {
            if previous.is_some() {
                out.push_str(line);
                continue;
            }
            let body = line.trim_end_matches(['\n', '\r']);
            let Some((mut record, current)) = matching_record(body, session_id, message_id) else {
                out.push_str(line);
                continue;
            };

            if let Some(expected) = expected {
                if expected != current {
                    return Err(StoreError::InvalidOperation(format!(
                        "stale repair: parent of {message_id} is {}, expected {}",
                        display_parent(current),
                        display_parent(expected)
                    )));
                }
            }

            if let Some(obj) = record.as_object_mut() {
                let _ = obj.insert(
                    "parent_id".to_string(),
                    new_parent.map_or(Value::Null, |p| Value::String(p.to_string())),
                );
            }
            out.push_str(&serde_json::to_string(&record)?);
            out.push_str(&line[body.len()..]);
            previous = Some(current);
        }

        let Some(previous) = previous else {
            return Err(StoreError::MessageNotFound(message_id.to_string()));
        };
        self.write_raw(session_id, &out)?;
        debug!(%session_id, %message_id, "rewrote parent_id");
        Ok(previous)
    }
}

impl MessageSource for JsonlMessageStore {
    fn load(&self, session_id: SessionId) -> Result<Vec<Message>> {
        Ok(self.load_parsed(session_id)?.into_messages())
    }
}

/// The raw JSON of `body` and its current parent, if the line is a record the
/// loader would accept for `message_id` in `session_id`.
fn matching_record(
    body: &str,
    session_id: SessionId,
    message_id: MessageId,
) -> Option<(Value, Option<MessageId>)> {
    let record: MessageRecord = serde_json::from_str(body).ok()?;
    if record.id != message_id || record.session_id != session_id {
        return None;
    }
    let value: Value = serde_json::from_str(body).ok()?;
    Some((value, record.parent_id))
}

fn display_parent(parent: Option<MessageId>) -> String {
    parent.map_or_else(|| "null".to_string(), |p| p.to_string())
}

/// Write `contents` to `path` through a sibling temp file and `rename`.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path
        .file_name()
        .map_or_else(|| "session".to_string(), |name| name.to_string_lossy().to_string());
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let temp_path = path.with_file_name(format!(".{file_name}.{nanos}.tmp"));

    fs::write(&temp_path, contents)?;
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{line, write_session};
    use assert_matches::assert_matches;

    #[test]
    fn missing_file_is_session_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlMessageStore::new(dir.path());
        assert_matches!(
            store.load(SessionId::new()),
            Err(StoreError::SessionNotFound(_))
        );
    }

    #[test]
    fn load_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlMessageStore::new(dir.path());
        let sid = SessionId::new();
        let a = MessageId::new();
        let contents = format!("{}\nnot json\n\n{}\n", line(sid, a, None, 0, "a"), line(sid, MessageId::new(), Some(a), 1, "b"));
        write_session(&store, sid, &contents);

        let parsed = store.load_parsed(sid).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.malformed.len(), 1);
        assert_eq!(parsed.malformed[0].line, 2);
        assert_eq!(store.load(sid).unwrap().len(), 2);
    }

    #[test]
    fn rewrite_preserves_other_lines_and_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlMessageStore::new(dir.path());
        let sid = SessionId::new();
        let (a, c) = (MessageId::new(), MessageId::new());
        let first = line(sid, a, None, 0, "a");
        let mut third: Value = serde_json::from_str(&line(sid, c, None, 2, "c")).unwrap();
        third["cwd"] = Value::String("/work".into());
        let contents = format!("{first}\ngarbage {{\n{}\n", serde_json::to_string(&third).unwrap());
        write_session(&store, sid, &contents);

        let old = store.rewrite_parent(sid, c, Some(None), Some(a)).unwrap();
        assert_eq!(old, None);

        let raw = store.read_raw(sid).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines[0], first);
        assert_eq!(lines[1], "garbage {");
        let rewritten: Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(rewritten["parent_id"], Value::String(a.to_string()));
        assert_eq!(rewritten["cwd"], "/work");
        assert!(raw.ends_with('\n'));
    }

    #[test]
    fn stale_expected_parent_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlMessageStore::new(dir.path());
        let sid = SessionId::new();
        let (a, c) = (MessageId::new(), MessageId::new());
        write_session(&store, sid, &format!("{}\n{}\n", line(sid, a, None, 0, "a"), line(sid, c, Some(a), 1, "c")));

        let before = store.read_raw(sid).unwrap();
        assert_matches!(
            store.rewrite_parent(sid, c, Some(None), Some(a)),
            Err(StoreError::InvalidOperation(_))
        );
        assert_eq!(store.read_raw(sid).unwrap(), before);
    }

    #[test]
    fn rewrite_skips_lines_the_loader_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlMessageStore::new(dir.path());
        let sid = SessionId::new();
        let (a, c) = (MessageId::new(), MessageId::new());
        let mut broken: Value = serde_json::from_str(&line(sid, c, None, 1, "broken copy")).unwrap();
        broken["timestamp"] = Value::String("yesterday".into());
        let broken = serde_json::to_string(&broken).unwrap();
        let contents = format!(
            "{}\n{broken}\n{}\n",
            line(sid, a, None, 0, "a"),
            line(sid, c, None, 2, "c")
        );
        write_session(&store, sid, &contents);

        let old = store.rewrite_parent(sid, c, Some(None), Some(a)).unwrap();
        assert_eq!(old, None);

        let raw = store.read_raw(sid).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines[1], broken);
        let loaded = store.load(sid).unwrap();
        assert_eq!(loaded.len(), 2);
        let repaired = loaded.iter().find(|m| m.id == c).unwrap();
        assert_eq!(repaired.parent_id, Some(a));
    }

    #[test]
    fn unknown_message_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlMessageStore::new(dir.path());
        let sid = SessionId::new();
        write_session(&store, sid, &format!("{}\n", line(sid, MessageId::new(), None, 0, "a")));
        assert_matches!(
            store.rewrite_parent(sid, MessageId::new(), None, None),
            Err(StoreError::MessageNotFound(_))
        );
    }

    #[test]
    fn atomic_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("s.jsonl");
        write_atomic(&path, "one\n").unwrap();
        write_atomic(&path, "two\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two\n");
        let leftovers = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
