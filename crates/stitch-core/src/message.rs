//! Message records and the loaded [`Message`] type.
//!
//! [`MessageRecord`] is the exact JSON-lines wire shape: known fields are
//! typed, every other field lands in `extra` and is written back untouched.
//! [`Message`] is the in-memory form used by the graph layer; it adds the
//! derived fields (`corruption_score`, `thread_id`) that are never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{MessageId, SessionId, ThreadId};

/// Kind of a message record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Human turn.
    User,
    /// Model turn.
    Assistant,
    /// System prompt or notice.
    System,
    /// Compaction summary.
    Summary,
    /// File-state snapshot.
    #[serde(alias = "file-history-snapshot", alias = "fileSnapshot")]
    FileSnapshot,
}

impl MessageKind {
    /// Wire string for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Summary => "summary",
            Self::FileSnapshot => "file_snapshot",
        }
    }
}

/// One line of a session's JSON-lines file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Message ID.
    pub id: MessageId,
    /// Parent message ID (`null` for roots and for orphans).
    #[serde(default)]
    pub parent_id: Option<MessageId>,
    /// Record kind.
    pub kind: MessageKind,
    /// Plain string or structured content blocks.
    #[serde(default)]
    pub content: Value,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Owning session.
    pub session_id: SessionId,
    /// Whether the producer flagged this message as a side branch.
    #[serde(default)]
    pub is_side_branch: bool,
    /// Optional topic label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Unknown fields, preserved opaquely.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A loaded message.
///
/// Immutable once loaded except for `parent_id`, which only a repair
/// changes. `corruption_score` and `thread_id` are filled in by the graph
/// builder and are not authoritative.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message ID.
    pub id: MessageId,
    /// Parent message ID.
    pub parent_id: Option<MessageId>,
    /// Record kind.
    pub kind: MessageKind,
    /// Raw content (string or blocks).
    pub content: Value,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Owning session.
    pub session_id: SessionId,
    /// Producer-supplied side-branch flag.
    pub is_side_branch: bool,
    /// Derived likelihood that this message was orphaned by accident.
    pub corruption_score: f64,
    /// Optional topic label.
    pub topic: Option<String>,
    /// Derived thread membership.
    pub thread_id: Option<ThreadId>,
    /// Unknown record fields, passed through untouched.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Convert a wire record into a message with empty derived fields.
    #[must_use]
    pub fn from_record(record: MessageRecord) -> Self {
        Self {
            id: record.id,
            parent_id: record.parent_id,
            kind: record.kind,
            content: record.content,
            timestamp: record.timestamp,
            session_id: record.session_id,
            is_side_branch: record.is_side_branch,
            corruption_score: 0.0,
            topic: record.topic,
            thread_id: None,
            extra: record.extra,
        }
    }

    /// Convert back to the wire shape, dropping derived fields.
    #[must_use]
    pub fn to_record(&self) -> MessageRecord {
        MessageRecord {
            id: self.id,
            parent_id: self.parent_id,
            kind: self.kind,
            content: self.content.clone(),
            timestamp: self.timestamp,
            session_id: self.session_id,
            is_side_branch: self.is_side_branch,
            topic: self.topic.clone(),
            extra: self.extra.clone(),
        }
    }

    /// Flatten the content into plain text.
    ///
    /// Strings are taken as-is; block arrays contribute their `text` fields
    /// (and nested `content`) joined by newlines. Anything else is empty.
    pub fn text(&self) -> String {
        let mut parts = Vec::new();
        collect_text(&self.content, &mut parts);
        if let Some(topic) = &self.topic {
            parts.push(topic.clone());
        }
        parts.join("\n")
    }

    /// Read a string-valued extra field.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Self::from_record(record)
    }
}

fn collect_text(value: &Value, parts: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            if !s.is_empty() {
                parts.push(s.clone());
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_text(item, parts);
            }
        }
        Value::Object(map) => {
            if let Some(text) = map.get("text") {
                collect_text(text, parts);
            }
            if let Some(inner) = map.get("content") {
                collect_text(inner, parts);
            }
        }
        _ => {}
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
