//! JSON-lines parsing with per-record recovery.
//!
//! A session file holds one [`MessageRecord`] per line. A line that fails to
//! parse, or that belongs to a different session, becomes a
//! [`MalformedRecord`] and is skipped with a warning. Parsing never fails as a
//! whole.

use serde::Serialize;
use tracing::warn;

use crate::ids::SessionId;
use crate::message::{Message, MessageRecord};

/// A line that could not be turned into a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MalformedRecord {
    /// 1-based line number.
    pub line: usize,
    /// Why the line was skipped.
    pub reason: String,
}

/// Output of [`parse_jsonl`].
#[derive(Clone, Debug, Default)]
pub struct ParsedRecords {
    /// Successfully parsed records, in file order.
    pub records: Vec<MessageRecord>,
    /// Skipped lines.
    pub malformed: Vec<MalformedRecord>,
}

impl ParsedRecords {
    /// Convert the parsed records into messages.
    pub fn into_messages(self) -> Vec<Message> {
        self.records.into_iter().map(Message::from_record).collect()
    }
}

/// Parse a JSON-lines document for `session_id`.
///
/// Blank lines are ignored. Records whose `session_id` differs from the
/// requested session are treated as malformed.
pub fn parse_jsonl(input: &str, session_id: SessionId) -> ParsedRecords {
    let mut parsed = ParsedRecords::default();

    for (index, line) in input.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<MessageRecord>(line) {
            Ok(record) if record.session_id == session_id => parsed.records.push(record),
            Ok(record) => {
                let reason = format!(
                    "record {} belongs to session {}",
                    record.id, record.session_id
                );
                warn!(%session_id, line = line_no, %reason, "skipping malformed record");
                parsed.malformed.push(MalformedRecord {
                    line: line_no,
                    reason,
                });
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(%session_id, line = line_no, %reason, "skipping malformed record");
                parsed.malformed.push(MalformedRecord {
                    line: line_no,
                    reason,
                });
            }
        }
    }

    parsed
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
