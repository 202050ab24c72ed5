//! Test helpers for building message sets by hand.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use stitch_core::{Message, MessageId, MessageKind, Session, SessionId};

use crate::builder::GraphBuilder;

/// Seconds-since-epoch for `t = 0`.
pub(crate) const BASE_SECS: i64 = 1_700_000_000;

pub(crate) fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(BASE_SECS + secs, 0).unwrap()
}

/// Accumulates messages for one session.
pub(crate) struct SessionFixture {
    pub(crate) session_id: SessionId,
    pub(crate) messages: Vec<Message>,
}

impl SessionFixture {
    pub(crate) fn new() -> Self {
        Self {
            session_id: SessionId::new(),
            messages: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, parent: Option<MessageId>, text: &str, secs: i64) -> MessageId {
        let id = MessageId::new();
        self.messages.push(Message {
            id,
            parent_id: parent,
            kind: if self.messages.len() % 2 == 0 {
                MessageKind::User
            } else {
                MessageKind::Assistant
            },
            content: Value::String(text.to_string()),
            timestamp: at(secs),
            session_id: self.session_id,
            is_side_branch: false,
            corruption_score: 0.0,
            topic: None,
            thread_id: None,
            extra: Map::new(),
        });
        id
    }

    pub(crate) fn root(&mut self, text: &str, secs: i64) -> MessageId {
        self.push(None, text, secs)
    }

    pub(crate) fn child(&mut self, parent: MessageId, text: &str, secs: i64) -> MessageId {
        self.push(Some(parent), text, secs)
    }

    pub(crate) fn get(&self, id: MessageId) -> &Message {
        self.messages.iter().find(|m| m.id == id).unwrap()
    }

    pub(crate) fn get_mut(&mut self, id: MessageId) -> &mut Message {
        self.messages.iter_mut().find(|m| m.id == id).unwrap()
    }

    pub(crate) fn build(&self) -> Session {
        GraphBuilder::default().build(self.session_id, self.messages.clone())
    }
}

/// Scenario 1: A(root, t=0), B(parent=A, t=1), C(parent=null, t=2).
pub(crate) fn scenario_one() -> (SessionFixture, [MessageId; 3]) {
    let mut fx = SessionFixture::new();
    let a = fx.root("rust logging setup question", 0);
    let b = fx.child(a, "rust logging setup answer", 1);
    let c = fx.root("rust logging setup followup", 2);
    (fx, [a, b, c])
}
