//! Branded ID newtypes for type safety.
//!
//! Every entity in stitch has a distinct ID type implemented as a newtype
//! around [`Uuid`]. This prevents accidentally passing a message ID where an
//! event ID is expected.
//!
//! Fresh IDs are UUID v7 (time-ordered). Thread IDs are UUID v5, derived from
//! the thread's first message, so a rebuilt session keeps the same thread IDs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random ID (UUID v7, time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse from the hyphenated string form.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s).map(Self)
            }

            /// Return the inner UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

branded_id!(
    /// Identifier of a single message record.
    MessageId
);

branded_id!(
    /// Identifier of one conversational session (one JSON-lines file).
    SessionId
);

branded_id!(
    /// Identifier of a classified thread within a built session.
    ThreadId
);

branded_id!(
    /// Identifier of a durable repair event.
    EventId
);

/// Namespace for deterministic thread IDs.
const THREAD_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0x1f, 0x3a, 0x52, 0x9c, 0x0e, 0x4d, 0x71, 0xa8, 0x44, 0x2e, 0x95, 0xd3, 0x07, 0xc1, 0x5a,
]);

impl ThreadId {
    /// Derive the thread ID for a thread whose first message is `root`.
    #[must_use]
    pub fn for_root(root: MessageId) -> Self {
        Self(Uuid::new_v5(&THREAD_NAMESPACE, root.as_uuid().as_bytes()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
