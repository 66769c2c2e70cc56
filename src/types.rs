//! Core types for tg-discord-relay

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a source item (the Telegram message id)
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl ItemId {
    /// Create a new ItemId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for ItemId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<ItemId> for i64 {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

impl PartialEq<i64> for ItemId {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl PartialEq<ItemId> for i64 {
    fn eq(&self, other: &ItemId) -> bool {
        *self == other.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ItemId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Opaque correlation key shared by the members of one media album
///
/// Items carrying the same key within the quiescence window are combined into
/// a single composite message. The key is never interpreted, only compared.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupKey(pub String);

impl GroupKey {
    /// Create a new GroupKey
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for GroupKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for GroupKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A reference to one downloadable attachment of an item
///
/// The reference resolves to raw bytes through the [`Fetcher`] seam; the
/// filename travels with the payload into the outbound composite message.
///
/// [`Fetcher`]: crate::relay::Fetcher
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// Opaque retrieval handle (the Telegram `file_id`)
    pub reference: String,

    /// Filename to attach the payload under, generated or source-provided
    pub filename: String,
}

impl AttachmentRef {
    /// Create a new attachment reference
    pub fn new(reference: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            filename: filename.into(),
        }
    }
}

/// One incoming source item, already mapped out of the wire format
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IncomingItem {
    /// Source item identifier, used for deduplication within a group
    pub id: ItemId,

    /// Identity of the originating channel, compared against the configured one
    pub source: String,

    /// Human-readable title of the originating channel (if any)
    pub source_title: Option<String>,

    /// When the source published the item
    pub date: Option<DateTime<Utc>>,

    /// Album correlation key; `None` marks a standalone item
    pub group_key: Option<GroupKey>,

    /// Text or caption carried by the item
    pub text: Option<String>,

    /// Downloadable attachments carried by the item
    pub attachments: Vec<AttachmentRef>,
}

/// A fetched payload ready for dispatch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaPayload {
    /// Filename the payload is attached under
    pub filename: String,

    /// Raw payload bytes
    pub bytes: Vec<u8>,
}

impl MediaPayload {
    /// Create a new payload
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

/// Event emitted during relay operation
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A new media group was opened and its completion timer scheduled
    GroupOpened {
        /// Album correlation key
        key: GroupKey,
        /// Item that opened the group
        id: ItemId,
    },

    /// An item was admitted into an open group
    ItemAdmitted {
        /// Album correlation key
        key: GroupKey,
        /// Admitted item
        id: ItemId,
        /// Number of attachment fetches started for the item
        attachments: usize,
    },

    /// A duplicate delivery of an already-admitted item was ignored
    DuplicateSkipped {
        /// Album correlation key
        key: GroupKey,
        /// Duplicate item
        id: ItemId,
    },

    /// An item arrived after its group's completion window and was dropped
    LateItemDropped {
        /// Album correlation key
        key: GroupKey,
        /// Late item
        id: ItemId,
    },

    /// One attachment fetch failed; the item is omitted from the flush
    FetchFailed {
        /// Opaque retrieval handle that failed
        reference: String,
        /// Error message
        error: String,
    },

    /// A group's completion window elapsed and its flush ran
    GroupFlushed {
        /// Album correlation key
        key: GroupKey,
        /// Number of payloads delivered (or attempted)
        items: usize,
        /// Whether the dispatch succeeded
        dispatched: bool,
    },

    /// A standalone item was fetched and dispatched
    StandaloneRelayed {
        /// Item identifier
        id: ItemId,
        /// Number of payloads delivered with it
        attachments: usize,
    },

    /// A standalone item carried neither text nor retrievable payloads
    StandaloneSkipped {
        /// Item identifier
        id: ItemId,
    },

    /// An outbound delivery failed
    DispatchFailed {
        /// Error message
        error: String,
    },

    /// Graceful shutdown initiated
    Shutdown,
}
