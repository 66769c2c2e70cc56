//! Per-album bookkeeping for the aggregation table.

use std::collections::HashSet;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::types::{ItemId, MediaPayload};

/// Lifecycle of a media group entry.
///
/// Transitions are one-way: `Open` -> `Flushing`, then the entry is removed
/// from the table once delivery settles. A `Flushing` entry is kept around so
/// stragglers can be recognized and dropped instead of opening a fresh group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GroupState {
    /// Accepting items; the completion timer is pending.
    Open,
    /// The completion window elapsed; a flush owns the collected fetches.
    Flushing,
}

/// Aggregation state for one media group.
///
/// The completion window is measured from the moment the group is opened and
/// is never extended by later arrivals.
pub(crate) struct Group {
    /// Current lifecycle state.
    pub(crate) state: GroupState,
    /// Text for the composite message, taken from the first item that carried any.
    pub(crate) caption: Option<String>,
    /// Item ids already admitted, for duplicate-delivery suppression.
    pub(crate) seen: HashSet<ItemId>,
    /// In-flight payload fetches. Drained in completion order at flush time.
    pub(crate) fetches: JoinSet<Option<MediaPayload>>,
    /// When the group was opened (start of the completion window).
    pub(crate) opened_at: Instant,
    /// Cancels the pending completion timer, e.g. during shutdown.
    pub(crate) timer: CancellationToken,
    /// Number of items admitted so far.
    pub(crate) admitted: usize,
}

impl Group {
    /// Open a fresh group whose completion timer is controlled by `timer`.
    pub(crate) fn open(timer: CancellationToken) -> Self {
        Self {
            state: GroupState::Open,
            caption: None,
            seen: HashSet::new(),
            fetches: JoinSet::new(),
            opened_at: Instant::now(),
            timer,
            admitted: 0,
        }
    }

    /// Record an item id; returns `false` if it was already admitted.
    pub(crate) fn admit_id(&mut self, id: ItemId) -> bool {
        self.seen.insert(id)
    }

    /// Adopt `text` as the group caption if none has been set yet.
    pub(crate) fn adopt_caption(&mut self, text: Option<&str>) {
        if self.caption.is_none() {
            if let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) {
                self.caption = Some(text.to_string());
            }
        }
    }
}
