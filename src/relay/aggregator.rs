//! Media-group admission, completion timers, and flushing.
//!
//! Items sharing a correlation key are collected into one group. The first
//! arrival opens the group and arms a one-shot timer; when the timer fires
//! the group is flushed as a single composite message. The window is never
//! extended, so an album is delivered a fixed delay after its first item no
//! matter how the rest trickle in.

use std::collections::hash_map::Entry;

use tokio_util::sync::CancellationToken;

use crate::types::{Event, GroupKey, IncomingItem};

use super::ChannelRelay;
use super::group::{Group, GroupState};

impl ChannelRelay {
    /// Admit `item` into the group identified by `key`, opening the group if
    /// this is the first arrival.
    ///
    /// Creation and timer arming happen under the table lock, so two
    /// concurrent first arrivals cannot open the same group twice.
    pub(crate) async fn admit_to_group(&self, key: GroupKey, item: IncomingItem) {
        let mut groups = self.groups.lock().await;

        let group = match groups.entry(key.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let timer = CancellationToken::new();
                self.spawn_completion_timer(key.clone(), timer.clone());
                self.emit(Event::GroupOpened {
                    key: key.clone(),
                    id: item.id,
                });
                tracing::info!(group = %key, id = item.id.0, "Opened media group");
                entry.insert(Group::open(timer))
            }
        };

        if group.state == GroupState::Flushing {
            // The window already elapsed; the flush owns whatever was
            // collected. Stragglers are dropped, not re-grouped.
            tracing::debug!(
                group = %key,
                id = item.id.0,
                "Item arrived after completion window, dropping"
            );
            self.emit(Event::LateItemDropped { key, id: item.id });
            return;
        }

        if !group.admit_id(item.id) {
            tracing::debug!(group = %key, id = item.id.0, "Duplicate delivery, ignoring");
            self.emit(Event::DuplicateSkipped { key, id: item.id });
            return;
        }

        group.adopt_caption(item.text.as_deref());
        group.admitted += 1;

        let attachments = item.attachments.len();
        for attachment in item.attachments {
            group.fetches.spawn(self.fetch_payload(attachment));
        }

        tracing::debug!(
            group = %key,
            id = item.id.0,
            attachments,
            "Admitted item into media group"
        );
        self.emit(Event::ItemAdmitted {
            key,
            id: item.id,
            attachments,
        });
    }

    /// Arm the one-shot completion timer for a freshly opened group.
    ///
    /// The delay runs from now. Cancelling the token (shutdown) makes the
    /// timer exit without flushing.
    fn spawn_completion_timer(&self, key: GroupKey, cancel_token: CancellationToken) {
        let relay = self.clone();
        let delay = self.config.relay.media_group_delay;

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    relay.flush_group(&key).await;
                }
                _ = cancel_token.cancelled() => {
                    tracing::debug!(group = %key, "Completion timer cancelled before deadline");
                }
            }
        });
    }

    /// Flush the group: collect settled fetches and deliver one composite
    /// message, then remove the entry from the table.
    ///
    /// The `Open` check makes the flush exclusive; whoever moves the group to
    /// `Flushing` owns its collected fetches, so a group is dispatched at most
    /// once. The entry stays in the table while the flush runs so late
    /// arrivals are recognized and dropped.
    pub(crate) async fn flush_group(&self, key: &GroupKey) {
        let (mut fetches, caption, admitted, opened_at) = {
            let mut groups = self.groups.lock().await;
            let Some(group) = groups.get_mut(key) else {
                return;
            };
            if group.state != GroupState::Open {
                return;
            }
            group.state = GroupState::Flushing;
            let fetches = std::mem::take(&mut group.fetches);
            (fetches, group.caption.take(), group.admitted, group.opened_at)
        };

        // Drain outside the lock so arrivals for other groups are not blocked
        // behind slow downloads. Settlement order decides payload order.
        let mut payloads = Vec::with_capacity(fetches.len());
        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok(Some(payload)) => payloads.push(payload),
                // Failed fetches were already reported at the fetch site
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(group = %key, error = %e, "Payload fetch task did not complete");
                }
            }
        }

        let dispatched = if caption.is_none() && payloads.is_empty() {
            tracing::debug!(group = %key, admitted, "Nothing survived aggregation, skipping dispatch");
            false
        } else {
            match self.dispatcher.dispatch(caption.as_deref(), &payloads).await {
                Ok(()) => {
                    tracing::info!(
                        group = %key,
                        items = payloads.len(),
                        admitted,
                        window_ms = opened_at.elapsed().as_millis() as u64,
                        "Delivered media group"
                    );
                    true
                }
                Err(e) => {
                    tracing::error!(group = %key, error = %e, "Failed to deliver media group");
                    self.emit(Event::DispatchFailed {
                        error: e.to_string(),
                    });
                    false
                }
            }
        };

        self.emit(Event::GroupFlushed {
            key: key.clone(),
            items: payloads.len(),
            dispatched,
        });

        // Removing the entry closes the group; the same key arriving again
        // later opens a fresh one.
        let mut groups = self.groups.lock().await;
        groups.remove(key);
    }
}
