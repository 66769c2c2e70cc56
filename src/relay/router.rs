//! Item intake, channel filtering, and the standalone path.

use std::collections::hash_map::Entry;
use std::sync::atomic::Ordering;

use futures::future::join_all;

use crate::error::{Error, Result};
use crate::types::{Event, IncomingItem, MediaPayload};

use super::ChannelRelay;

impl ChannelRelay {
    /// Route one incoming item.
    ///
    /// Items from channels other than the configured one are discarded
    /// without further processing. Items carrying a group key join (or open)
    /// their media group; everything else is relayed on its own, with payload
    /// fetch and delivery running in the background.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShuttingDown`] once shutdown has begun.
    pub async fn handle_item(&self, item: IncomingItem) -> Result<()> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        if item.source != self.config.telegram.channel_id {
            tracing::debug!(
                source = %item.source,
                expected = %self.config.telegram.channel_id,
                "Ignoring item from unconfigured channel"
            );
            return Ok(());
        }

        match item.group_key.clone() {
            Some(key) => self.admit_to_group(key, item).await,
            None => self.relay_standalone(item).await,
        }

        Ok(())
    }

    /// Spawn the background relay of an item that belongs to no media group.
    ///
    /// The relay is counted as in-flight before the task starts so shutdown
    /// waits for every one, duplicate deliveries of the same id included.
    async fn relay_standalone(&self, item: IncomingItem) {
        {
            let mut active = self.active_relays.lock().await;
            *active.entry(item.id).or_insert(0) += 1;
        }

        let relay = self.clone();
        tokio::spawn(async move {
            relay.run_standalone_relay(item).await;
        });
    }

    /// Fetch the item's attachments concurrently, then deliver text and
    /// payloads as one message. Items with nothing deliverable are skipped.
    async fn run_standalone_relay(&self, item: IncomingItem) {
        let id = item.id;

        let fetches = item
            .attachments
            .into_iter()
            .map(|attachment| self.fetch_payload(attachment));
        let payloads: Vec<MediaPayload> = join_all(fetches).await.into_iter().flatten().collect();

        let text = item.text.as_deref().map(str::trim).filter(|t| !t.is_empty());
        if text.is_none() && payloads.is_empty() {
            tracing::debug!(id = id.0, "Item carried nothing deliverable, skipping");
            self.emit(Event::StandaloneSkipped { id });
        } else {
            match self.dispatcher.dispatch(text, &payloads).await {
                Ok(()) => {
                    tracing::info!(
                        id = id.0,
                        attachments = payloads.len(),
                        "Relayed standalone item"
                    );
                    self.emit(Event::StandaloneRelayed {
                        id,
                        attachments: payloads.len(),
                    });
                }
                Err(e) => {
                    tracing::error!(id = id.0, error = %e, "Failed to relay standalone item");
                    self.emit(Event::DispatchFailed {
                        error: e.to_string(),
                    });
                }
            }
        }

        let mut active = self.active_relays.lock().await;
        if let Entry::Occupied(mut slot) = active.entry(id) {
            *slot.get_mut() -= 1;
            if *slot.get() == 0 {
                slot.remove();
            }
        }
    }
}
