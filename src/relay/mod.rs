//! Core relay implementation split into focused submodules.
//!
//! The `ChannelRelay` struct and its methods are organized by domain:
//! - [`router`] - Item intake, channel filtering, and the standalone path
//! - [`aggregator`] - Media-group admission, completion timers, and flushing
//! - [`group`] - Per-album bookkeeping records

mod aggregator;
mod group;
mod router;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::discord::DiscordWebhook;
use crate::error::{DispatchError, FetchError, Result};
use crate::telegram::{TelegramClient, TelegramFetcher};
use crate::types::{AttachmentRef, Event, GroupKey, ItemId, MediaPayload};

use group::{Group, GroupState};

/// Abstraction over payload retrieval, enabling testability.
///
/// The production implementation is [`TelegramFetcher`], which resolves an
/// attachment's file reference against the Bot API and downloads the bytes.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Download the payload behind `attachment`.
    async fn fetch(&self, attachment: &AttachmentRef) -> std::result::Result<Vec<u8>, FetchError>;
}

/// Abstraction over outbound delivery, enabling testability.
///
/// The production implementation is [`DiscordWebhook`], which posts a
/// multipart form to a webhook URL.
#[async_trait::async_trait]
pub trait Dispatcher: Send + Sync {
    /// Deliver one composite message carrying optional text and any number of payloads.
    async fn dispatch(
        &self,
        text: Option<&str>,
        payloads: &[MediaPayload],
    ) -> std::result::Result<(), DispatchError>;
}

/// Main relay instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct ChannelRelay {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Payload fetcher (trait object for pluggable implementations)
    pub(crate) fetcher: Arc<dyn Fetcher>,
    /// Outbound dispatcher (trait object for pluggable implementations)
    pub(crate) dispatcher: Arc<dyn Dispatcher>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Media-group aggregation table, keyed by album correlation key
    pub(crate) groups: Arc<tokio::sync::Mutex<HashMap<GroupKey, Group>>>,
    /// In-flight standalone relays, counted per item id so duplicate
    /// deliveries are each waited for at shutdown
    pub(crate) active_relays: Arc<tokio::sync::Mutex<HashMap<ItemId, usize>>>,
    /// Flag to indicate whether new items are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Cancelled once at shutdown so long-running loops can stop promptly
    pub(crate) shutdown_token: CancellationToken,
}

impl ChannelRelay {
    /// Create a new relay wired to the production Telegram and Discord adapters.
    ///
    /// This builds the shared HTTP client (honoring any configured proxy) and
    /// sets up the event broadcast channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: Config) -> Result<Self> {
        let http = config.http.build_client()?;
        let telegram = TelegramClient::new(http.clone(), &config.telegram.bot_token);
        let fetcher: Arc<dyn Fetcher> = Arc::new(TelegramFetcher::new(telegram));
        let dispatcher: Arc<dyn Dispatcher> = Arc::new(DiscordWebhook::new(http, &config.discord));
        Ok(Self::with_collaborators(config, fetcher, dispatcher))
    }

    /// Create a relay from pre-built collaborators.
    ///
    /// This is the assembly point shared by [`ChannelRelay::new`] and by
    /// callers that supply their own [`Fetcher`] or [`Dispatcher`].
    pub fn with_collaborators(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        // Multiple subscribers receive all events independently
        let (event_tx, _rx) = tokio::sync::broadcast::channel(config.relay.event_buffer);

        Self {
            config: Arc::new(config),
            fetcher,
            dispatcher,
            event_tx,
            groups: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            active_relays: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Subscribe to relay events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events
    /// independently. Events are buffered, but if a subscriber falls behind by
    /// more than the configured buffer size, it will receive a
    /// `RecvError::Lagged` error.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Token cancelled once shutdown begins. Long-poll loops select on this.
    pub fn shutdown_signal(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Send an event, ignoring the error when no subscriber is listening.
    pub(crate) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Future that downloads one attachment's payload.
    ///
    /// A failed fetch is reported and yields `None`, so the attachment is
    /// omitted from delivery without affecting its siblings.
    pub(crate) fn fetch_payload(
        &self,
        attachment: AttachmentRef,
    ) -> impl std::future::Future<Output = Option<MediaPayload>> + Send + 'static {
        let fetcher = Arc::clone(&self.fetcher);
        let events = self.event_tx.clone();

        async move {
            match fetcher.fetch(&attachment).await {
                Ok(bytes) => Some(MediaPayload::new(attachment.filename, bytes)),
                Err(e) => {
                    tracing::warn!(
                        reference = %attachment.reference,
                        error = %e,
                        "Payload fetch failed, omitting attachment"
                    );
                    events
                        .send(Event::FetchFailed {
                            reference: attachment.reference,
                            error: e.to_string(),
                        })
                        .ok();
                    None
                }
            }
        }
    }

    /// Gracefully shut down the relay
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new items
    /// 2. Cancels pending group completion timers (their groups are discarded)
    /// 3. Waits for in-flight flushes and standalone relays with a timeout (30 seconds)
    /// 4. Discards whatever remains in the aggregation table
    ///
    /// Groups whose completion window had not yet elapsed are dropped without
    /// dispatch; a flush that is already running is given time to finish.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating graceful shutdown");

        // 1. Stop accepting new items
        self.accepting_new.store(false, Ordering::SeqCst);
        self.shutdown_token.cancel();
        tracing::info!("Stopped accepting new items");

        // 2. Cancel pending completion timers
        self.cancel_pending_timers().await;

        // 3. Wait for in-flight work to complete with timeout
        let shutdown_timeout = Duration::from_secs(30);
        let wait_result =
            tokio::time::timeout(shutdown_timeout, self.wait_for_active_work()).await;

        match wait_result {
            Ok(()) => {
                tracing::info!("All in-flight deliveries completed gracefully");
            }
            Err(_) => {
                tracing::warn!(
                    "Timeout waiting for in-flight deliveries, proceeding with shutdown"
                );
            }
        }

        // 4. Discard whatever is left in the aggregation table
        let discarded = self.discard_pending_groups().await;
        if discarded > 0 {
            tracing::warn!(discarded, "Dropped media groups that never completed");
        }

        // 5. Emit shutdown event
        self.emit(Event::Shutdown);

        tracing::info!("Graceful shutdown complete");
    }

    /// Cancel the completion timer of every group still waiting for its window.
    ///
    /// The timers exit without flushing; the groups themselves are removed
    /// later by [`discard_pending_groups`](Self::discard_pending_groups).
    async fn cancel_pending_timers(&self) {
        let groups = self.groups.lock().await;
        tracing::debug!(
            group_count = groups.len(),
            "Cancelling pending group completion timers"
        );

        for (key, group) in groups.iter() {
            if group.state == GroupState::Open {
                tracing::debug!(group = %key, "Cancelling completion timer");
                group.timer.cancel();
            }
        }
    }

    /// Wait until no flush or standalone relay is in flight.
    async fn wait_for_active_work(&self) {
        loop {
            let flushing = {
                let groups = self.groups.lock().await;
                groups
                    .values()
                    .filter(|g| g.state == GroupState::Flushing)
                    .count()
            };
            let standalone = {
                let active = self.active_relays.lock().await;
                active.values().sum::<usize>()
            };

            if flushing == 0 && standalone == 0 {
                return;
            }

            tracing::debug!(flushing, standalone, "Waiting for in-flight deliveries");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Drop every remaining aggregation entry, returning how many were discarded.
    ///
    /// Dropping a group aborts its outstanding payload fetches.
    async fn discard_pending_groups(&self) -> usize {
        let mut groups = self.groups.lock().await;
        let mut discarded = 0;
        for (key, group) in groups.drain() {
            tracing::warn!(
                group = %key,
                admitted = group.admitted,
                "Discarding unflushed media group at shutdown"
            );
            discarded += 1;
        }
        discarded
    }
}
