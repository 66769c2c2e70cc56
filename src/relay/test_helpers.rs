//! Shared test helpers for assembling ChannelRelay instances with scripted collaborators.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::{Config, DiscordConfig, HttpConfig, RelayConfig, TelegramConfig};
use crate::error::{DispatchError, FetchError};
use crate::relay::{ChannelRelay, Dispatcher, Fetcher};
use crate::types::{AttachmentRef, Event, GroupKey, IncomingItem, ItemId, MediaPayload};

/// Wait up to two seconds for an event matching `pred`, consuming others.
pub(crate) async fn wait_for_event(
    rx: &mut tokio::sync::broadcast::Receiver<Event>,
    pred: impl Fn(&Event) -> bool,
) -> Event {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => continue,
                Err(e) => panic!("event stream closed while waiting: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Channel id the test config relays.
pub(crate) const TEST_CHANNEL: &str = "-1001234567890";

/// Completion window used by [`test_config`], short enough for tests to wait out.
pub(crate) const TEST_WINDOW: Duration = Duration::from_millis(50);

/// Config pointing at [`TEST_CHANNEL`] with a short completion window.
pub(crate) fn test_config() -> Config {
    Config {
        telegram: TelegramConfig {
            bot_token: "12345:TEST_TOKEN".to_string(),
            channel_id: TEST_CHANNEL.to_string(),
        },
        discord: DiscordConfig {
            webhook_url: "https://discord.example/api/webhooks/1/abc".to_string(),
            username: "test relay".to_string(),
            avatar_url: "https://discord.example/avatar.png".to_string(),
        },
        http: HttpConfig::default(),
        relay: RelayConfig {
            media_group_delay: TEST_WINDOW,
            event_buffer: 64,
        },
    }
}

/// Assemble a relay over the given scripted collaborators.
pub(crate) fn test_relay(fetcher: Arc<dyn Fetcher>, dispatcher: Arc<dyn Dispatcher>) -> ChannelRelay {
    ChannelRelay::with_collaborators(test_config(), fetcher, dispatcher)
}

/// Item from the relayed channel with the given id, group key, text, and attachments.
pub(crate) fn make_item(
    id: i64,
    group_key: Option<&str>,
    text: Option<&str>,
    attachments: &[(&str, &str)],
) -> IncomingItem {
    IncomingItem {
        id: ItemId(id),
        source: TEST_CHANNEL.to_string(),
        source_title: Some("Test Channel".to_string()),
        date: None,
        group_key: group_key.map(GroupKey::from),
        text: text.map(String::from),
        attachments: attachments
            .iter()
            .map(|(reference, filename)| AttachmentRef::new(*reference, *filename))
            .collect(),
    }
}

/// Scripted [`Fetcher`] keyed by attachment reference.
///
/// References without a scripted payload fail, so tests control exactly which
/// fetches succeed. Optional per-reference delays let tests shape settlement
/// order.
pub(crate) struct MockFetcher {
    payloads: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
}

impl MockFetcher {
    pub(crate) fn new() -> Self {
        Self {
            payloads: HashMap::new(),
            failing: HashSet::new(),
            delays: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Script a successful fetch for `reference`.
    pub(crate) fn with_payload(mut self, reference: &str, bytes: &[u8]) -> Self {
        self.payloads.insert(reference.to_string(), bytes.to_vec());
        self
    }

    /// Script a refused fetch for `reference`.
    pub(crate) fn failing_on(mut self, reference: &str) -> Self {
        self.failing.insert(reference.to_string());
        self
    }

    /// Delay the settlement of `reference` by `delay`.
    pub(crate) fn delayed(mut self, reference: &str, delay: Duration) -> Self {
        self.delays.insert(reference.to_string(), delay);
        self
    }

    /// Number of fetch calls observed so far.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, attachment: &AttachmentRef) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(&attachment.reference) {
            tokio::time::sleep(*delay).await;
        }

        if self.failing.contains(&attachment.reference) {
            return Err(FetchError::Refused {
                description: "scripted failure".to_string(),
            });
        }

        self.payloads
            .get(&attachment.reference)
            .cloned()
            .ok_or_else(|| FetchError::Refused {
                description: format!("no scripted payload for {}", attachment.reference),
            })
    }
}

/// One delivery captured by [`RecordingDispatcher`].
#[derive(Clone, Debug)]
pub(crate) struct Delivery {
    pub(crate) text: Option<String>,
    pub(crate) payloads: Vec<MediaPayload>,
}

/// [`Dispatcher`] that records every delivery attempt.
///
/// When built with [`rejecting`](Self::rejecting), attempts are still
/// recorded but reported as rejected by the sink.
pub(crate) struct RecordingDispatcher {
    deliveries: Mutex<Vec<Delivery>>,
    reject_status: Option<u16>,
}

impl RecordingDispatcher {
    pub(crate) fn new() -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
            reject_status: None,
        }
    }

    /// Dispatcher whose sink rejects every delivery with `status`.
    pub(crate) fn rejecting(status: u16) -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
            reject_status: Some(status),
        }
    }

    /// Snapshot of the delivery attempts observed so far.
    pub(crate) fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn dispatch(
        &self,
        text: Option<&str>,
        payloads: &[MediaPayload],
    ) -> Result<(), DispatchError> {
        self.deliveries.lock().unwrap().push(Delivery {
            text: text.map(String::from),
            payloads: payloads.to_vec(),
        });

        match self.reject_status {
            Some(status) => Err(DispatchError::Rejected {
                status,
                body: "scripted rejection".to_string(),
            }),
            None => Ok(()),
        }
    }
}
