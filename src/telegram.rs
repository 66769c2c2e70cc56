//! Telegram Bot API adapter: wire types, HTTP client, payload fetcher, and
//! the channel polling loop.
//!
//! The relay consumes `channel_post` updates via long polling. Each post is
//! mapped to an [`IncomingItem`] and handed to the relay core; attachment
//! bytes are resolved lazily through [`TelegramFetcher`] when a message is
//! actually delivered.

use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{Error, FetchError, Result};
use crate::relay::{ChannelRelay, Fetcher};
use crate::retry::Backoff;
use crate::types::{AttachmentRef, GroupKey, IncomingItem, ItemId};

/// Bot API endpoint used when no override is given.
const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Server-side long-poll hold time passed to `getUpdates`.
const POLL_TIMEOUT: Duration = Duration::from_secs(25);

/// Update kinds requested from the Bot API. Everything else is noise here.
const ALLOWED_UPDATES: &str = r#"["channel_post"]"#;

/// First retry delay after a failed poll.
const BACKOFF_INITIAL: Duration = Duration::from_secs(1);

/// Retry delay ceiling for the poll loop.
const BACKOFF_MAX: Duration = Duration::from_secs(60);

/// Bot API response envelope: `{ok, result, description}`.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T> {
        if self.ok {
            self.result
                .ok_or_else(|| Error::Telegram("response carried no result".to_string()))
        } else {
            Err(Error::Telegram(self.description.unwrap_or_else(|| {
                "request failed without description".to_string()
            })))
        }
    }
}

/// Identity returned by `getMe`.
#[derive(Debug, Deserialize)]
pub struct BotProfile {
    /// Numeric bot account id
    pub id: i64,
    /// Bot username, without the `@`
    pub username: Option<String>,
    /// Display name
    pub first_name: String,
}

/// One `getUpdates` entry.
#[derive(Debug, Deserialize)]
pub struct Update {
    /// Monotonic update cursor; the next poll asks for `update_id + 1`
    pub update_id: i64,
    /// Present for posts made in channels
    pub channel_post: Option<Message>,
}

/// Channel post as delivered by the Bot API.
///
/// Only the fields the relay consumes are declared; everything else in the
/// payload is ignored.
#[derive(Debug, Deserialize)]
pub struct Message {
    /// Message id, unique within the chat
    pub message_id: i64,
    /// Chat the message was posted in
    pub chat: Chat,
    /// Publish time
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub date: Option<DateTime<Utc>>,
    /// Plain text body
    pub text: Option<String>,
    /// Caption attached to a media message
    pub caption: Option<String>,
    /// Album correlation key shared by messages of one media group
    pub media_group_id: Option<String>,
    /// Available photo renditions, smallest first
    pub photo: Option<Vec<PhotoSize>>,
    /// Attached video
    pub video: Option<Video>,
    /// Attached generic file
    pub document: Option<Document>,
    /// Attached audio track
    pub audio: Option<Audio>,
}

/// One rendition of a photo.
#[derive(Debug, Deserialize)]
pub struct PhotoSize {
    /// Retrieval handle for this rendition
    pub file_id: String,
}

/// Video attachment.
#[derive(Debug, Deserialize)]
pub struct Video {
    /// Retrieval handle
    pub file_id: String,
}

/// Generic file attachment.
#[derive(Debug, Deserialize)]
pub struct Document {
    /// Retrieval handle
    pub file_id: String,
    /// Original filename, if the sender provided one
    pub file_name: Option<String>,
}

/// Audio attachment.
#[derive(Debug, Deserialize)]
pub struct Audio {
    /// Retrieval handle
    pub file_id: String,
    /// Original filename, if the sender provided one
    pub file_name: Option<String>,
}

/// Chat a message belongs to.
#[derive(Debug, Deserialize)]
pub struct Chat {
    /// Numeric chat id; channels are large negative numbers
    pub id: i64,
    /// Channel title
    pub title: Option<String>,
}

/// `getFile` result carrying the download path for a file id.
#[derive(Debug, Deserialize)]
pub struct TelegramFile {
    /// Relative path under the API file endpoint, valid for about an hour
    pub file_path: Option<String>,
}

impl Message {
    /// Map the wire message onto the relay's source-agnostic item.
    ///
    /// Text falls back to the media caption. Of the media kinds, exactly one
    /// is attached per message; photos use their largest rendition, which the
    /// API lists last.
    pub fn into_item(self) -> IncomingItem {
        let mut attachments = Vec::new();

        if let Some(photo) = self.photo.as_ref().and_then(|sizes| sizes.last()) {
            attachments.push(AttachmentRef::new(
                &photo.file_id,
                format!("image_{}.jpg", self.message_id),
            ));
        } else if let Some(video) = &self.video {
            attachments.push(AttachmentRef::new(
                &video.file_id,
                format!("video_{}.mp4", self.message_id),
            ));
        } else if let Some(document) = &self.document {
            attachments.push(AttachmentRef::new(
                &document.file_id,
                document.file_name.as_deref().unwrap_or("file"),
            ));
        } else if let Some(audio) = &self.audio {
            attachments.push(AttachmentRef::new(
                &audio.file_id,
                audio.file_name.as_deref().unwrap_or("audio.mp3"),
            ));
        }

        IncomingItem {
            id: ItemId(self.message_id),
            source: self.chat.id.to_string(),
            source_title: self.chat.title,
            date: self.date,
            group_key: self.media_group_id.map(GroupKey),
            text: self.text.or(self.caption),
            attachments,
        }
    }
}

/// Minimal Bot API client covering the methods the relay needs.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl TelegramClient {
    /// Client against the production Bot API endpoint.
    pub fn new(http: reqwest::Client, token: &str) -> Self {
        Self::with_base_url(http, token, DEFAULT_API_BASE)
    }

    /// Client against a custom endpoint, e.g. a local test server.
    pub fn with_base_url(http: reqwest::Client, token: &str, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token: token.to_string(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.base_url, self.token, file_path)
    }

    /// Confirm the token by asking the API who the bot is.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API refuses the token.
    pub async fn get_me(&self) -> Result<BotProfile> {
        let envelope: ApiResponse<BotProfile> = self
            .http
            .get(self.method_url("getMe"))
            .send()
            .await?
            .json()
            .await?;
        envelope.into_result()
    }

    /// Long-poll for updates after `offset`.
    ///
    /// The request holds server-side for up to 25 seconds; the per-request
    /// timeout leaves extra room on top so a full hold is not misread as a
    /// network failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API reports a problem.
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>> {
        let mut request = self
            .http
            .get(self.method_url("getUpdates"))
            .timeout(POLL_TIMEOUT + Duration::from_secs(10))
            .query(&[
                ("timeout", POLL_TIMEOUT.as_secs().to_string()),
                ("allowed_updates", ALLOWED_UPDATES.to_string()),
            ]);
        if let Some(offset) = offset {
            request = request.query(&[("offset", offset.to_string())]);
        }

        let envelope: ApiResponse<Vec<Update>> = request.send().await?.json().await?;
        envelope.into_result()
    }

    /// Resolve a file id to its download path.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Refused`] when the API rejects the file id.
    pub async fn get_file(&self, file_id: &str) -> std::result::Result<TelegramFile, FetchError> {
        let envelope: ApiResponse<TelegramFile> = self
            .http
            .get(self.method_url("getFile"))
            .query(&[("file_id", file_id)])
            .send()
            .await?
            .json()
            .await?;

        if envelope.ok {
            envelope.result.ok_or(FetchError::MissingPath)
        } else {
            Err(FetchError::Refused {
                description: envelope
                    .description
                    .unwrap_or_else(|| "request failed without description".to_string()),
            })
        }
    }

    /// Download the bytes behind a resolved file path.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::BadStatus`] on a non-success response.
    pub async fn download_file(&self, file_path: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let response = self.http.get(self.file_url(file_path)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus {
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Production [`Fetcher`] resolving attachments through the Bot API.
pub struct TelegramFetcher {
    client: TelegramClient,
}

impl TelegramFetcher {
    /// Fetcher over an existing client.
    pub fn new(client: TelegramClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Fetcher for TelegramFetcher {
    async fn fetch(&self, attachment: &AttachmentRef) -> std::result::Result<Vec<u8>, FetchError> {
        let file = self.client.get_file(&attachment.reference).await?;
        let path = file.file_path.ok_or(FetchError::MissingPath)?;
        self.client.download_file(&path).await
    }
}

/// Long-poll loop feeding channel posts into the relay.
///
/// Poll failures back off exponentially (with jitter) up to a minute and the
/// loop keeps going; the cursor is only advanced past updates that were
/// handed to the relay, so a crash-free restart never skips posts.
pub struct TelegramSource {
    client: TelegramClient,
    relay: ChannelRelay,
}

impl TelegramSource {
    /// Source feeding `relay` from `client`.
    pub fn new(client: TelegramClient, relay: ChannelRelay) -> Self {
        Self { client, relay }
    }

    /// Run until the relay shuts down.
    pub async fn run(self) {
        // Identity check is informational; a slow API start should not keep
        // the relay from polling.
        match self.client.get_me().await {
            Ok(profile) => {
                tracing::info!(
                    bot = profile.username.as_deref().unwrap_or(&profile.first_name),
                    bot_id = profile.id,
                    "Connected to Telegram"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not confirm bot identity, polling anyway");
            }
        }

        let shutdown = self.relay.shutdown_signal();
        let mut backoff = Backoff::new(BACKOFF_INITIAL, BACKOFF_MAX);
        let mut offset: Option<i64> = None;

        loop {
            if !self.relay.accepting_new.load(Ordering::SeqCst) {
                break;
            }

            let polled = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.client.get_updates(offset) => result,
            };

            match polled {
                Ok(updates) => {
                    backoff.reset();
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        let Some(post) = update.channel_post else {
                            continue;
                        };
                        if let Err(e) = self.relay.handle_item(post.into_item()).await {
                            tracing::info!(reason = %e, "Stopping Telegram poller");
                            return;
                        }
                    }
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "Polling Telegram failed, backing off"
                    );
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        tracing::info!("Telegram channel poller stopped");
    }
}

impl ChannelRelay {
    /// Start the Telegram polling loop as a background task.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn start_source(&self) -> Result<tokio::task::JoinHandle<()>> {
        let http = self.config.http.build_client()?;
        let client = TelegramClient::new(http, &self.config.telegram.bot_token);
        let source = TelegramSource::new(client, self.clone());

        let handle = tokio::spawn(async move {
            source.run().await;
        });

        tracing::info!("Telegram channel poller started");
        Ok(handle)
    }
}
