//! Discord webhook delivery

use crate::config::DiscordConfig;
use crate::error::DispatchError;
use crate::relay::Dispatcher;
use crate::types::MediaPayload;
use reqwest::multipart::{Form, Part};
use std::borrow::Cow;

/// Discord's display limit for message content, in characters
pub const CONTENT_LIMIT: usize = 2000;

const TRUNCATION_MARKER: &str = "...";

/// Webhook client delivering composite messages to one Discord channel
///
/// Each [`dispatch`](Dispatcher::dispatch) call posts a single
/// `multipart/form-data` request carrying the message text, the configured
/// display identity, and one `files[i]` part per payload.
#[derive(Clone)]
pub struct DiscordWebhook {
    http: reqwest::Client,
    url: String,
    username: String,
    avatar_url: String,
}

impl DiscordWebhook {
    /// Create a webhook client over a shared HTTP client
    pub fn new(http: reqwest::Client, config: &DiscordConfig) -> Self {
        Self {
            http,
            url: config.webhook_url.clone(),
            username: config.username.clone(),
            avatar_url: config.avatar_url.clone(),
        }
    }
}

/// Cut text down to the sink's display limit, marking the cut visibly
///
/// Counts characters, not bytes, so multi-byte text is never split inside a
/// code point.
fn truncate_content(text: &str) -> Cow<'_, str> {
    match text.char_indices().nth(CONTENT_LIMIT) {
        None => Cow::Borrowed(text),
        Some(_) => {
            let keep = CONTENT_LIMIT - TRUNCATION_MARKER.chars().count();
            let mut cut: String = text.chars().take(keep).collect();
            cut.push_str(TRUNCATION_MARKER);
            Cow::Owned(cut)
        }
    }
}

#[async_trait::async_trait]
impl Dispatcher for DiscordWebhook {
    async fn dispatch(
        &self,
        text: Option<&str>,
        payloads: &[MediaPayload],
    ) -> Result<(), DispatchError> {
        let content = text.map(str::trim).filter(|t| !t.is_empty());
        if content.is_none() && payloads.is_empty() {
            return Err(DispatchError::EmptyMessage);
        }

        let mut form = Form::new()
            .text("username", self.username.clone())
            .text("avatar_url", self.avatar_url.clone());

        if let Some(content) = content {
            form = form.text("content", truncate_content(content).into_owned());
        }

        for (index, payload) in payloads.iter().enumerate() {
            let part = Part::bytes(payload.bytes.clone()).file_name(payload.filename.clone());
            form = form.part(format!("files[{index}]"), part);
        }

        let response = self.http.post(&self.url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(payloads = payloads.len(), "delivered composite message");
        Ok(())
    }
}
