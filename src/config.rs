//! Configuration types for tg-discord-relay

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Environment variable holding the Telegram bot token
pub const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
/// Environment variable holding the Discord webhook URL
pub const ENV_WEBHOOK_URL: &str = "DISCORD_WEBHOOK_URL";
/// Environment variable holding the source channel identity
pub const ENV_CHANNEL_ID: &str = "TELEGRAM_CHANNEL_ID";
/// Environment variable overriding the outbound display name
pub const ENV_APP_TITLE: &str = "DISCORD_APP_TITLE";
/// Environment variable overriding the outbound avatar URL
pub const ENV_APP_LOGO: &str = "DISCORD_APP_LOGO";
/// Environment variable holding an optional proxy endpoint
pub const ENV_PROXY_URL: &str = "PROXY_URL";
/// Environment variable overriding the album quiescence window, in milliseconds
pub const ENV_GROUP_DELAY_MS: &str = "MEDIA_GROUP_DELAY_MS";

/// Telegram source configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token obtained from BotFather
    pub bot_token: String,

    /// Identity of the channel to relay; posts from any other chat are ignored
    pub channel_id: String,
}

/// Discord sink configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Webhook URL to deliver composite messages to
    pub webhook_url: String,

    /// Display name attached to outgoing messages
    #[serde(default = "default_username")]
    pub username: String,

    /// Avatar URL attached to outgoing messages
    #[serde(default = "default_avatar_url")]
    pub avatar_url: String,
}

/// HTTP transport configuration shared by both adapters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Optional proxy endpoint (http, https or socks5 scheme)
    ///
    /// An unusable proxy degrades to a direct connection with a warning
    /// instead of aborting startup.
    #[serde(default)]
    pub proxy_url: Option<String>,

    /// Per-request timeout (default: 30 seconds)
    ///
    /// Long-poll requests override this with their own, longer deadline.
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            proxy_url: None,
            request_timeout: default_request_timeout(),
        }
    }
}

/// Relay engine configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Quiescence window after a group's first item (default: 5000 ms)
    ///
    /// Measured from first arrival and never reset by later members, so the
    /// worst-case relay latency for an album is bounded by this value.
    #[serde(default = "default_group_delay", with = "duration_ms_serde")]
    pub media_group_delay: Duration,

    /// Buffer size of the broadcast event channel (default: 1000)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            media_group_delay: default_group_delay(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// Main configuration for the relay
///
/// Fields are organized into logical sub-configs:
/// - [`telegram`](TelegramConfig): source credential and channel filter
/// - [`discord`](DiscordConfig): sink endpoint and message identity
/// - [`http`](HttpConfig): shared transport (proxy, timeouts)
/// - [`relay`](RelayConfig): aggregation engine tuning
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Telegram source settings
    pub telegram: TelegramConfig,

    /// Discord sink settings
    pub discord: DiscordConfig,

    /// HTTP transport settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Aggregation engine settings
    #[serde(default)]
    pub relay: RelayConfig,
}

impl Config {
    /// Load configuration from process environment variables
    ///
    /// Collects every missing required variable into a single error so the
    /// operator sees the whole list at once instead of fixing one at a time.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// `from_env` is a thin wrapper over this; tests drive it with a map.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let bot_token = non_empty(ENV_BOT_TOKEN);
        let webhook_url = non_empty(ENV_WEBHOOK_URL);
        let channel_id = non_empty(ENV_CHANNEL_ID);

        let missing: Vec<&str> = [
            (ENV_BOT_TOKEN, bot_token.is_none()),
            (ENV_WEBHOOK_URL, webhook_url.is_none()),
            (ENV_CHANNEL_ID, channel_id.is_none()),
        ]
        .iter()
        .filter_map(|(name, absent)| absent.then_some(*name))
        .collect();

        if !missing.is_empty() {
            return Err(Error::Config {
                message: format!(
                    "missing required environment variables: {}",
                    missing.join(", ")
                ),
                key: None,
            });
        }

        let media_group_delay = match non_empty(ENV_GROUP_DELAY_MS) {
            Some(raw) => {
                let ms: u64 = raw.trim().parse().map_err(|_| Error::Config {
                    message: format!(
                        "{ENV_GROUP_DELAY_MS} must be an integer number of milliseconds, got {raw:?}"
                    ),
                    key: Some(ENV_GROUP_DELAY_MS.to_string()),
                })?;
                Duration::from_millis(ms)
            }
            None => default_group_delay(),
        };

        Ok(Self {
            telegram: TelegramConfig {
                bot_token: bot_token.unwrap_or_default(),
                channel_id: channel_id.unwrap_or_default(),
            },
            discord: DiscordConfig {
                webhook_url: webhook_url.unwrap_or_default(),
                username: non_empty(ENV_APP_TITLE).unwrap_or_else(default_username),
                avatar_url: non_empty(ENV_APP_LOGO).unwrap_or_else(default_avatar_url),
            },
            http: HttpConfig {
                proxy_url: non_empty(ENV_PROXY_URL),
                request_timeout: default_request_timeout(),
            },
            relay: RelayConfig {
                media_group_delay,
                event_buffer: default_event_buffer(),
            },
        })
    }

    /// Validate the configuration, returning the first violation found
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(Error::Config {
                message: "bot token must not be empty".to_string(),
                key: Some(ENV_BOT_TOKEN.to_string()),
            });
        }

        if self.telegram.channel_id.trim().is_empty() {
            return Err(Error::Config {
                message: "channel id must not be empty".to_string(),
                key: Some(ENV_CHANNEL_ID.to_string()),
            });
        }

        let webhook = Url::parse(&self.discord.webhook_url).map_err(|e| Error::Config {
            message: format!("invalid webhook URL: {e}"),
            key: Some(ENV_WEBHOOK_URL.to_string()),
        })?;
        if !matches!(webhook.scheme(), "http" | "https") {
            return Err(Error::Config {
                message: format!(
                    "webhook URL must use http or https, got scheme {:?}",
                    webhook.scheme()
                ),
                key: Some(ENV_WEBHOOK_URL.to_string()),
            });
        }

        if self.relay.media_group_delay.is_zero() {
            return Err(Error::Config {
                message: "media group delay must be positive".to_string(),
                key: Some(ENV_GROUP_DELAY_MS.to_string()),
            });
        }

        Ok(())
    }
}

impl HttpConfig {
    /// Build the shared HTTP client used by both adapters
    ///
    /// An unusable proxy endpoint logs a warning and degrades to a direct
    /// connection, matching the behavior operators expect from a relay that
    /// should keep running when the proxy disappears.
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .user_agent(concat!("tg-discord-relay/", env!("CARGO_PKG_VERSION")));

        match &self.proxy_url {
            Some(proxy_url) => match reqwest::Proxy::all(proxy_url) {
                Ok(proxy) => {
                    tracing::info!(proxy = %proxy_url, "routing requests through proxy");
                    builder = builder.proxy(proxy);
                }
                Err(e) => {
                    tracing::warn!(
                        proxy = %proxy_url,
                        error = %e,
                        "unusable proxy URL, falling back to direct connection"
                    );
                }
            },
            None => {
                tracing::info!("using direct connection");
            }
        }

        Ok(builder.build()?)
    }
}

// Default value functions
fn default_username() -> String {
    "📢 Telegram Channel".to_string()
}

fn default_avatar_url() -> String {
    "https://telegram.org/img/t_logo.png".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_group_delay() -> Duration {
    Duration::from_millis(5000)
}

fn default_event_buffer() -> usize {
    1000
}

// Duration serialization helper (integer seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (integer milliseconds, for sub-second windows)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
