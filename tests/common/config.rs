//! Test configuration helpers wiring a relay against local mock servers

use std::sync::Arc;
use std::time::Duration;

use tg_discord_relay::config::{DiscordConfig, HttpConfig, RelayConfig, TelegramConfig};
use tg_discord_relay::{
    ChannelRelay, Config, DiscordWebhook, TelegramClient, TelegramFetcher, TelegramSource,
};
use wiremock::MockServer;

/// Bot token baked into every test config; mock request paths embed it.
pub const TEST_TOKEN: &str = "12345:TEST_TOKEN";

/// Channel the test config relays, as the Bot API reports it.
pub const TEST_CHANNEL_ID: i64 = -1001234567890;

/// Quiescence window used by tests, short enough to wait out.
pub const TEST_WINDOW: Duration = Duration::from_millis(200);

/// Config relaying [`TEST_CHANNEL_ID`] into a webhook on the `discord` server.
pub fn test_config(discord: &MockServer) -> Config {
    Config {
        telegram: TelegramConfig {
            bot_token: TEST_TOKEN.to_string(),
            channel_id: TEST_CHANNEL_ID.to_string(),
        },
        discord: DiscordConfig {
            webhook_url: format!("{}/webhook", discord.uri()),
            username: "Test Relay".to_string(),
            avatar_url: "https://example.com/logo.png".to_string(),
        },
        http: HttpConfig::default(),
        relay: RelayConfig {
            media_group_delay: TEST_WINDOW,
            event_buffer: 64,
        },
    }
}

/// Assemble a relay whose fetcher talks to the `telegram` server and whose
/// dispatcher posts to the `discord` server, plus the source that feeds it.
///
/// Both adapters are the production implementations; only the endpoints are
/// redirected.
pub fn relay_over(telegram: &MockServer, discord: &MockServer) -> (ChannelRelay, TelegramSource) {
    let config = test_config(discord);
    let http = reqwest::Client::new();

    let client = TelegramClient::with_base_url(http.clone(), TEST_TOKEN, telegram.uri());
    let fetcher = Arc::new(TelegramFetcher::new(client.clone()));
    let dispatcher = Arc::new(DiscordWebhook::new(http, &config.discord));

    let relay = ChannelRelay::with_collaborators(config, fetcher, dispatcher);
    let source = TelegramSource::new(client, relay.clone());
    (relay, source)
}
