//! Binary entrypoint for tg-discord-relay.
//!
//! Thin wrapper over [`tg_discord_relay::ChannelRelay`]: loads `.env`,
//! installs the tracing subscriber, validates configuration, starts the
//! Telegram poller, and runs until signalled.

use tg_discord_relay::{ChannelRelay, Config, run_with_shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine; variables may come from the environment.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env().and_then(|config| {
        config.validate()?;
        Ok(config)
    }) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(
                error = %e,
                "Invalid configuration, see .env.example for the variable list"
            );
            return Err(e.into());
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        channel = %config.telegram.channel_id,
        proxy = config.http.proxy_url.as_deref().unwrap_or("direct connection"),
        group_delay_ms = config.relay.media_group_delay.as_millis() as u64,
        "Starting tg-discord-relay"
    );

    let relay = ChannelRelay::new(config)?;
    let poller = relay.start_source()?;

    run_with_shutdown(relay).await;
    poller.await?;

    Ok(())
}
