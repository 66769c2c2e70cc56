//! # tg-discord-relay
//!
//! Relay service forwarding posts from a Telegram channel to a Discord webhook.
//!
//! ## Design Philosophy
//!
//! tg-discord-relay is designed to be:
//! - **Album-aware** - Media groups are aggregated and delivered as one composite message
//! - **Config-by-environment** - Twelve-factor configuration, nothing to mount or edit
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Library-first** - The binary is a thin wrapper over the [`ChannelRelay`] type
//!
//! ## Quick Start
//!
//! ```no_run
//! use tg_discord_relay::{ChannelRelay, Config, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     config.validate()?;
//!
//!     let relay = ChannelRelay::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = relay.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     relay.start_source()?;
//!     run_with_shutdown(relay).await;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Discord webhook sink
pub mod discord;
/// Error types
pub mod error;
/// Core relay implementation (decomposed into focused submodules)
pub mod relay;
/// Retry logic with exponential backoff
pub mod retry;
/// Telegram Bot API source
pub mod telegram;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, DiscordConfig, HttpConfig, RelayConfig, TelegramConfig};
pub use discord::DiscordWebhook;
pub use error::{DispatchError, Error, FetchError, Result};
pub use relay::{ChannelRelay, Dispatcher, Fetcher};
pub use telegram::{TelegramClient, TelegramFetcher, TelegramSource};
pub use types::{AttachmentRef, Event, GroupKey, IncomingItem, ItemId, MediaPayload};

/// Helper function to run the relay with graceful signal handling.
///
/// Waits for a termination signal and then calls the relay's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use tg_discord_relay::{ChannelRelay, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::from_env()?;
///     let relay = ChannelRelay::new(config)?;
///     relay.start_source()?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(relay).await;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(relay: ChannelRelay) {
    wait_for_signal().await;
    relay.shutdown().await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests);
    // fall back to whatever handler is still available.
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Err(term_err), Err(int_err)) => {
            tracing::error!(
                sigterm_error = %term_err,
                sigint_error = %int_err,
                "Could not register signal handlers, using ctrl_c fallback"
            );
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
