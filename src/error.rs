//! Error types for tg-discord-relay
//!
//! This module provides the error handling for the crate, including:
//! - Domain-specific error types (Fetch, Dispatch, Config, etc.)
//! - Per-item fetch failures that never abort a whole media group
//! - Per-flush dispatch failures that close the group without retry

use thiserror::Error;

/// Result type alias for tg-discord-relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tg-discord-relay
///
/// This is the primary error type used throughout the crate. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "TELEGRAM_BOT_TOKEN")
        key: Option<String>,
    },

    /// Telegram Bot API returned an error envelope (`ok: false`)
    #[error("Telegram API error: {0}")]
    Telegram(String),

    /// Item payload retrieval failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Outbound delivery failed
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Shutdown in progress - not accepting new items
    #[error("shutdown in progress: not accepting new items")]
    ShuttingDown,

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Per-item retrieval errors
///
/// A fetch failure drops the affected item from its group; it never fails
/// the group itself or any sibling fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The file-metadata request was refused by the API
    #[error("file metadata request refused: {description}")]
    Refused {
        /// Description returned in the API error envelope
        description: String,
    },

    /// The metadata response carried no downloadable path
    #[error("file metadata response carried no file path")]
    MissingPath,

    /// The payload download returned a non-success status
    #[error("payload download returned status {status}")]
    BadStatus {
        /// HTTP status code of the failed download
        status: u16,
    },

    /// Transport-level failure while fetching
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Per-flush delivery errors
///
/// A dispatch failure is reported and the group is closed anyway; there is
/// no automatic retry of a failed flush.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Both the text and the payload list were empty
    #[error("nothing to dispatch: no text and no payloads")]
    EmptyMessage,

    /// The webhook rejected the delivery
    #[error("webhook rejected delivery with status {status}: {body}")]
    Rejected {
        /// HTTP status code returned by the webhook
        status: u16,
        /// Response body text, useful for diagnosing rate limits and size caps
        body: String,
    },

    /// Transport-level failure while delivering
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}
