//! Reconnect backoff with exponential growth and jitter
//!
//! The polling loop never gives up on the source feed: every failed poll is
//! followed by a delay that grows exponentially up to a cap, and a successful
//! poll resets the progression. Jitter spreads reconnect attempts out so many
//! relays recovering from the same outage do not stampede the API.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tg_discord_relay::retry::Backoff;
//!
//! let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));
//! let delay = backoff.next_delay();
//! assert!(delay >= Duration::from_secs(1));
//! backoff.reset();
//! ```

use rand::Rng;
use std::time::Duration;

/// Exponential backoff state for an endless retry loop
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    jitter: bool,
    next: Duration,
}

impl Backoff {
    /// Create a backoff starting at `initial` and capped at `max`
    ///
    /// The delay doubles per failure and carries jitter by default.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            multiplier: 2.0,
            jitter: true,
            next: initial,
        }
    }

    /// Enable or disable jitter (deterministic delays are useful in tests)
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Return the delay to wait before the next attempt and advance the progression
    pub fn next_delay(&mut self) -> Duration {
        let base = self.next;
        let grown = Duration::from_secs_f64(base.as_secs_f64() * self.multiplier);
        self.next = grown.min(self.max);

        if self.jitter { add_jitter(base) } else { base }
    }

    /// Reset the progression after a successful attempt
    pub fn reset(&mut self) {
        self.next = self.initial;
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// Jitter is uniformly distributed between 0% and 100% of the delay, so the
/// returned value lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    let jittered_secs = delay.as_secs_f64() * (1.0 + jitter_factor);
    Duration::from_secs_f64(jittered_secs)
}
