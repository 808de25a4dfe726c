//! Upstream price feeds.
//!
//! A provider's only job is to push [`Tick`](crate::prelude::Tick)s into the
//! [`crate::marketdata::pipeline::Pipeline`] it is handed at construction
//! time; the Market Data Service never inspects a provider's transport.

pub mod crypto;
pub mod forex;

use std::time::Duration;

use async_trait::async_trait;

/// Bounded exponential backoff for upstream reconnect loops: `base * 2^n`,
/// capped at `max`, resetting to `base` after a successful connection.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    attempts: u32,
}

impl Backoff {
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max, attempts: 0 }
    }

    /// The delay to wait before the next reconnect attempt, advancing the
    /// internal attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.base.saturating_mul(1u32.checked_shl(self.attempts).unwrap_or(u32::MAX)).min(self.max);
        self.attempts = self.attempts.saturating_add(1);
        delay
    }

    /// Reset the attempt counter after a successful connection.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

/// An upstream market data source, driven by the Market Data Service.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A short name used in logs, e.g. `"crypto"` or `"forex"`.
    fn name(&self) -> &'static str;

    /// Start streaming `symbols`, publishing every received price into this
    /// provider's pipeline handle until [`Provider::stop`] is called or the
    /// upstream connection closes.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the initial connection to the upstream source
    /// cannot be established.
    async fn subscribe(&self, symbols: &[String]) -> anyhow::Result<()>;

    /// Stop streaming. Idempotent.
    async fn stop(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_each_attempt_until_the_cap() {
        let mut backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(10));

        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
        assert_eq!(backoff.next_delay(), Duration::from_secs(8));
        assert_eq!(backoff.next_delay(), Duration::from_secs(10));
    }

    #[test]
    fn reset_returns_to_the_base_delay() {
        let mut backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(10));
        backoff.next_delay();
        backoff.next_delay();

        backoff.reset();

        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
    }
}
