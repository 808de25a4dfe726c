//! Forex quote provider: subscribes to a Redis pub/sub channel fed by an
//! out-of-scope upstream forex feeder. Redis pub/sub is the crate's only
//! other external bus, alongside [`crate::session::redis_store`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::AsyncCommands;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::marketdata::pipeline::Pipeline;
use crate::marketdata::providers::{Backoff, Provider};
use crate::prelude::{MarketMessage, Tick};

/// Streams forex quotes published on `tradecore:forex:<symbol>` Redis
/// channels.
#[derive(Debug)]
pub struct ForexProvider {
    client: redis::Client,
    pipeline: Pipeline,
    stopped: Arc<AtomicBool>,
}

#[derive(Debug, Deserialize)]
struct ForexQuote {
    symbol: String,
    price: Decimal,
    time_ms: i64,
}

const BACKOFF_BASE: std::time::Duration = std::time::Duration::from_millis(500);
const BACKOFF_MAX: std::time::Duration = std::time::Duration::from_secs(60);

impl ForexProvider {
    /// Build a provider against a Redis connection described by `addr`
    /// (e.g. `redis://127.0.0.1:6379`).
    ///
    /// # Errors
    ///
    /// Returns `Err` if `addr` cannot be parsed as a Redis connection URL.
    pub fn new(addr: &str, pipeline: Pipeline) -> Result<Self, redis::RedisError> {
        Ok(Self {
            client: redis::Client::open(addr)?,
            pipeline,
            stopped: Arc::new(AtomicBool::new(false)),
        })
    }
}

#[async_trait]
impl Provider for ForexProvider {
    fn name(&self) -> &'static str {
        "forex"
    }

    async fn subscribe(&self, symbols: &[String]) -> anyhow::Result<()> {
        let mut backoff = Backoff::new(BACKOFF_BASE, BACKOFF_MAX);

        while !self.stopped.load(Ordering::Relaxed) {
            match self.run_once(symbols, &mut backoff).await {
                Ok(()) => log::info!("forex provider: stream closed cleanly"),
                Err(err) => log::warn!("forex provider: stream error, reconnecting: {err}"),
            }

            if self.stopped.load(Ordering::Relaxed) {
                break;
            }

            tokio::time::sleep(backoff.next_delay()).await;
        }

        Ok(())
    }

    async fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }
}

impl ForexProvider {
    async fn run_once(&self, symbols: &[String], backoff: &mut Backoff) -> anyhow::Result<()> {
        let connection = self.client.get_async_connection().await?;
        backoff.reset();
        let mut pubsub = connection.into_pubsub();

        for symbol in symbols {
            pubsub.subscribe(format!("tradecore:forex:{symbol}")).await?;
        }
        log::info!("forex provider: subscribed to {} channel(s)", symbols.len());

        let mut stream = pubsub.on_message();
        while let Some(message) = stream.next().await {
            if self.stopped.load(Ordering::Relaxed) {
                break;
            }

            let payload: String = message.get_payload()?;
            let Ok(quote) = serde_json::from_str::<ForexQuote>(&payload) else {
                continue;
            };

            self.pipeline.publish(MarketMessage::Tick(Tick {
                symbol: quote.symbol,
                price: quote.price,
                time_ms: quote.time_ms,
            }));
        }

        Ok(())
    }
}
