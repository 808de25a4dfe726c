//! Direct exchange WebSocket provider: connects, subscribes to a symbol
//! set, and reconnects with backoff on disconnect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::marketdata::pipeline::Pipeline;
use crate::marketdata::providers::{Backoff, Provider};
use crate::prelude::{MarketMessage, Tick};

/// Streams ticker updates from a single upstream exchange WebSocket
/// endpoint, reconnecting with bounded exponential backoff until
/// [`CryptoProvider::stop`] is called.
#[derive(Debug)]
pub struct CryptoProvider {
    endpoint: Url,
    pipeline: Pipeline,
    stopped: Arc<AtomicBool>,
}

impl CryptoProvider {
    /// Build a provider that streams from `endpoint` and forwards every
    /// tick into `pipeline`.
    #[must_use]
    pub fn new(endpoint: Url, pipeline: Pipeline) -> Self {
        Self {
            endpoint,
            pipeline,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// A ticker push from the upstream exchange, trimmed to what this provider
/// needs.
#[derive(Debug, Deserialize)]
struct UpstreamTicker {
    #[serde(rename = "instrument_name")]
    symbol: String,
    #[serde(rename = "last_price")]
    price: Decimal,
    #[serde(rename = "time_ms")]
    time_ms: i64,
}

const BACKOFF_BASE: std::time::Duration = std::time::Duration::from_millis(500);
const BACKOFF_MAX: std::time::Duration = std::time::Duration::from_secs(60);

#[async_trait]
impl Provider for CryptoProvider {
    fn name(&self) -> &'static str {
        "crypto"
    }

    async fn subscribe(&self, symbols: &[String]) -> anyhow::Result<()> {
        let mut backoff = Backoff::new(BACKOFF_BASE, BACKOFF_MAX);

        while !self.stopped.load(Ordering::Relaxed) {
            match self.run_once(symbols, &mut backoff).await {
                Ok(()) => log::info!("crypto provider: stream closed cleanly"),
                Err(err) => log::warn!("crypto provider: stream error, reconnecting: {err}"),
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

impl CryptoProvider {
    async fn run_once(&self, symbols: &[String], backoff: &mut Backoff) -> anyhow::Result<()> {
        let (stream, _) = connect_async(self.endpoint.as_str()).await?;
        backoff.reset();
        log::info!("crypto provider: connected to {}", self.endpoint);

        let (mut write, mut read) = stream.split();

        let subscribe_msg = serde_json::json!({
            "method": "subscribe",
            "channels": symbols.iter().map(|s| format!("ticker.{s}")).collect::<Vec<_>>(),
        });
        write.send(Message::Text(subscribe_msg.to_string())).await?;

        while let Some(message) = read.next().await {
            if self.stopped.load(Ordering::Relaxed) {
                break;
            }

            let message = message?;
            let Message::Text(text) = message else {
                continue;
            };

            let Ok(ticker) = serde_json::from_str::<UpstreamTicker>(&text) else {
                continue;
            };

            self.pipeline.publish(MarketMessage::Tick(Tick {
                symbol: ticker.symbol,
                price: ticker.price,
                time_ms: ticker.time_ms,
            }));
        }

        Ok(())
    }
}
