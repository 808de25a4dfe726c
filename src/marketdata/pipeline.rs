//! The Broadcast Pipeline.
//!
//! A single bounded channel of [`MarketMessage`]s with one fan-out task
//! that performs an independent non-blocking send per consumer — the Hub,
//! the Matcher, the Position Manager — so a stalled consumer on any one
//! leg never blocks the others.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::marketdata::cache::LastPriceCache;
use crate::marketdata::hub::Hub;
use crate::prelude::MarketMessage;
use crate::shutdown::ShutdownSignal;

/// Capacity of the pipeline's inlet.
pub const PIPELINE_CAPACITY: usize = 256;

/// Producer-facing handle: providers and the Market Data Service publish
/// here with [`Pipeline::publish`].
#[derive(Debug, Clone)]
pub struct Pipeline {
    inlet: mpsc::Sender<MarketMessage>,
}

impl Pipeline {
    /// Spawn the fan-out task. `consumers` are bounded channels owned by
    /// other components (the Matcher, the Position Manager, ...); the Hub
    /// is handed directly since its `broadcast` is itself non-blocking.
    /// Every tick also updates `cache` inline before fan-out, since a
    /// `RwLock<HashMap<_>>` insert is cheap enough not to warrant its own
    /// consumer leg.
    #[must_use]
    pub fn spawn(
        hub: Hub,
        consumers: Vec<mpsc::Sender<MarketMessage>>,
        cache: Arc<LastPriceCache>,
        mut shutdown: ShutdownSignal,
    ) -> (Self, JoinHandle<()>) {
        let (inlet, mut outlet) = mpsc::channel(PIPELINE_CAPACITY);

        let handle = tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    message = outlet.recv() => message,
                    () = shutdown.wait() => {
                        log::info!("pipeline: shutdown signal received");
                        break;
                    }
                };
                let Some(message) = message else { break };

                if let Some(tick) = message.as_tick() {
                    cache.update(tick.clone());
                }

                if let Ok(json) = serde_json::to_string(&WireMessage::from(&message)) {
                    hub.broadcast(json.into());
                }

                for consumer in &consumers {
                    if let Err(mpsc::error::TrySendError::Full(_)) = consumer.try_send(message.clone()) {
                        log::warn!("pipeline: consumer inlet full, dropping message for it only");
                    }
                }
            }

            log::info!("pipeline: fan-out task stopped");
        });

        (Self { inlet }, handle)
    }

    /// Publish a message into the pipeline. Non-blocking: if the pipeline
    /// itself is saturated, the message is dropped.
    pub fn publish(&self, message: MarketMessage) {
        if let Err(err) = self.inlet.try_send(message) {
            log::warn!("pipeline: inlet full or closed, dropping message: {err}");
        }
    }
}

/// The wire shape sent to WebSocket clients.
#[derive(Debug, serde::Serialize)]
#[serde(untagged)]
enum WireMessage {
    Tick {
        symbol: String,
        price: String,
        time: i64,
    },
    Depth(std::sync::Arc<serde_json::Value>),
}

impl From<&MarketMessage> for WireMessage {
    fn from(message: &MarketMessage) -> Self {
        match message {
            MarketMessage::Tick(tick) => Self::Tick {
                symbol: tick.symbol.clone(),
                price: tick.price.to_string(),
                time: tick.time_ms,
            },
            MarketMessage::Depth(value) => Self::Depth(std::sync::Arc::clone(value)),
        }
    }
}
