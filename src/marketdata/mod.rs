//! Real-time market data: fan-out hub, broadcast pipeline, last-price
//! cache, and the upstream provider registry that feeds them.

pub mod cache;
pub mod hub;
pub mod pipeline;
pub mod providers;

use std::sync::Arc;

use crate::marketdata::cache::LastPriceCache;
use crate::marketdata::providers::Provider;

/// Owns the registered providers. Each provider is constructed with its own
/// [`crate::marketdata::pipeline::Pipeline`] handle and publishes directly
/// into it; the service's only job is to start and track them, each against
/// its own disjoint symbol set.
#[derive(Debug)]
pub struct MarketDataService {
    cache: Arc<LastPriceCache>,
    providers: Vec<(Arc<dyn Provider>, Vec<String>)>,
}

impl MarketDataService {
    /// Build a service around an already-seeded cache.
    #[must_use]
    pub fn new(cache: Arc<LastPriceCache>) -> Self {
        Self {
            cache,
            providers: Vec::new(),
        }
    }

    /// Register a provider against the symbols it alone owns. Call
    /// [`MarketDataService::start`] once every provider has been added.
    pub fn register(&mut self, provider: Arc<dyn Provider>, symbols: Vec<String>) {
        self.providers.push((provider, symbols));
    }

    /// Shared handle to the last-price cache, for REST handlers.
    #[must_use]
    pub fn cache(&self) -> Arc<LastPriceCache> {
        Arc::clone(&self.cache)
    }

    /// Start every registered provider streaming its own symbol set. Each
    /// runs in its own task and reconnects on its own schedule; one
    /// provider's failure never affects another, and a provider never sees
    /// a symbol it wasn't registered with.
    pub fn start(&self) {
        for (provider, symbols) in &self.providers {
            let provider = Arc::clone(provider);
            let symbols = symbols.clone();
            tokio::spawn(async move {
                if let Err(err) = provider.subscribe(&symbols).await {
                    log::error!("{} provider stopped: {err}", provider.name());
                }
            });
        }
    }
}
