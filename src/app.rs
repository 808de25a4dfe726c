//! Wires a [`Config`] into a running graph: database pool, session store,
//! market data service/providers, broadcast pipeline, hub, matcher,
//! position manager, and finally the `axum` [`Router`] that exposes it
//! all.

use std::sync::Arc;

use axum::Router;
use rust_decimal_macros::dec;

use crate::auth::ratelimit::RateLimiter;
use crate::config::{Config, Environment};
use crate::marketdata::cache::{LastPriceCache, PriceSeed};
use crate::marketdata::hub::Hub;
use crate::marketdata::pipeline::Pipeline;
use crate::marketdata::providers::crypto::CryptoProvider;
use crate::marketdata::providers::forex::ForexProvider;
use crate::marketdata::MarketDataService;
use crate::matcher::PendingOrderMatcher;
use crate::positions::PositionManager;
use crate::session::{MemoryStore, RedisStore, SessionStore};
use crate::shutdown::Shutdown;
use crate::supervisor::Supervisor;

/// Shared state handed to every `axum` handler.
#[derive(Clone)]
pub struct AppState {
    /// Database pool.
    pub db: crate::prelude::Db,
    /// Session authentication backend.
    pub sessions: Arc<dyn SessionStore>,
    /// Market data fan-out hub, also used to target per-user events.
    pub hub: Hub,
    /// Producer-facing handle into the broadcast pipeline.
    pub pipeline: Pipeline,
    /// Last-price cache for REST snapshot endpoints.
    pub cache: Arc<LastPriceCache>,
    /// Credential signing key.
    pub jwt_secret: Arc<str>,
    /// Credential/session lifetime.
    pub jwt_expiry: std::time::Duration,
    /// Per-identity rate limiter.
    pub rate_limiter: Arc<RateLimiter>,
    /// How long a `/ws` writer may block on a single send.
    pub ws_write_deadline: std::time::Duration,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

/// Instruments seeded into the last-price cache at startup;
/// a fuller deployment would load this from the `instruments` table.
fn seed_prices() -> Vec<PriceSeed> {
    vec![
        PriceSeed {
            symbol: "BTCUSDT".to_owned(),
            price: dec!(45000),
        },
        PriceSeed {
            symbol: "ETHUSDT".to_owned(),
            price: dec!(2500),
        },
        PriceSeed {
            symbol: "EURUSD".to_owned(),
            price: dec!(1.08),
        },
    ]
}

/// Build the full application graph and return the `axum` [`Router`]
/// alongside the [`Supervisor`] that owns the background tasks' shutdown
/// signal and join handles.
///
/// # Errors
///
/// Returns `Err` if the database pool or session store backend cannot be
/// established.
pub async fn build(config: &Config) -> anyhow::Result<(Router, Supervisor)> {
    let db = crate::db::connect(config).await?;

    let sessions: Arc<dyn SessionStore> = match RedisStore::connect(&config.redis_addr, config.redis_password.as_deref()).await {
        Ok(store) => Arc::new(store),
        Err(err) => {
            log::warn!("redis unavailable ({err}); falling back to degraded in-memory session store");
            Arc::new(MemoryStore::new())
        }
    };

    let cache = Arc::new(LastPriceCache::seeded(seed_prices()));
    let mut supervisor = Supervisor::new(Shutdown::new());

    let (hub, hub_handle) = Hub::spawn(supervisor.signal());
    supervisor.track(hub_handle);

    let (_matcher, matcher_inlet, matcher_handle) =
        PendingOrderMatcher::spawn(db.clone(), supervisor.signal());
    supervisor.track(matcher_handle);

    let (_positions, positions_inlet, positions_handle) = PositionManager::spawn(
        db.clone(),
        hub.clone(),
        config.liquidation_threshold,
        supervisor.signal(),
    );
    supervisor.track(positions_handle);

    let (pipeline, pipeline_handle) = Pipeline::spawn(
        hub.clone(),
        vec![matcher_inlet, positions_inlet],
        Arc::clone(&cache),
        supervisor.signal(),
    );
    supervisor.track(pipeline_handle);

    let mut market_data = MarketDataService::new(Arc::clone(&cache));
    if let Ok(endpoint) = url::Url::parse("wss://stream.example-exchange.invalid/v2/market") {
        market_data.register(
            Arc::new(CryptoProvider::new(endpoint, pipeline.clone())),
            vec!["BTCUSDT".to_owned(), "ETHUSDT".to_owned()],
        );
    }
    if let Ok(forex) = ForexProvider::new(&config.redis_addr, pipeline.clone()) {
        market_data.register(Arc::new(forex), vec!["EURUSD".to_owned()]);
    }
    market_data.start();

    let state = AppState {
        db,
        sessions,
        hub,
        pipeline,
        cache,
        jwt_secret: Arc::from(config.jwt_secret.as_str()),
        jwt_expiry: config.jwt_expiry,
        rate_limiter: Arc::new(RateLimiter::new()),
        ws_write_deadline: config.ws_write_deadline,
    };

    if config.environment == Environment::Production {
        log::info!("starting in production mode");
    }

    Ok((crate::api::router(state), supervisor))
}
