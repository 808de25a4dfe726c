//! `/api/v1/ticker` and `/api/v1/klines` — unauthenticated snapshots of
//! market state.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app::AppState;
use crate::error::ApiError;
use crate::prelude::Money;

#[derive(Debug, Serialize)]
pub struct TickerEntry {
    symbol: String,
    price: Money,
    time_ms: i64,
}

/// `GET /api/v1/ticker`: the last known price per symbol. Full
/// 24h rolling stats are out of scope; this is the
/// last-price snapshot the cache actually keeps.
pub async fn ticker(State(state): State<AppState>) -> Json<Vec<TickerEntry>> {
    let entries = state
        .cache
        .snapshot()
        .into_iter()
        .map(|tick| TickerEntry {
            symbol: tick.symbol,
            price: tick.price,
            time_ms: tick.time_ms,
        })
        .collect();
    Json(entries)
}

/// `GET /api/v1/klines`: historical candles are an external collaborator
/// this crate does not implement; it always reports the
/// upstream as unavailable rather than fabricating data.
///
/// # Errors
///
/// Always returns [`ApiError::UpstreamError`].
pub async fn klines() -> Result<(), ApiError> {
    Err(ApiError::UpstreamError)
}
