//! `/api/v1/orders` — immediate market execution and fill history. Unlike
//! [`crate::api::pending_orders`], a market order fills at the current
//! last price instead of waiting on a trigger.

use axum::extract::State;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::extract::AuthUser;
use crate::api::owned_account;
use crate::app::AppState;
use crate::error::ApiError;
use crate::matcher::execute::execute_market_order;
use crate::model::pending_order::{ProductType, Side};
use crate::model::{Instrument, Order};

#[derive(Debug, Deserialize)]
pub struct PlaceMarketOrderRequest {
    account_id: Uuid,
    symbol: String,
    side: Side,
    quantity: Decimal,
    leverage: Option<Decimal>,
    product_type: ProductType,
}

/// `POST /api/v1/orders`: fills immediately at the cached last price.
///
/// # Errors
///
/// Returns [`ApiError::ValidationError`] if the instrument's quantity/
/// leverage bounds are violated, [`ApiError::InsufficientFunds`] /
/// [`ApiError::InsufficientMargin`] if settlement fails, or
/// [`ApiError::NotFound`] if the account or instrument does not exist.
pub async fn place(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<PlaceMarketOrderRequest>,
) -> Result<Json<Order>, ApiError> {
    let account = owned_account(&state.db, body.account_id, auth.user_id).await?;
    if !account.accepts_new_orders() {
        return Err(ApiError::Conflict("account does not accept new orders".to_owned()));
    }

    let instrument: Option<Instrument> = sqlx::query_as("SELECT * FROM instruments WHERE symbol = $1")
        .bind(&body.symbol)
        .fetch_optional(&state.db)
        .await?;
    let instrument = instrument.ok_or_else(|| ApiError::NotFound(format!("instrument {}", body.symbol)))?;

    if !instrument.accepts_quantity(body.quantity) {
        return Err(ApiError::ValidationError("quantity outside instrument bounds".to_owned()));
    }
    if body.product_type == ProductType::Cfd {
        let leverage = body.leverage.unwrap_or(Decimal::ONE);
        if !instrument.accepts_leverage(leverage) {
            return Err(ApiError::ValidationError("leverage exceeds instrument maximum".to_owned()));
        }
    }

    let last_price = state
        .cache
        .get(&body.symbol)
        .map(|tick| tick.price)
        .ok_or_else(|| ApiError::ValidationError("no live price for this symbol yet".to_owned()))?;

    if !instrument.accepts_notional(body.quantity * last_price) {
        return Err(ApiError::ValidationError("notional outside instrument bounds".to_owned()));
    }

    let fill = execute_market_order(
        &state.db,
        account.id,
        auth.user_id,
        &body.symbol,
        body.side,
        body.quantity,
        body.leverage,
        body.product_type,
        last_price,
    )
    .await?;

    let Some(fill) = fill else {
        return Err(match body.product_type {
            ProductType::Spot => ApiError::InsufficientFunds,
            ProductType::Cfd => ApiError::InsufficientMargin,
        });
    };

    Ok(Json(fill.order))
}

/// `GET /api/v1/orders`: the caller's fill history.
///
/// # Errors
///
/// Returns [`ApiError::DatabaseError`] on a persistence failure.
pub async fn list(auth: AuthUser, State(state): State<AppState>) -> Result<Json<Vec<Order>>, ApiError> {
    let orders: Vec<Order> = sqlx::query_as(
        r#"
        SELECT o.* FROM orders o
        JOIN accounts a ON a.id = o.account_id
        WHERE a.user_id = $1
        ORDER BY o.executed_at DESC
        "#,
    )
    .bind(auth.user_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(orders))
}
