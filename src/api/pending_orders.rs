//! `/api/v1/pending-orders` — place/list/cancel limit and stop-limit
//! orders.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::extract::AuthUser;
use crate::api::owned_account;
use crate::app::AppState;
use crate::error::ApiError;
use crate::model::{ExecutionType, Instrument, PendingOrder, PendingOrderStatus, ProductType, Side};

#[derive(Debug, Deserialize)]
pub struct PlacePendingOrderRequest {
    account_id: Uuid,
    symbol: String,
    side: Side,
    execution_type: ExecutionType,
    quantity: Decimal,
    trigger_price: Option<Decimal>,
    limit_price: Option<Decimal>,
    leverage: Option<Decimal>,
    product_type: ProductType,
}

/// `POST /api/v1/pending-orders`.
///
/// # Errors
///
/// Returns [`ApiError::ValidationError`] if the order violates instrument
/// constraints or the stop-limit placement rule, or
/// [`ApiError::NotFound`] if the account or instrument does not exist.
pub async fn place(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<PlacePendingOrderRequest>,
) -> Result<Json<PendingOrder>, ApiError> {
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
    if let Some(price) = body.limit_price {
        if !instrument.accepts_price(price) {
            return Err(ApiError::ValidationError("limit_price not on the tick grid".to_owned()));
        }
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
        .unwrap_or(body.trigger_price.or(body.limit_price).unwrap_or(Decimal::ZERO));

    PendingOrder::validate_trigger(body.execution_type, body.side, body.trigger_price, last_price)
        .map_err(|msg| ApiError::ValidationError(msg.to_owned()))?;

    let reference_price = body.limit_price.or(body.trigger_price).unwrap_or(last_price);
    if !instrument.accepts_notional(body.quantity * reference_price) {
        return Err(ApiError::ValidationError("notional outside instrument bounds".to_owned()));
    }

    let order_number: i64 = sqlx::query_scalar("SELECT nextval('order_number_seq')")
        .fetch_one(&state.db)
        .await?;
    let now = Utc::now();

    let order = PendingOrder {
        id: Uuid::new_v4(),
        order_number,
        account_id: account.id,
        user_id: auth.user_id,
        symbol: body.symbol,
        side: body.side,
        execution_type: body.execution_type,
        quantity: body.quantity,
        trigger_price: body.trigger_price,
        limit_price: body.limit_price,
        leverage: body.leverage,
        product_type: body.product_type,
        status: PendingOrderStatus::Pending,
        created_at: now,
        updated_at: now,
        executed_price: None,
        executed_at: None,
        reason: None,
    };

    sqlx::query(
        r#"
        INSERT INTO pending_orders (
            id, order_number, account_id, user_id, symbol, side, execution_type,
            quantity, trigger_price, limit_price, leverage, product_type, status,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
        "#,
    )
    .bind(order.id)
    .bind(order.order_number)
    .bind(order.account_id)
    .bind(order.user_id)
    .bind(&order.symbol)
    .bind(order.side)
    .bind(order.execution_type)
    .bind(order.quantity)
    .bind(order.trigger_price)
    .bind(order.limit_price)
    .bind(order.leverage)
    .bind(order.product_type)
    .bind(order.status)
    .bind(order.created_at)
    .execute(&state.db)
    .await?;

    Ok(Json(order))
}

/// `GET /api/v1/pending-orders`.
///
/// # Errors
///
/// Returns [`ApiError::DatabaseError`] on a persistence failure.
pub async fn list(auth: AuthUser, State(state): State<AppState>) -> Result<Json<Vec<PendingOrder>>, ApiError> {
    let orders: Vec<PendingOrder> =
        sqlx::query_as("SELECT * FROM pending_orders WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(auth.user_id)
            .fetch_all(&state.db)
            .await?;

    Ok(Json(orders))
}

#[derive(Debug, Deserialize)]
pub struct CancelPendingOrderRequest {
    pending_order_id: Uuid,
}

/// `DELETE /api/v1/pending-orders/cancel`.
///
/// # Errors
///
/// Returns [`ApiError::Conflict`] if the order is no longer pending, or
/// [`ApiError::Forbidden`] if it belongs to another user.
pub async fn cancel(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CancelPendingOrderRequest>,
) -> Result<(), ApiError> {
    let mut tx = state.db.begin().await?;

    let order: Option<PendingOrder> =
        sqlx::query_as("SELECT * FROM pending_orders WHERE id = $1 FOR UPDATE")
            .bind(body.pending_order_id)
            .fetch_optional(&mut *tx)
            .await?;

    let Some(order) = order else {
        return Err(ApiError::NotFound("pending order".to_owned()));
    };
    if order.user_id != auth.user_id {
        return Err(ApiError::Forbidden);
    }
    if order.status != PendingOrderStatus::Pending {
        return Err(ApiError::Conflict("pending order is no longer pending".to_owned()));
    }

    sqlx::query("UPDATE pending_orders SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(PendingOrderStatus::Cancelled)
        .bind(Utc::now())
        .bind(order.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}
