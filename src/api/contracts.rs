//! `/api/v1/contracts` — open leveraged positions: list, open (optionally
//! as a hedged pair), close, close-pair, and TP/SL updates.

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
use crate::model::{Contract, ContractStatus, Instrument};
use crate::positions::liquidation;

#[derive(Debug, Deserialize)]
pub struct OpenContractRequest {
    account_id: Uuid,
    symbol: String,
    side: Side,
    quantity: Decimal,
    leverage: Decimal,
    /// If set, also open the opposite side at the same quantity and
    /// leverage, linked by a shared `pair_id`.
    #[serde(default)]
    hedge: bool,
}

/// `GET /api/v1/contracts`: the caller's open positions.
///
/// # Errors
///
/// Returns [`ApiError::DatabaseError`] on a persistence failure.
pub async fn list(auth: AuthUser, State(state): State<AppState>) -> Result<Json<Vec<Contract>>, ApiError> {
    let contracts: Vec<Contract> = sqlx::query_as(
        r#"
        SELECT c.* FROM contracts c
        JOIN accounts a ON a.id = c.account_id
        WHERE a.user_id = $1 AND c.status = $2
        ORDER BY c.opened_at DESC
        "#,
    )
    .bind(auth.user_id)
    .bind(ContractStatus::Open)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(contracts))
}

/// `POST /api/v1/contracts`: open a leveraged position at the current last
/// price, or two opposite-side positions sharing a `pair_id` when `hedge`
/// is set.
///
/// # Errors
///
/// Returns [`ApiError::ValidationError`] if the instrument rejects the
/// quantity/leverage, [`ApiError::InsufficientMargin`] if settlement
/// fails, or [`ApiError::NotFound`] if the account or instrument does not
/// exist.
pub async fn open(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<OpenContractRequest>,
) -> Result<Json<Vec<Contract>>, ApiError> {
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
    if !instrument.accepts_leverage(body.leverage) {
        return Err(ApiError::ValidationError("leverage exceeds instrument maximum".to_owned()));
    }

    let last_price = state
        .cache
        .get(&body.symbol)
        .map(|tick| tick.price)
        .ok_or_else(|| ApiError::ValidationError("no live price for this symbol yet".to_owned()))?;

    let first = execute_market_order(
        &state.db,
        account.id,
        auth.user_id,
        &body.symbol,
        body.side,
        body.quantity,
        Some(body.leverage),
        ProductType::Cfd,
        last_price,
    )
    .await?
    .ok_or(ApiError::InsufficientMargin)?;
    let Some(first_contract) = first.contract else {
        return Err(ApiError::InsufficientMargin);
    };

    if !body.hedge {
        return Ok(Json(vec![first_contract]));
    }

    let second = execute_market_order(
        &state.db,
        account.id,
        auth.user_id,
        &body.symbol,
        body.side.opposite(),
        body.quantity,
        Some(body.leverage),
        ProductType::Cfd,
        last_price,
    )
    .await?;
    let Some(second_contract) = second.and_then(|fill| fill.contract) else {
        // The first leg already opened; undo it rather than leave an
        // unpaired position the caller didn't ask for.
        liquidation::close_contract(&state.db, first_contract.id, last_price, ContractStatus::Closed).await?;
        return Err(ApiError::InsufficientMargin);
    };

    let pair_id = Uuid::new_v4();
    sqlx::query("UPDATE contracts SET pair_id = $1 WHERE id IN ($2, $3)")
        .bind(pair_id)
        .bind(first_contract.id)
        .bind(second_contract.id)
        .execute(&state.db)
        .await?;

    Ok(Json(vec![
        Contract { pair_id: Some(pair_id), ..first_contract },
        Contract { pair_id: Some(pair_id), ..second_contract },
    ]))
}

#[derive(Debug, Deserialize)]
pub struct CloseContractRequest {
    contract_id: Uuid,
}

/// `POST /api/v1/contracts/close`: user-initiated close at the current
/// last price.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] if the contract does not exist, is not
/// open, or does not belong to the caller.
pub async fn close(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CloseContractRequest>,
) -> Result<(), ApiError> {
    let contract = owned_open_contract(&state, body.contract_id, auth.user_id).await?;

    let close_price = state
        .cache
        .get(&contract.symbol)
        .map(|tick| tick.price)
        .unwrap_or(contract.current_price);

    liquidation::close_contract(&state.db, contract.id, close_price, ContractStatus::Closed).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ClosePairRequest {
    first_contract_id: Uuid,
    second_contract_id: Uuid,
}

/// `POST /api/v1/contracts/close-pair`: close both legs of a hedged pair
/// in one transaction.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] if either contract does not exist, is
/// not open, does not belong to the caller, or the two do not share a
/// `pair_id`.
pub async fn close_pair(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<ClosePairRequest>,
) -> Result<(), ApiError> {
    let first = owned_open_contract(&state, body.first_contract_id, auth.user_id).await?;
    let second = owned_open_contract(&state, body.second_contract_id, auth.user_id).await?;

    if first.pair_id.is_none() || first.pair_id != second.pair_id {
        return Err(ApiError::ValidationError("contracts do not share a pair_id".to_owned()));
    }

    let first_price = state.cache.get(&first.symbol).map(|tick| tick.price).unwrap_or(first.current_price);
    let second_price = state.cache.get(&second.symbol).map(|tick| tick.price).unwrap_or(second.current_price);

    let outcome =
        liquidation::close_pair(&state.db, first.id, first_price, second.id, second_price).await?;
    outcome.ok_or_else(|| ApiError::NotFound("contract pair".to_owned()))?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct UpdateTpSlRequest {
    contract_id: Uuid,
    take_profit: Option<Decimal>,
    stop_loss: Option<Decimal>,
}

/// `PATCH /api/v1/contracts/tpsl`: update TP/SL on an open contract the
/// caller owns.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] if the contract does not exist, is not
/// open, or does not belong to the caller.
pub async fn update_tpsl(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<UpdateTpSlRequest>,
) -> Result<Json<Contract>, ApiError> {
    let mut contract = owned_open_contract(&state, body.contract_id, auth.user_id).await?;

    sqlx::query("UPDATE contracts SET take_profit = $1, stop_loss = $2 WHERE id = $3")
        .bind(body.take_profit)
        .bind(body.stop_loss)
        .bind(contract.id)
        .execute(&state.db)
        .await?;

    contract.take_profit = body.take_profit;
    contract.stop_loss = body.stop_loss;
    Ok(Json(contract))
}

async fn owned_open_contract(state: &AppState, contract_id: Uuid, user_id: Uuid) -> Result<Contract, ApiError> {
    let contract: Option<Contract> = sqlx::query_as(
        r#"
        SELECT c.* FROM contracts c
        JOIN accounts a ON a.id = c.account_id
        WHERE c.id = $1 AND a.user_id = $2 AND c.status = $3
        "#,
    )
    .bind(contract_id)
    .bind(user_id)
    .bind(ContractStatus::Open)
    .fetch_optional(&state.db)
    .await?;

    contract.ok_or_else(|| ApiError::NotFound("contract".to_owned()))
}
