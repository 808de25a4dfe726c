//! HTTP surface: routes every endpoint onto its handler and
//! assembles the shared [`crate::app::AppState`] into an `axum` [`Router`].

pub mod accounts;
pub mod auth;
pub mod contracts;
pub mod extract;
pub mod market;
pub mod orders;
pub mod pending_orders;
pub mod ws;

use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::model::Account;

/// Build the full `axum` router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws::upgrade))
        .route("/api/v1/ticker", get(market::ticker))
        .route("/api/v1/klines", get(market::klines))
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/logout", post(auth::logout))
        .route("/api/v1/auth/logout-all", post(auth::logout_all))
        .route("/api/v1/accounts", get(accounts::list).post(accounts::create))
        .route("/api/v1/orders", get(orders::list).post(orders::place))
        .route(
            "/api/v1/pending-orders",
            get(pending_orders::list).post(pending_orders::place),
        )
        .route("/api/v1/pending-orders/cancel", delete(pending_orders::cancel))
        .route("/api/v1/contracts", get(contracts::list).post(contracts::open))
        .route("/api/v1/contracts/close", post(contracts::close))
        .route("/api/v1/contracts/close-pair", post(contracts::close_pair))
        .route("/api/v1/contracts/tpsl", patch(contracts::update_tpsl))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Load an account and verify it belongs to `user_id`, the ownership check every per-account handler needs
/// before touching balances, orders, or contracts.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] if the account does not exist, or
/// [`ApiError::Forbidden`] if it belongs to another user.
pub async fn owned_account(db: &crate::prelude::Db, account_id: Uuid, user_id: Uuid) -> Result<Account, ApiError> {
    let account: Option<Account> = sqlx::query_as("SELECT * FROM accounts WHERE id = $1")
        .bind(account_id)
        .fetch_optional(db)
        .await?;

    let account = account.ok_or_else(|| ApiError::NotFound("account".to_owned()))?;
    if account.user_id != user_id {
        return Err(ApiError::Forbidden);
    }

    Ok(account)
}
