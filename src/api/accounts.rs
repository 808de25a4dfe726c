//! `/api/v1/accounts` — list/create accounts.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::extract::AuthUser;
use crate::app::AppState;
use crate::error::ApiError;
use crate::model::{Account, AccountKind, AccountStatus};

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    kind: AccountKind,
    currency: String,
}

/// `POST /api/v1/accounts`.
///
/// # Errors
///
/// Returns [`ApiError::DatabaseError`] on a persistence failure.
pub async fn create(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateAccountRequest>,
) -> Result<Json<Account>, ApiError> {
    let account_number: i64 = sqlx::query_scalar("SELECT nextval('account_number_seq')")
        .fetch_one(&state.db)
        .await?;

    let account = Account {
        id: Uuid::new_v4(),
        account_number,
        user_id: auth.user_id,
        kind: body.kind,
        currency: body.currency,
        status: AccountStatus::Active,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO accounts (id, account_number, user_id, kind, currency, status, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(account.id)
    .bind(account.account_number)
    .bind(account.user_id)
    .bind(account.kind)
    .bind(&account.currency)
    .bind(account.status)
    .bind(account.created_at)
    .execute(&state.db)
    .await?;

    Ok(Json(account))
}

/// `GET /api/v1/accounts`.
///
/// # Errors
///
/// Returns [`ApiError::DatabaseError`] on a persistence failure.
pub async fn list(auth: AuthUser, State(state): State<AppState>) -> Result<Json<Vec<Account>>, ApiError> {
    let accounts: Vec<Account> = sqlx::query_as("SELECT * FROM accounts WHERE user_id = $1 ORDER BY created_at ASC")
        .bind(auth.user_id)
        .fetch_all(&state.db)
        .await?;

    Ok(Json(accounts))
}
