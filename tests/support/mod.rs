//! Shared Postgres fixture helpers for the database-backed integration
//! tests. Every test connects to `DATABASE_URL` and is skipped (not
//! failed) when that variable is unset, so the suite still runs clean in
//! an environment with no database available.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

/// Connect to `DATABASE_URL` and apply the crate's migrations, or return
/// `None` if no database is configured for this run.
pub async fn pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPool::connect(&url).await.expect("connect to DATABASE_URL");
    sqlx::migrate!("./migrations").run(&pool).await.expect("run migrations");
    Some(pool)
}

/// Insert a uniquely-named instrument with permissive bounds, returning
/// its symbol.
pub async fn seed_instrument(db: &PgPool, max_leverage: Decimal) -> String {
    let symbol = format!("T{}", Uuid::new_v4().simple());

    sqlx::query(
        r#"
        INSERT INTO instruments (
            symbol, kind, base_currency, tick_size, step_size, min_quantity,
            max_quantity, min_notional, max_notional, maker_fee_rate,
            taker_fee_rate, contract_size, max_leverage, margin_currency
        )
        VALUES ($1, 'crypto', 'BASE', 0.01, 0.0001, 0.0001, 1000, 1, 100000000, 0.0008, 0.001, 1, $2, 'USD')
        "#,
    )
    .bind(&symbol)
    .bind(max_leverage)
    .execute(db)
    .await
    .expect("seed instrument");

    symbol
}

/// Create an account with a seeded USD balance, returning its id.
pub async fn seed_account(db: &PgPool, usd_balance: Decimal) -> Uuid {
    let account_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();

    sqlx::query("INSERT INTO accounts (id, user_id, kind, currency, status) VALUES ($1, $2, 'live', 'USD', 'active')")
        .bind(account_id)
        .bind(user_id)
        .execute(db)
        .await
        .expect("seed account");

    sqlx::query("INSERT INTO balances (account_id, currency, amount) VALUES ($1, 'USD', $2)")
        .bind(account_id)
        .bind(usd_balance)
        .execute(db)
        .await
        .expect("seed balance");

    account_id
}

/// The account's current USD free balance.
pub async fn usd_balance(db: &PgPool, account_id: Uuid) -> Decimal {
    sqlx::query_scalar("SELECT amount FROM balances WHERE account_id = $1 AND currency = 'USD'")
        .bind(account_id)
        .fetch_one(db)
        .await
        .expect("read balance")
}

/// The account's current balance in `currency`, or zero if no row exists
/// yet (mirrors how a fresh account has no `BASE` balance until its first
/// spot fill).
pub async fn balance_of(db: &PgPool, account_id: Uuid, currency: &str) -> Decimal {
    sqlx::query_scalar("SELECT amount FROM balances WHERE account_id = $1 AND currency = $2")
        .bind(account_id)
        .bind(currency)
        .fetch_optional(db)
        .await
        .expect("read balance")
        .unwrap_or(Decimal::ZERO)
}
