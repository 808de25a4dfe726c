//! Database bootstrap.
//!
//! `pending_orders` and `contracts` rows are the source of truth for order
//! and position state; concurrent writers (the Matcher, the cancel
//! endpoint, TP/SL evaluation) coordinate through `SELECT ... FOR UPDATE`
//! inside a single transaction rather than an in-memory mutex keyed by
//! order id.

use std::time::Duration;

use sqlx::postgres::{PgPoolOptions, PgPool};

use crate::config::Config;

/// Per-transaction deadline for Matcher/Position Manager database work.
pub const TRANSACTION_DEADLINE: Duration = Duration::from_secs(10);

/// Connect a pool sized for the Matcher, the Position Manager, and the API
/// handlers to share.
///
/// # Errors
///
/// Will return `Err` if the pool cannot establish its initial connections.
pub async fn connect(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
}
