//! End-to-end order matching scenarios, run against a real Postgres database.
//! Skipped (not failed) when `DATABASE_URL` is not set.

mod support;

use rust_decimal_macros::dec;
use tradecore::matcher::execute::execute_market_order;
use tradecore::matcher::process_tick;
use tradecore::model::{PendingOrder, PendingOrderStatus};
use tradecore::model::pending_order::{ExecutionType, ProductType, Side};
use uuid::Uuid;

#[tokio::test]
async fn limit_buy_fires_and_settles_both_legs() {
    let Some(db) = support::pool().await else { return };

    let symbol = support::seed_instrument(&db, dec!(1)).await;
    let account_id = support::seed_account(&db, dec!(10000)).await;
    let user_id = Uuid::new_v4();

    let order_id = Uuid::new_v4();
    let now = chrono::Utc::now();
    sqlx::query(
        r#"
        INSERT INTO pending_orders (
            id, account_id, user_id, symbol, side, execution_type, quantity,
            limit_price, product_type, status, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, 'buy', 'limit', 0.01, 45000, 'spot', 'pending', $5, $5)
        "#,
    )
    .bind(order_id)
    .bind(account_id)
    .bind(user_id)
    .bind(&symbol)
    .bind(now)
    .execute(&db)
    .await
    .expect("seed pending order");

    // 45100 is a no-op: the buy limit has not been crossed yet.
    process_tick(&db, &symbol, dec!(45100)).await.expect("tick 45100");
    let order: PendingOrder = sqlx::query_as("SELECT * FROM pending_orders WHERE id = $1")
        .bind(order_id)
        .fetch_one(&db)
        .await
        .expect("read order");
    assert_eq!(order.status, PendingOrderStatus::Pending);

    // 45000 fires.
    process_tick(&db, &symbol, dec!(45000)).await.expect("tick 45000");
    let order: PendingOrder = sqlx::query_as("SELECT * FROM pending_orders WHERE id = $1")
        .bind(order_id)
        .fetch_one(&db)
        .await
        .expect("read order");
    assert_eq!(order.status, PendingOrderStatus::Executed);
    assert_eq!(order.executed_price, Some(dec!(45000)));

    let usd = support::usd_balance(&db, account_id).await;
    assert_eq!(usd, dec!(10000) - dec!(450) - dec!(0.45));

    let base = support::balance_of(&db, account_id, "BASE").await;
    assert_eq!(base, dec!(0.01));
}

#[tokio::test]
async fn sell_stop_limit_rejected_at_placement() {
    let result = PendingOrder::validate_trigger(ExecutionType::StopLimit, Side::Sell, Some(dec!(45500)), dec!(45000));
    assert!(result.is_err());
}

#[tokio::test]
async fn market_cfd_order_rejected_on_insufficient_margin() {
    let Some(db) = support::pool().await else { return };

    let symbol = support::seed_instrument(&db, dec!(20)).await;
    let account_id = support::seed_account(&db, dec!(100)).await;
    let user_id = Uuid::new_v4();

    let fill = execute_market_order(
        &db,
        account_id,
        user_id,
        &symbol,
        Side::Buy,
        dec!(1),
        Some(dec!(10)),
        ProductType::Cfd,
        dec!(45000),
    )
    .await
    .expect("execute market order");

    assert!(fill.is_none(), "margin required (4500) exceeds free balance (100)");

    let orders: i64 = sqlx::query_scalar("SELECT count(*) FROM orders WHERE account_id = $1")
        .bind(account_id)
        .fetch_one(&db)
        .await
        .expect("count orders");
    assert_eq!(orders, 0);

    let contracts: i64 = sqlx::query_scalar("SELECT count(*) FROM contracts WHERE account_id = $1")
        .bind(account_id)
        .fetch_one(&db)
        .await
        .expect("count contracts");
    assert_eq!(contracts, 0);

    let usd = support::usd_balance(&db, account_id).await;
    assert_eq!(usd, dec!(100), "a rejected fill must not touch the balance");
}
