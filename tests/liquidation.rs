//! A leveraged contract is liquidated once its margin level crosses the
//! configured floor. Skipped (not failed) when `DATABASE_URL` is not set.

mod support;

use rust_decimal_macros::dec;
use tradecore::marketdata::hub::Hub;
use tradecore::model::{Contract, ContractStatus};
use tradecore::positions::process_tick;
use tradecore::shutdown::Shutdown;
use uuid::Uuid;

#[tokio::test]
async fn contract_liquidates_once_margin_level_crosses_the_floor() {
    let Some(db) = support::pool().await else { return };
    let (hub, _handle) = Hub::spawn(Shutdown::new().signal());

    let symbol = support::seed_instrument(&db, dec!(100)).await;
    let account_id = support::seed_account(&db, dec!(1000)).await;

    let contract_id = Uuid::new_v4();
    let opened_at = chrono::Utc::now();
    sqlx::query(
        r#"
        INSERT INTO contracts (
            id, account_id, symbol, side, quantity, entry_price,
            current_price, leverage, margin, unrealized_pnl, status, opened_at
        )
        VALUES ($1, $2, $3, 'buy', 1, 45000, 45000, 100, 450, 0, 'open', $4)
        "#,
    )
    .bind(contract_id)
    .bind(account_id)
    .bind(&symbol)
    .bind(opened_at)
    .execute(&db)
    .await
    .expect("seed contract");

    // unrealized_pnl = -500, equity = 500, margin level ~111% -> safe.
    process_tick(&db, &hub, &symbol, dec!(44500), dec!(50)).await.expect("tick 44500");
    let contract: Contract = sqlx::query_as("SELECT * FROM contracts WHERE id = $1")
        .bind(contract_id)
        .fetch_one(&db)
        .await
        .expect("read contract");
    assert_eq!(contract.status, ContractStatus::Open);
    assert_eq!(contract.unrealized_pnl, dec!(-500));

    // unrealized_pnl = -1000, equity = 0, margin level = 0 -> liquidated.
    process_tick(&db, &hub, &symbol, dec!(44000), dec!(50)).await.expect("tick 44000");
    let contract: Contract = sqlx::query_as("SELECT * FROM contracts WHERE id = $1")
        .bind(contract_id)
        .fetch_one(&db)
        .await
        .expect("read contract");
    assert_eq!(contract.status, ContractStatus::Liquidated);
    assert!(contract.closed_at.is_some());

    let usd = support::usd_balance(&db, account_id).await;
    assert_eq!(usd, dec!(0), "balance is clamped to zero, never negative");

    let position_close: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM transactions WHERE account_id = $1 AND kind = 'position_close'",
    )
    .bind(account_id)
    .fetch_one(&db)
    .await
    .expect("count position_close transactions");
    assert_eq!(position_close, 1);
}
