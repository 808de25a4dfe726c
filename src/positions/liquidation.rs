//! Liquidation and user-initiated close mechanics.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::matcher::execute::append_audit;
use crate::model::{Contract, ContractStatus, TransactionKind};

/// Outcome of closing one contract, used to drive the WebSocket event and
/// logging at the call site.
#[derive(Debug, Clone, Copy)]
pub struct CloseOutcome {
    /// The contract's id.
    pub contract_id: Uuid,
    /// Owning user, for the targeted WebSocket event.
    pub user_id: Uuid,
    /// Realized P&L at close (may be negative).
    pub realized_pnl: Decimal,
    /// Unrecovered loss beyond the released margin, clamped so the
    /// account balance never goes negative. Zero for a
    /// user-initiated close.
    pub shortfall: Decimal,
}

/// Close one contract — liquidation or user-initiated, the only
/// difference being `status` and whether a shortfall is expected — inside
/// its own transaction.
///
/// # Errors
///
/// Returns `Err` on a database failure. The caller (the liquidation sweep
/// or the REST close handler) is responsible for logging and, for a
/// sweep, continuing to the next contract rather than aborting.
pub async fn close_contract(
    db: &PgPool,
    contract_id: Uuid,
    close_price: Decimal,
    status: ContractStatus,
) -> Result<Option<CloseOutcome>, sqlx::Error> {
    let mut tx = db.begin().await?;

    let outcome = close_contract_in_tx(&mut tx, contract_id, close_price, status).await?;

    tx.commit().await?;
    Ok(outcome)
}

/// Close two contracts sharing a `pair_id` in a single transaction. Either
/// both legs close or neither does.
///
/// # Errors
///
/// Returns `Err` on a database failure.
pub async fn close_pair(
    db: &PgPool,
    first_id: Uuid,
    first_close_price: Decimal,
    second_id: Uuid,
    second_close_price: Decimal,
) -> Result<Option<(CloseOutcome, CloseOutcome)>, sqlx::Error> {
    let mut tx = db.begin().await?;

    let first = close_contract_in_tx(&mut tx, first_id, first_close_price, ContractStatus::Closed).await?;
    let second = close_contract_in_tx(&mut tx, second_id, second_close_price, ContractStatus::Closed).await?;

    let (Some(first), Some(second)) = (first, second) else {
        tx.rollback().await?;
        return Ok(None);
    };

    tx.commit().await?;
    Ok(Some((first, second)))
}

async fn close_contract_in_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    contract_id: Uuid,
    close_price: Decimal,
    status: ContractStatus,
) -> Result<Option<CloseOutcome>, sqlx::Error> {
    let contract: Option<Contract> =
        sqlx::query_as("SELECT * FROM contracts WHERE id = $1 AND status = $2 FOR UPDATE")
            .bind(contract_id)
            .bind(ContractStatus::Open)
            .fetch_optional(&mut **tx)
            .await?;

    let Some(contract) = contract else {
        return Ok(None);
    };

    let realized_pnl = contract.compute_unrealized_pnl(close_price);
    let closed_at = Utc::now();

    sqlx::query(
        r#"
        UPDATE contracts
        SET status = $1, close_price = $2, closed_at = $3, current_price = $2, unrealized_pnl = $4
        WHERE id = $5
        "#,
    )
    .bind(status)
    .bind(close_price)
    .bind(closed_at)
    .bind(realized_pnl)
    .bind(contract.id)
    .execute(&mut **tx)
    .await?;

    // Return margin, then apply realized P&L; a loss beyond the released
    // margin is clamped so the balance never goes negative, with the
    // residual recorded as a shortfall.
    let current: Option<Decimal> = sqlx::query_scalar(
        "SELECT amount FROM balances WHERE account_id = $1 AND currency = 'USD' FOR UPDATE",
    )
    .bind(contract.account_id)
    .fetch_optional(&mut **tx)
    .await?;
    let current = current.unwrap_or(Decimal::ZERO);

    let released = current + contract.margin;
    let settled = released + realized_pnl;
    let (final_balance, shortfall) = if settled < Decimal::ZERO {
        (Decimal::ZERO, -settled)
    } else {
        (settled, Decimal::ZERO)
    };

    sqlx::query(
        r#"
        INSERT INTO balances (account_id, currency, amount)
        VALUES ($1, 'USD', $2)
        ON CONFLICT (account_id, currency) DO UPDATE SET amount = $2
        "#,
    )
    .bind(contract.account_id)
    .bind(final_balance)
    .execute(&mut **tx)
    .await?;

    let transaction_number: i64 = sqlx::query_scalar("SELECT nextval('transaction_number_seq')")
        .fetch_one(&mut **tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO transactions (id, transaction_number, account_id, kind, currency, amount, reference_id, created_at)
        VALUES ($1, $2, $3, $4, 'USD', $5, $6, $7)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(transaction_number)
    .bind(contract.account_id)
    .bind(TransactionKind::PositionClose)
    .bind(realized_pnl)
    .bind(contract.id)
    .bind(closed_at)
    .execute(&mut **tx)
    .await?;

    if shortfall > Decimal::ZERO {
        let shortfall_number: i64 = sqlx::query_scalar("SELECT nextval('transaction_number_seq')")
            .fetch_one(&mut **tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO transactions (id, transaction_number, account_id, kind, currency, amount, reference_id, created_at)
            VALUES ($1, $2, $3, $4, 'USD', $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(shortfall_number)
        .bind(contract.account_id)
        .bind(TransactionKind::LiquidationShortfall)
        .bind(Decimal::ZERO)
        .bind(contract.id)
        .bind(closed_at)
        .execute(&mut **tx)
        .await?;
    }

    let user_id: Option<Uuid> = sqlx::query_scalar("SELECT user_id FROM accounts WHERE id = $1")
        .bind(contract.account_id)
        .fetch_optional(&mut **tx)
        .await?;

    let action = if status == ContractStatus::Liquidated {
        "contract.liquidated"
    } else {
        "contract.closed"
    };
    append_audit(
        tx,
        user_id,
        action,
        "contract",
        contract.id,
        serde_json::json!({
            "close_price": close_price.to_string(),
            "realized_pnl": realized_pnl.to_string(),
            "shortfall": shortfall.to_string(),
        }),
    )
    .await?;

    Ok(user_id.map(|user_id| CloseOutcome {
        contract_id: contract.id,
        user_id,
        realized_pnl,
        shortfall,
    }))
}

/// Order open contracts largest-loss-first for liquidation selection.
#[must_use]
pub fn order_by_largest_loss(mut contracts: Vec<Contract>) -> Vec<Contract> {
    contracts.sort_by(|a, b| a.unrealized_pnl.cmp(&b.unrealized_pnl));
    contracts
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::model::PositionSide;

    fn contract(unrealized_pnl: Decimal) -> Contract {
        Contract {
            id: Uuid::new_v4(),
            contract_number: 1,
            account_id: Uuid::nil(),
            symbol: "BTCUSDT".to_owned(),
            side: PositionSide::Buy,
            quantity: dec!(1),
            entry_price: dec!(45000),
            current_price: dec!(45000),
            leverage: dec!(10),
            margin: dec!(4500),
            unrealized_pnl,
            take_profit: None,
            stop_loss: None,
            pair_id: None,
            status: ContractStatus::Open,
            opened_at: Utc::now(),
            closed_at: None,
            close_price: None,
        }
    }

    #[test]
    fn largest_loss_sorts_first() {
        let contracts = vec![contract(dec!(-10)), contract(dec!(50)), contract(dec!(-500))];
        let ordered = order_by_largest_loss(contracts);
        assert_eq!(ordered[0].unrealized_pnl, dec!(-500));
        assert_eq!(ordered[1].unrealized_pnl, dec!(-10));
        assert_eq!(ordered[2].unrealized_pnl, dec!(50));
    }
}
