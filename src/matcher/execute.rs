//! Step-by-step execution protocol for a single pending order, run as one database transaction.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::model::audit::AuditLogEntry;
use crate::model::order::ExecutionStrategy;
use crate::model::pending_order::{ExecutionType, ProductType, Side};
use crate::model::{Contract, ContractStatus, Instrument, Order, PendingOrder, PendingOrderStatus};

/// Execute one pending order end to end, or fail it, inside a single
/// transaction.
///
/// # Errors
///
/// Returns `Err` for a database error. A business failure (insufficient
/// balance/margin) is not an `Err` here — it is recorded as the order's
/// `failed` status and the transaction still commits.
pub async fn execute_pending_order(
    db: &PgPool,
    pending_order_id: Uuid,
    fill_price: Decimal,
    last_price: Decimal,
) -> Result<(), sqlx::Error> {
    let mut tx = db.begin().await?;

    // Step 1: re-read with row-level locking; abort if already consumed.
    let order: Option<PendingOrder> = sqlx::query_as(
        "SELECT * FROM pending_orders WHERE id = $1 AND status = $2 FOR UPDATE",
    )
    .bind(pending_order_id)
    .bind(PendingOrderStatus::Pending)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(order) = order else {
        tx.rollback().await?;
        return Ok(());
    };

    let instrument: Option<Instrument> = sqlx::query_as("SELECT * FROM instruments WHERE symbol = $1")
        .bind(&order.symbol)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(instrument) = instrument else {
        fail_order(&mut tx, &order, "instrument no longer configured").await?;
        tx.commit().await?;
        return Ok(());
    };

    // Step 2-3: fill price, notional, fee.
    let fill_price = match order.execution_type {
        ExecutionType::Limit => order.limit_price.unwrap_or(fill_price),
        ExecutionType::StopLimit => order.limit_price.unwrap_or(last_price),
    };
    let notional = order.quantity * fill_price;
    let fee = notional * instrument.taker_fee_rate;

    // Step 4: debit the account.
    let settlement = match order.product_type {
        ProductType::Spot => {
            settle_spot(
                &mut tx,
                order.account_id,
                order.side,
                &instrument.base_currency,
                order.quantity,
                notional,
                fee,
            )
            .await?
        }
        ProductType::Cfd => {
            settle_cfd(&mut tx, order.account_id, order.quantity, order.leverage, fill_price).await?
        }
    };

    let Some(margin) = settlement else {
        let reason = match order.product_type {
            ProductType::Spot => "insufficient balance",
            ProductType::Cfd => "insufficient margin",
        };
        fail_order(&mut tx, &order, reason).await?;
        tx.commit().await?;
        return Ok(());
    };

    // Step 5: insert the filled order.
    let order_id = Uuid::new_v4();
    let order_number: i64 = sqlx::query_scalar("SELECT nextval('order_number_seq')")
        .fetch_one(&mut *tx)
        .await?;
    let executed_at = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, order_number, pending_order_id, account_id, symbol, side,
            execution_type, quantity, fill_price, notional, fee, leverage,
            product_type, execution_strategy, executed_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        "#,
    )
    .bind(order_id)
    .bind(order_number)
    .bind(order.id)
    .bind(order.account_id)
    .bind(&order.symbol)
    .bind(order.side)
    .bind(order.execution_type)
    .bind(order.quantity)
    .bind(fill_price)
    .bind(notional)
    .bind(fee)
    .bind(order.leverage)
    .bind(order.product_type)
    .bind(ExecutionStrategy::BBook)
    .bind(executed_at)
    .execute(&mut *tx)
    .await?;

    // Step 6: cfd orders also open a contract.
    if order.product_type == ProductType::Cfd {
        let contract_id = Uuid::new_v4();
        let contract_number: i64 = sqlx::query_scalar("SELECT nextval('contract_number_seq')")
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO contracts (
                id, contract_number, account_id, symbol, side, quantity,
                entry_price, current_price, leverage, margin, unrealized_pnl,
                take_profit, stop_loss, pair_id, status, opened_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $8, $9, 0, NULL, NULL, NULL, $10, $11)
            "#,
        )
        .bind(contract_id)
        .bind(contract_number)
        .bind(order.account_id)
        .bind(&order.symbol)
        .bind(order.side)
        .bind(order.quantity)
        .bind(fill_price)
        .bind(order.leverage.unwrap_or(Decimal::ONE))
        .bind(margin)
        .bind(ContractStatus::Open)
        .bind(executed_at)
        .execute(&mut *tx)
        .await?;
    }

    // Step 7: mark the pending order executed.
    sqlx::query(
        r#"
        UPDATE pending_orders
        SET status = $1, executed_at = $2, executed_price = $3, updated_at = $2
        WHERE id = $4
        "#,
    )
    .bind(PendingOrderStatus::Executed)
    .bind(executed_at)
    .bind(fill_price)
    .bind(order.id)
    .execute(&mut *tx)
    .await?;

    // Step 8: audit log.
    append_audit(
        &mut tx,
        Some(order.user_id),
        "pending_order.executed",
        "pending_order",
        order.id,
        serde_json::json!({ "fill_price": fill_price.to_string(), "order_id": order_id }),
    )
    .await?;

    // Step 9: commit.
    tx.commit().await?;

    Ok(())
}

/// Settle a spot fill: subtract `(notional + fee)` from the USD balance and
/// credit `quantity` of `base_currency` on a buy (the reverse on a sell).
/// Returns `Some(Decimal::ZERO)` on success (spot orders lock no margin) or
/// `None` if either leg's balance is insufficient. Shared by the matcher's
/// pending-order execution and by immediate market-order placement.
pub(crate) async fn settle_spot(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    account_id: Uuid,
    side: Side,
    base_currency: &str,
    quantity: Decimal,
    notional: Decimal,
    fee: Decimal,
) -> Result<Option<Decimal>, sqlx::Error> {
    let cost = notional + fee;
    let usd_signed = match side {
        Side::Buy => -cost,
        Side::Sell => cost,
    };
    let base_signed = match side {
        Side::Buy => quantity,
        Side::Sell => -quantity,
    };

    let usd_balance: Option<Decimal> = sqlx::query_scalar(
        "SELECT amount FROM balances WHERE account_id = $1 AND currency = 'USD' FOR UPDATE",
    )
    .bind(account_id)
    .fetch_optional(&mut **tx)
    .await?;
    let current_usd = usd_balance.unwrap_or(Decimal::ZERO);
    if side == Side::Buy && current_usd + usd_signed < Decimal::ZERO {
        return Ok(None);
    }

    let base_balance: Option<Decimal> = sqlx::query_scalar(
        "SELECT amount FROM balances WHERE account_id = $1 AND currency = $2 FOR UPDATE",
    )
    .bind(account_id)
    .bind(base_currency)
    .fetch_optional(&mut **tx)
    .await?;
    let current_base = base_balance.unwrap_or(Decimal::ZERO);
    if side == Side::Sell && current_base + base_signed < Decimal::ZERO {
        return Ok(None);
    }

    sqlx::query(
        r#"
        INSERT INTO balances (account_id, currency, amount)
        VALUES ($1, 'USD', $2)
        ON CONFLICT (account_id, currency)
        DO UPDATE SET amount = balances.amount + $2
        "#,
    )
    .bind(account_id)
    .bind(usd_signed)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO balances (account_id, currency, amount)
        VALUES ($1, $2, $3)
        ON CONFLICT (account_id, currency)
        DO UPDATE SET amount = balances.amount + $3
        "#,
    )
    .bind(account_id)
    .bind(base_currency)
    .bind(base_signed)
    .execute(&mut **tx)
    .await?;

    Ok(Some(Decimal::ZERO))
}

/// Settle a cfd fill: compute the required margin and move it from free
/// balance to used margin (represented implicitly by the contract row's
/// `margin` field). Returns the margin locked on success, or `None` if
/// free balance can't cover it. Shared the same way as [`settle_spot`].
pub(crate) async fn settle_cfd(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    account_id: Uuid,
    quantity: Decimal,
    leverage: Option<Decimal>,
    fill_price: Decimal,
) -> Result<Option<Decimal>, sqlx::Error> {
    let leverage = leverage.unwrap_or(Decimal::ONE);
    let margin = Contract::required_margin(quantity, fill_price, leverage);

    let balance: Option<Decimal> = sqlx::query_scalar(
        "SELECT amount FROM balances WHERE account_id = $1 AND currency = 'USD' FOR UPDATE",
    )
    .bind(account_id)
    .fetch_optional(&mut **tx)
    .await?;

    let free = balance.unwrap_or(Decimal::ZERO);
    if free < margin {
        return Ok(None);
    }

    sqlx::query(
        r#"
        UPDATE balances SET amount = amount - $1
        WHERE account_id = $2 AND currency = 'USD'
        "#,
    )
    .bind(margin)
    .bind(account_id)
    .execute(&mut **tx)
    .await?;

    Ok(Some(margin))
}

async fn fail_order(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order: &PendingOrder,
    reason: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE pending_orders
        SET status = $1, reason = $2, updated_at = $3
        WHERE id = $4
        "#,
    )
    .bind(PendingOrderStatus::Failed)
    .bind(reason)
    .bind(Utc::now())
    .bind(order.id)
    .execute(&mut **tx)
    .await?;

    append_audit(
        tx,
        Some(order.user_id),
        "pending_order.failed",
        "pending_order",
        order.id,
        serde_json::json!({ "reason": reason }),
    )
    .await?;

    Ok(())
}

pub(crate) async fn append_audit(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Option<Uuid>,
    action: &str,
    resource_kind: &str,
    resource_id: Uuid,
    metadata: serde_json::Value,
) -> Result<(), sqlx::Error> {
    let entry = AuditLogEntry {
        id: Uuid::new_v4(),
        user_id,
        action: action.to_owned(),
        resource_kind: resource_kind.to_owned(),
        resource_id,
        metadata,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO audit_log (id, user_id, action, resource_kind, resource_id, metadata, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(entry.id)
    .bind(entry.user_id)
    .bind(entry.action)
    .bind(entry.resource_kind)
    .bind(entry.resource_id)
    .bind(entry.metadata)
    .bind(entry.created_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Outcome of an immediate market order: fills at `last_price` rather than waiting on
/// a trigger, reusing the same settlement and audit steps as a fired
/// pending order.
#[derive(Debug)]
pub struct MarketFill {
    /// The inserted `orders` row.
    pub order: Order,
    /// For `cfd` product types, the opened contract.
    pub contract: Option<Contract>,
}

/// Execute a market order for `account_id`/`user_id` at `last_price`,
/// inside one transaction. Returns `Ok(None)` for a business-level
/// rejection (insufficient balance/margin); the caller maps that to
/// [`crate::error::ApiError::InsufficientFunds`] or
/// `InsufficientMargin`.
///
/// # Errors
///
/// Returns `Err` only for a database failure.
#[allow(clippy::too_many_arguments)]
pub async fn execute_market_order(
    db: &PgPool,
    account_id: Uuid,
    user_id: Uuid,
    symbol: &str,
    side: Side,
    quantity: Decimal,
    leverage: Option<Decimal>,
    product_type: ProductType,
    last_price: Decimal,
) -> Result<Option<MarketFill>, sqlx::Error> {
    let mut tx = db.begin().await?;

    let instrument: Option<Instrument> = sqlx::query_as("SELECT * FROM instruments WHERE symbol = $1")
        .bind(symbol)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(instrument) = instrument else {
        tx.rollback().await?;
        return Ok(None);
    };

    let notional = quantity * last_price;
    let fee = notional * instrument.taker_fee_rate;

    let settlement = match product_type {
        ProductType::Spot => {
            settle_spot(&mut tx, account_id, side, &instrument.base_currency, quantity, notional, fee).await?
        }
        ProductType::Cfd => settle_cfd(&mut tx, account_id, quantity, leverage, last_price).await?,
    };

    let Some(margin) = settlement else {
        tx.rollback().await?;
        return Ok(None);
    };

    let order_id = Uuid::new_v4();
    let order_number: i64 = sqlx::query_scalar("SELECT nextval('order_number_seq')")
        .fetch_one(&mut *tx)
        .await?;
    let executed_at = Utc::now();

    let order = Order {
        id: order_id,
        order_number,
        pending_order_id: None,
        account_id,
        symbol: symbol.to_owned(),
        side,
        execution_type: ExecutionType::Limit,
        quantity,
        fill_price: last_price,
        notional,
        fee,
        leverage,
        product_type,
        execution_strategy: ExecutionStrategy::BBook,
        executed_at,
    };

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, order_number, account_id, symbol, side, execution_type,
            quantity, fill_price, notional, fee, leverage, product_type,
            execution_strategy, executed_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(order.id)
    .bind(order.order_number)
    .bind(order.account_id)
    .bind(&order.symbol)
    .bind(order.side)
    .bind(order.execution_type)
    .bind(order.quantity)
    .bind(order.fill_price)
    .bind(order.notional)
    .bind(order.fee)
    .bind(order.leverage)
    .bind(order.product_type)
    .bind(order.execution_strategy)
    .bind(order.executed_at)
    .execute(&mut *tx)
    .await?;

    let contract = if product_type == ProductType::Cfd {
        let contract_id = Uuid::new_v4();
        let contract_number: i64 = sqlx::query_scalar("SELECT nextval('contract_number_seq')")
            .fetch_one(&mut *tx)
            .await?;

        let contract = Contract {
            id: contract_id,
            contract_number,
            account_id,
            symbol: symbol.to_owned(),
            side,
            quantity,
            entry_price: last_price,
            current_price: last_price,
            leverage: leverage.unwrap_or(Decimal::ONE),
            margin,
            unrealized_pnl: Decimal::ZERO,
            take_profit: None,
            stop_loss: None,
            pair_id: None,
            status: ContractStatus::Open,
            opened_at: executed_at,
            closed_at: None,
            close_price: None,
        };

        sqlx::query(
            r#"
            INSERT INTO contracts (
                id, contract_number, account_id, symbol, side, quantity,
                entry_price, current_price, leverage, margin, unrealized_pnl,
                take_profit, stop_loss, pair_id, status, opened_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $8, $9, 0, NULL, NULL, NULL, $10, $11)
            "#,
        )
        .bind(contract.id)
        .bind(contract.contract_number)
        .bind(contract.account_id)
        .bind(&contract.symbol)
        .bind(contract.side)
        .bind(contract.quantity)
        .bind(contract.entry_price)
        .bind(contract.leverage)
        .bind(contract.margin)
        .bind(contract.status)
        .bind(contract.opened_at)
        .execute(&mut *tx)
        .await?;

        Some(contract)
    } else {
        None
    };

    append_audit(
        &mut tx,
        Some(user_id),
        "order.executed",
        "order",
        order_id,
        serde_json::json!({ "fill_price": last_price.to_string(), "symbol": symbol }),
    )
    .await?;

    tx.commit().await?;

    Ok(Some(MarketFill { order, contract }))
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::model::Contract;

    #[test]
    fn cfd_margin_matches_the_model_formula() {
        assert_eq!(Contract::required_margin(dec!(1), dec!(45000), dec!(100)), dec!(450));
    }

    #[test]
    fn spot_fee_is_taken_from_notional_rate() {
        let notional = dec!(1) * dec!(45000);
        let fee = notional * dec!(0.001);
        assert_eq!(fee, dec!(45));
    }
}
