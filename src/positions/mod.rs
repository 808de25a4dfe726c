//! The Position Manager: revalues open contracts on every
//! tick, triggers TP/SL closes, and liquidates accounts that cross the
//! configured margin floor.

pub mod liquidation;
pub mod margin;

use rust_decimal::Decimal;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::marketdata::hub::Hub;
use crate::model::{Contract, ContractStatus};
use crate::positions::liquidation::{close_contract, order_by_largest_loss};
use crate::prelude::{Db, MarketMessage};
use crate::shutdown::ShutdownSignal;

/// Capacity of the position manager's inlet, fed by the broadcast
/// pipeline.
pub const POSITION_INLET_CAPACITY: usize = 256;

/// Drives revaluation and liquidation from the tick stream.
#[derive(Debug)]
pub struct PositionManager {
    inlet: mpsc::Sender<MarketMessage>,
}

impl PositionManager {
    /// Spawn the position manager's processing loop.
    #[must_use]
    pub fn spawn(
        db: Db,
        hub: Hub,
        liquidation_threshold: Decimal,
        mut shutdown: ShutdownSignal,
    ) -> (Self, mpsc::Sender<MarketMessage>, JoinHandle<()>) {
        let (inlet, mut outlet) = mpsc::channel(POSITION_INLET_CAPACITY);
        let feed = inlet.clone();

        let handle = tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    message = outlet.recv() => message,
                    () = shutdown.wait() => {
                        log::info!("positions: shutdown signal received");
                        break;
                    }
                };
                let Some(message) = message else { break };

                if let Some(tick) = message.as_tick() {
                    if let Err(err) = process_tick(&db, &hub, &tick.symbol, tick.price, liquidation_threshold).await {
                        log::error!("positions: tick processing failed for {}: {err}", tick.symbol);
                    }
                }
            }

            log::info!("positions: processing loop stopped");
        });

        (Self { inlet }, feed, handle)
    }

    /// The sender end other components (e.g. tests) can use to feed ticks
    /// directly into the position manager.
    #[must_use]
    pub fn inlet(&self) -> mpsc::Sender<MarketMessage> {
        self.inlet.clone()
    }
}

/// Revalue every open contract on `symbol`, evaluate TP/SL, then check
/// every affected account's margin level and liquidate as needed.
///
/// # Errors
///
/// Returns `Err` only if the initial contract query fails; individual
/// contract close failures are logged and do not abort the sweep.
pub async fn process_tick(
    db: &PgPool,
    hub: &Hub,
    symbol: &str,
    last_price: Decimal,
    liquidation_threshold: Decimal,
) -> Result<(), sqlx::Error> {
    let mut contracts: Vec<Contract> =
        sqlx::query_as("SELECT * FROM contracts WHERE symbol = $1 AND status = $2")
            .bind(symbol)
            .bind(ContractStatus::Open)
            .fetch_all(db)
            .await?;

    for contract in &mut contracts {
        contract.revalue(last_price);
    }

    // TP/SL: a normal (non-liquidation) close, evaluated before the margin
    // sweep so a contract that should TP/SL isn't also swept into
    // liquidation on the same tick.
    let mut tp_sl_closed = Vec::new();
    for contract in &contracts {
        if contract.tp_sl_triggered() {
            match close_contract(db, contract.id, contract.current_price, ContractStatus::Closed).await {
                Ok(Some(outcome)) => {
                    hub.send_to_user(outcome.user_id, user_event("POSITION_CLOSED", outcome.contract_id));
                    tp_sl_closed.push(contract.id);
                }
                Ok(None) => {}
                Err(err) => log::error!("positions: tp/sl close failed for contract {}: {err}", contract.id),
            }
        }
    }
    contracts.retain(|c| !tp_sl_closed.contains(&c.id));

    let affected_accounts: Vec<Uuid> = {
        let mut ids: Vec<Uuid> = contracts.iter().map(|c| c.account_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    };

    for account_id in affected_accounts {
        if let Err(err) = sweep_account(db, hub, account_id, liquidation_threshold).await {
            log::error!("positions: liquidation sweep failed for account {account_id}: {err}");
        }
    }

    Ok(())
}

/// Recompute one account's margin level across *all* its open contracts
/// (not just the symbol that ticked) and liquidate largest-loss-first
/// until margin level recovers or no contracts remain.
async fn sweep_account(
    db: &PgPool,
    hub: &Hub,
    account_id: Uuid,
    liquidation_threshold: Decimal,
) -> Result<(), sqlx::Error> {
    loop {
        let balance: Option<Decimal> = sqlx::query_scalar(
            "SELECT amount FROM balances WHERE account_id = $1 AND currency = 'USD'",
        )
        .bind(account_id)
        .fetch_optional(db)
        .await?;
        let balance = balance.unwrap_or(Decimal::ZERO);

        let open: Vec<Contract> = sqlx::query_as(
            "SELECT * FROM contracts WHERE account_id = $1 AND status = $2",
        )
        .bind(account_id)
        .bind(ContractStatus::Open)
        .fetch_all(db)
        .await?;

        if open.is_empty() {
            return Ok(());
        }

        let used_margin: Decimal = open.iter().map(|c| c.margin).sum();
        let unrealized: Decimal = open.iter().map(|c| c.unrealized_pnl).sum();
        let equity = margin::equity(balance, unrealized);

        if !margin::below_liquidation_threshold(equity, used_margin, liquidation_threshold) {
            return Ok(());
        }

        let ordered = order_by_largest_loss(open);
        let Some(worst) = ordered.first() else {
            return Ok(());
        };

        match close_contract(db, worst.id, worst.current_price, ContractStatus::Liquidated).await {
            Ok(Some(outcome)) => {
                hub.send_to_user(outcome.user_id, user_event("CONTRACT_LIQUIDATED", outcome.contract_id));
                if outcome.shortfall > Decimal::ZERO {
                    log::warn!(
                        "positions: account {account_id} liquidation shortfall {} on contract {}",
                        outcome.shortfall,
                        outcome.contract_id
                    );
                }
            }
            Ok(None) => return Ok(()),
            Err(err) => {
                log::error!("positions: liquidation close failed for contract {}: {err}", worst.id);
                return Ok(());
            }
        }
    }
}

fn user_event(event_type: &str, contract_id: Uuid) -> std::sync::Arc<str> {
    let payload = serde_json::json!({
        "type": event_type,
        "payload": { "contract_id": contract_id },
    });
    std::sync::Arc::from(payload.to_string())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn user_event_serializes_the_expected_shape() {
        let id = Uuid::nil();
        let event = user_event("CONTRACT_LIQUIDATED", id);
        let value: serde_json::Value = serde_json::from_str(&event).expect("valid json");
        assert_eq!(value["type"], "CONTRACT_LIQUIDATED");
        assert_eq!(value["payload"]["contract_id"], id.to_string());
    }

    #[test]
    fn margin_grouping_matches_the_pure_function() {
        let balance = dec!(1000);
        let unrealized = dec!(-500);
        assert_eq!(margin::equity(balance, unrealized), dec!(500));
    }
}
