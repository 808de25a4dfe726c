//! The Pending-Order Matcher: on every tick, evaluate every
//! `pending` order on that symbol and execute the ones whose trigger fired.

pub mod execute;

use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::model::{PendingOrder, PendingOrderStatus};
use crate::prelude::{Db, MarketMessage};
use crate::shutdown::ShutdownSignal;

/// Capacity of the matcher's inlet, fed by the broadcast pipeline's
/// matcher-side leg.
pub const MATCHER_INLET_CAPACITY: usize = 256;

/// Drives pending-order execution from the tick stream. One task, serial
/// per tick — sufficient because each order's own state transition is
/// guarded by row-level locking.
#[derive(Debug)]
pub struct PendingOrderMatcher {
    inlet: mpsc::Sender<MarketMessage>,
}

impl PendingOrderMatcher {
    /// Spawn the matcher's processing loop against `db`.
    #[must_use]
    pub fn spawn(db: Db, mut shutdown: ShutdownSignal) -> (Self, mpsc::Sender<MarketMessage>, JoinHandle<()>) {
        let (inlet, mut outlet) = mpsc::channel(MATCHER_INLET_CAPACITY);
        let feed = inlet.clone();

        let handle = tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    message = outlet.recv() => message,
                    () = shutdown.wait() => {
                        log::info!("matcher: shutdown signal received");
                        break;
                    }
                };
                let Some(message) = message else { break };

                if let Some(tick) = message.as_tick() {
                    if let Err(err) = process_tick(&db, &tick.symbol, tick.price).await {
                        log::error!("matcher: tick processing failed for {}: {err}", tick.symbol);
                    }
                }
            }

            log::info!("matcher: processing loop stopped");
        });

        (Self { inlet }, feed, handle)
    }

    /// The sender end other components (e.g. tests) can use to feed ticks
    /// directly into the matcher.
    #[must_use]
    pub fn inlet(&self) -> mpsc::Sender<MarketMessage> {
        self.inlet.clone()
    }
}

/// Evaluate and execute every pending order for `symbol` against
/// `last_price`, FIFO by `created_at`.
///
/// # Errors
///
/// Returns `Err` only if the candidate query itself fails; a single
/// order's execution failure is logged and does not abort the batch.
pub async fn process_tick(db: &PgPool, symbol: &str, last_price: rust_decimal::Decimal) -> Result<(), sqlx::Error> {
    let candidates: Vec<PendingOrder> = sqlx::query_as(
        r#"
        SELECT * FROM pending_orders
        WHERE symbol = $1 AND status = $2
        ORDER BY created_at ASC
        "#,
    )
    .bind(symbol)
    .bind(PendingOrderStatus::Pending)
    .fetch_all(db)
    .await?;

    for candidate in candidates {
        let Some(fill_price) = candidate.evaluate(last_price) else {
            continue;
        };

        if let Err(err) = execute::execute_pending_order(db, candidate.id, fill_price, last_price).await {
            log::error!("matcher: order {} execution failed: {err}", candidate.order_number);
        }
    }

    Ok(())
}
