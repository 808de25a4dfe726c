//! A slow client is dropped without affecting other clients, exercised
//! through the full broadcast pipeline rather than the Hub directly (the
//! Hub's own unit tests cover the registry in isolation; this checks the
//! pipeline's tick fan-out keeps the contract end to end).

use std::sync::Arc;

use rust_decimal_macros::dec;
use tradecore::marketdata::cache::LastPriceCache;
use tradecore::marketdata::hub::{Hub, CLIENT_QUEUE_CAPACITY};
use tradecore::marketdata::pipeline::Pipeline;
use tradecore::prelude::{MarketMessage, Tick};
use tradecore::shutdown::Shutdown;

#[tokio::test]
async fn slow_client_is_dropped_while_fast_client_keeps_receiving() {
    let shutdown = Shutdown::new();
    let (hub, _hub_handle) = Hub::spawn(shutdown.signal());
    let cache = Arc::new(LastPriceCache::default());
    let (pipeline, _pipeline_handle) = Pipeline::spawn(hub.clone(), Vec::new(), cache, shutdown.signal());

    let (_slow_id, mut slow_rx) = hub.register(None).await.expect("register slow client");
    let (fast_id, mut fast_rx) = hub.register(None).await.expect("register fast client");

    for i in 0..(CLIENT_QUEUE_CAPACITY + 1000) {
        pipeline.publish(MarketMessage::Tick(Tick {
            symbol: "BTCUSDT".to_owned(),
            price: dec!(45000) + rust_decimal::Decimal::from(i),
            time_ms: i as i64,
        }));
        // Drain the fast client as we go, like a real connected reader.
        while fast_rx.try_recv().is_ok() {}
        tokio::task::yield_now().await;
    }

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let mut fast_total = 0;
    while fast_rx.try_recv().is_ok() {
        fast_total += 1;
    }
    assert!(
        fast_total > 0,
        "fast client {fast_id} should keep receiving after the slow one is dropped"
    );

    // The slow client never drained; once its buffered backlog is consumed
    // the sender side has already been removed from the registry.
    while slow_rx.try_recv().is_ok() {}
    pipeline.publish(MarketMessage::Tick(Tick {
        symbol: "BTCUSDT".to_owned(),
        price: dec!(50000),
        time_ms: i64::MAX,
    }));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(
        matches!(slow_rx.try_recv(), Err(tokio::sync::mpsc::error::TryRecvError::Disconnected)),
        "the slow client's outbound channel should have been unregistered"
    );
}
