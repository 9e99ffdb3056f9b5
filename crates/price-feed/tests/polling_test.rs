//! End-to-end polling against the static venue

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use price_feed::exchange::StaticTickerService;
use price_feed::{
    Exchange, ExchangeClient, PriceCallback, PricePoller, PriceTable, Symbol, SymbolMap, Venue,
};

const INTERVAL: Duration = Duration::from_millis(25);

fn static_venue() -> Arc<StaticTickerService> {
    Arc::new(StaticTickerService::with_prices([("BTC", 65_000.0), ("ETH", 3_500.0)]))
}

fn poller_over(service: &Arc<StaticTickerService>) -> PricePoller {
    let exchange = Exchange::new(Venue::Mock, SymbolMap::mock(), service.clone());
    PricePoller::new(Arc::new(exchange))
}

fn expected_table() -> PriceTable {
    PriceTable::from([
        (Symbol::new("BTCUSDT"), 65_000.0),
        (Symbol::new("ETHUSDT"), 3_500.0),
    ])
}

#[tokio::test]
async fn test_poller_publishes_table_and_calls_back() {
    let service = static_venue();
    let poller = poller_over(&service);

    let seen: Arc<Mutex<Vec<PriceTable>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let callback: PriceCallback = Arc::new(move |prices: &PriceTable| {
        sink.lock().unwrap().push(prices.clone());
    });

    assert!(
        poller
            .start_price_update(["BTCUSDT", "ETHUSDT"], Some(callback), INTERVAL)
            .await
    );

    let mut updates = poller.subscribe();
    tokio::time::timeout(Duration::from_secs(2), updates.changed())
        .await
        .expect("no snapshot published")
        .unwrap();
    tokio::time::sleep(INTERVAL).await;

    assert_eq!(*poller.prices(), expected_table());
    assert!(poller.last_update().is_some());

    let seen = seen.lock().unwrap().clone();
    assert!(!seen.is_empty());
    assert_eq!(seen[0], expected_table());

    poller.stop_price_update().await;
    assert!(!poller.is_running().await);
}

#[tokio::test]
async fn test_failed_cycle_keeps_previous_table() {
    let service = static_venue();
    let poller = poller_over(&service);

    poller
        .start_price_update(["BTCUSDT", "ETHUSDT"], None, INTERVAL)
        .await;
    tokio::time::sleep(INTERVAL * 3).await;

    let before = poller.snapshot();
    assert_eq!(*before.prices, expected_table());

    service.set_offline(true);
    // Let any in-flight successful cycle land before sampling
    tokio::time::sleep(INTERVAL * 2).await;
    let frozen = poller.snapshot();
    tokio::time::sleep(INTERVAL * 4).await;

    let during = poller.snapshot();
    assert_eq!(*during.prices, expected_table());
    assert_eq!(during.updated_at, frozen.updated_at);
    assert!(poller.is_running().await);

    service.set_price("BTC", 66_000.0);
    service.set_offline(false);
    tokio::time::sleep(INTERVAL * 4).await;

    let after = poller.snapshot();
    assert_eq!(after.price("BTCUSDT"), Some(66_000.0));
    assert!(after.updated_at > frozen.updated_at);

    poller.stop_price_update().await;
}

#[tokio::test]
async fn test_double_start_runs_one_task() {
    let service = static_venue();
    let poller = poller_over(&service);

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let callback: PriceCallback = Arc::new(move |_: &PriceTable| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let interval = Duration::from_millis(100);
    assert!(
        poller
            .start_price_update(["BTCUSDT"], Some(Arc::clone(&callback)), interval)
            .await
    );
    assert!(
        !poller
            .start_price_update(["BTCUSDT"], Some(callback), interval)
            .await
    );

    // One task fires at t=0 and t=100ms; a duplicate would double this
    tokio::time::sleep(Duration::from_millis(150)).await;
    poller.stop_price_update().await;

    let fired = calls.load(Ordering::SeqCst);
    assert!((1..=2).contains(&fired), "callback fired {fired} times");
}

#[tokio::test]
async fn test_stop_then_start_polls_new_symbols() {
    let service = static_venue();
    let poller = poller_over(&service);

    poller.start_price_update(["BTCUSDT"], None, INTERVAL).await;
    tokio::time::sleep(INTERVAL * 2).await;
    poller.stop_price_update().await;
    assert!(poller.prices().contains_key("BTCUSDT"));
    assert!(!poller.prices().contains_key("ETHUSDT"));

    assert!(poller.start_price_update(["ETHUSDT"], None, INTERVAL).await);
    tokio::time::sleep(INTERVAL * 2).await;

    let (symbols, interval) = poller.settings().await.unwrap();
    assert_eq!(symbols, BTreeSet::from([Symbol::new("ETHUSDT")]));
    assert_eq!(interval, INTERVAL);
    assert_eq!(poller.prices().get("ETHUSDT"), Some(&3_500.0));

    poller.stop_price_update().await;
}

#[tokio::test]
async fn test_unknown_symbols_are_skipped() {
    let service = static_venue();
    let exchange = Exchange::new(Venue::Mock, SymbolMap::mock(), service.clone());

    let requested = BTreeSet::from([Symbol::new("BTCUSDT"), Symbol::new("DOGEUSDT")]);
    let prices = exchange.fetch_prices(&requested).await;

    assert_eq!(prices.len(), 1);
    assert_eq!(prices.get("BTCUSDT"), Some(&65_000.0));
}

#[tokio::test]
async fn test_offline_venue_yields_empty_table() {
    let service = static_venue();
    service.set_offline(true);
    let exchange = Exchange::new(Venue::Mock, SymbolMap::mock(), service.clone());

    let requested = BTreeSet::from([Symbol::new("BTCUSDT")]);
    assert!(exchange.try_fetch_prices(&requested).await.is_err());
    assert!(exchange.fetch_prices(&requested).await.is_empty());
    assert_eq!(exchange.get_ticker_price(&Symbol::new("BTCUSDT")).await, None);
}
