//! Background Price Poller
//!
//! Owns one tokio task that refreshes a shared price table on a fixed
//! interval. The table is published as an immutable [`PriceSnapshot`]
//! through a `watch` channel, so readers always see a complete table.
//!
//! ```text
//!  Idle ──start_price_update──▶ Running ──stop_price_update──▶ Idle
//!                                 │  ▲
//!                       fetch ────┘  └──── sleep(interval)
//! ```

use std::collections::BTreeSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::exchange::ExchangeClient;
use crate::model::{PriceSnapshot, PriceTable, Symbol};

/// How long `stop_price_update` waits for the task before aborting it
pub const STOP_TIMEOUT: Duration = Duration::from_secs(1);

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Invoked with the full table after every successful cycle
pub type PriceCallback = Arc<dyn Fn(&PriceTable) + Send + Sync>;

struct PollTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
    symbols: BTreeSet<Symbol>,
    interval: Duration,
}

/// Repeating price refresh over one exchange
pub struct PricePoller {
    exchange: Arc<dyn ExchangeClient>,
    snapshot: Arc<watch::Sender<PriceSnapshot>>,
    task: Mutex<Option<PollTask>>,
}

impl PricePoller {
    pub fn new(exchange: Arc<dyn ExchangeClient>) -> Self {
        Self {
            exchange,
            snapshot: Arc::new(watch::Sender::new(PriceSnapshot::default())),
            task: Mutex::new(None),
        }
    }

    pub fn exchange(&self) -> &Arc<dyn ExchangeClient> {
        &self.exchange
    }

    /// Start polling `symbols` (empty = whole venue) every `interval`.
    ///
    /// Returns `false` without doing anything when a task is already running.
    pub async fn start_price_update<I, S>(
        &self,
        symbols: I,
        callback: Option<PriceCallback>,
        interval: Duration,
    ) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        let mut task = self.task.lock().await;
        if let Some(running) = task.as_ref() {
            if !running.handle.is_finished() {
                debug!(exchange = self.exchange.name(), "price update already running");
                return false;
            }
        }

        let symbols: BTreeSet<Symbol> = symbols.into_iter().map(Into::into).collect();
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = tokio::spawn(poll_loop(
            Arc::clone(&self.exchange),
            Arc::clone(&self.snapshot),
            symbols.clone(),
            callback,
            interval,
            stop_rx,
        ));

        info!(
            exchange = self.exchange.name(),
            symbols = symbols.len(),
            interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            "price update started"
        );

        *task = Some(PollTask {
            stop: stop_tx,
            handle,
            symbols,
            interval,
        });
        true
    }

    /// Signal the task to exit and wait up to [`STOP_TIMEOUT`] for it.
    ///
    /// A task still busy after the timeout is aborted. Safe to call when
    /// nothing is running.
    pub async fn stop_price_update(&self) {
        // Held until the old task is gone so a concurrent start cannot
        // overlap with it
        let mut task = self.task.lock().await;
        let Some(PollTask { stop, mut handle, .. }) = task.take() else {
            return;
        };

        // Fails only if the task already exited
        let _ = stop.send(true);

        match tokio::time::timeout(STOP_TIMEOUT, &mut handle).await {
            Ok(Ok(())) => info!(exchange = self.exchange.name(), "price update stopped"),
            Ok(Err(e)) => warn!(exchange = self.exchange.name(), error = %e, "price update task ended abnormally"),
            Err(_) => {
                warn!(
                    exchange = self.exchange.name(),
                    "price update did not stop within {:?}; aborting",
                    STOP_TIMEOUT
                );
                handle.abort();
            }
        }
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Symbols and interval of the running task
    pub async fn settings(&self) -> Option<(BTreeSet<Symbol>, Duration)> {
        self.task
            .lock()
            .await
            .as_ref()
            .map(|task| (task.symbols.clone(), task.interval))
    }

    pub fn snapshot(&self) -> PriceSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn prices(&self) -> Arc<PriceTable> {
        Arc::clone(&self.snapshot.borrow().prices)
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.snapshot.borrow().updated_at
    }

    /// Receiver that wakes on every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<PriceSnapshot> {
        self.snapshot.subscribe()
    }
}

async fn poll_loop(
    exchange: Arc<dyn ExchangeClient>,
    snapshot: Arc<watch::Sender<PriceSnapshot>>,
    symbols: BTreeSet<Symbol>,
    callback: Option<PriceCallback>,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        if *stop.borrow() {
            break;
        }

        match exchange.try_fetch_prices(&symbols).await {
            Ok(prices) => {
                let next = PriceSnapshot::new(prices);
                let table = Arc::clone(&next.prices);
                snapshot.send_replace(next);
                debug!(exchange = exchange.name(), count = table.len(), "price table refreshed");

                if let Some(callback) = &callback {
                    notify(exchange.name(), callback, &table);
                }
            }
            Err(e) => {
                warn!(exchange = exchange.name(), error = %e, "price refresh failed; keeping previous table");
            }
        }

        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            changed = stop.changed() => {
                // Poller dropped
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    debug!(exchange = exchange.name(), "price update loop exited");
}

fn notify(exchange: &str, callback: &PriceCallback, table: &PriceTable) {
    if catch_unwind(AssertUnwindSafe(|| callback(table))).is_err() {
        error!(exchange = %exchange, "price callback panicked");
    }
}
