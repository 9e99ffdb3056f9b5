//! Static Ticker Service
//!
//! In-memory venue for testing and demo purposes. Returns fixed prices keyed
//! by native symbol, and can be switched into failure modes to exercise the
//! fetch chain.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::TickerService;
use crate::error::{FeedError, Result};
use crate::model::{AccountSummary, Credentials};

/// Realistic spot prices, quoted in USDT, keyed by base asset
const DEMO_PRICES: &[(&str, f64)] = &[
    ("BTC", 97_500.0),
    ("ETH", 3_450.0),
    ("SOL", 195.0),
    ("ADA", 0.95),
    ("DOT", 7.20),
    ("LINK", 24.50),
    ("AVAX", 42.00),
    ("MATIC", 0.52),
    ("ATOM", 9.80),
    ("XRP", 2.35),
    ("DOGE", 0.38),
    ("SHIB", 0.000_022),
    ("UNI", 14.20),
    ("LTC", 105.0),
    ("BCH", 485.0),
];

#[derive(Default)]
struct CallCounts {
    single: AtomicUsize,
    batch: AtomicUsize,
    full: AtomicUsize,
    markets: AtomicUsize,
}

/// Fixed-price venue with failure injection
#[derive(Default)]
pub struct StaticTickerService {
    prices: RwLock<HashMap<String, f64>>,
    account: Option<AccountSummary>,

    /// Every call fails at the transport level
    offline: AtomicBool,
    /// Batched calls fail at the transport level
    batch_failing: AtomicBool,
    /// Whole-venue calls fail at the transport level
    full_failing: AtomicBool,

    calls: CallCounts,
}

impl StaticTickerService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prices<'a>(prices: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        let service = Self::new();
        for (symbol, price) in prices {
            service.set_price(symbol, price);
        }
        service
    }

    /// Base-asset prices used by the `mock` exchange
    pub fn demo() -> Self {
        Self::with_prices(DEMO_PRICES.iter().copied())
    }

    #[must_use]
    pub fn with_account(mut self, account: AccountSummary) -> Self {
        self.account = Some(account);
        self
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        self.prices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(symbol.to_string(), price);
    }

    pub fn remove_price(&self, symbol: &str) {
        self.prices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(symbol);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_batch_failing(&self, failing: bool) {
        self.batch_failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_full_failing(&self, failing: bool) {
        self.full_failing.store(failing, Ordering::SeqCst);
    }

    pub fn single_calls(&self) -> usize {
        self.calls.single.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.calls.batch.load(Ordering::SeqCst)
    }

    pub fn full_calls(&self) -> usize {
        self.calls.full.load(Ordering::SeqCst)
    }

    pub fn market_calls(&self) -> usize {
        self.calls.markets.load(Ordering::SeqCst)
    }

    fn check_online(&self, failing: Option<&AtomicBool>) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) || failing.is_some_and(|f| f.load(Ordering::SeqCst)) {
            return Err(FeedError::Transport("static venue is offline".into()));
        }
        Ok(())
    }

    fn snapshot(&self) -> HashMap<String, f64> {
        self.prices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TickerService for StaticTickerService {
    async fn fetch_ticker(&self, symbol: &str) -> Result<f64> {
        self.calls.single.fetch_add(1, Ordering::SeqCst);
        self.check_online(None)?;

        self.snapshot()
            .get(symbol)
            .copied()
            .ok_or_else(|| FeedError::UnknownSymbol(symbol.to_string()))
    }

    async fn fetch_tickers(&self, symbols: Option<&[String]>) -> Result<HashMap<String, f64>> {
        let prices = self.snapshot();

        let Some(symbols) = symbols else {
            self.calls.full.fetch_add(1, Ordering::SeqCst);
            self.check_online(Some(&self.full_failing))?;
            return Ok(prices);
        };

        self.calls.batch.fetch_add(1, Ordering::SeqCst);
        self.check_online(Some(&self.batch_failing))?;

        // Like Binance, one unknown symbol rejects the whole batch
        if let Some(unknown) = symbols.iter().find(|s| !prices.contains_key(s.as_str())) {
            return Err(FeedError::Venue {
                code: "-1121".into(),
                message: format!("Invalid symbol: {unknown}"),
            });
        }

        Ok(symbols
            .iter()
            .filter_map(|s| prices.get(s).map(|price| (s.clone(), *price)))
            .collect())
    }

    async fn load_markets(&self) -> Result<HashSet<String>> {
        self.calls.markets.fetch_add(1, Ordering::SeqCst);
        self.check_online(None)?;

        Ok(self.snapshot().into_keys().collect())
    }

    async fn account(&self, credentials: &Credentials) -> Result<AccountSummary> {
        self.check_online(None)?;

        if credentials.api_key.is_empty() || credentials.api_secret.is_empty() {
            return Err(FeedError::Auth("empty API key or secret".into()));
        }
        self.account
            .clone()
            .ok_or_else(|| FeedError::Unsupported("account lookup on static venue".into()))
    }
}
