//! Price Fetcher
//!
//! One pass of the fetch chain against a [`TickerService`]:
//!
//! ```text
//! symbols empty? ──yes──▶ whole venue ──ok──▶ done
//!       │                      │ err
//!       no                     ▼
//!       │               explicit table symbols
//!       ▼                      │
//! market check ──▶ batched call ──non-empty──▶ done
//!                       │ err / empty
//!                       ▼
//!                 one call per symbol
//! ```
//!
//! Failures are logged and absorbed at every step. The pass reports `Err`
//! only when nothing was priced and some call failed for a reason other
//! than the symbol not being traded.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{FeedError, Result};
use crate::exchange::TickerService;
use crate::model::{PriceTable, Symbol};
use crate::symbol::SymbolMap;

struct CachedMarkets {
    loaded_at: Instant,
    symbols: Arc<HashSet<String>>,
}

/// Tradable-symbol list, reloaded once `ttl` has passed
pub struct MarketCache {
    ttl: Duration,
    cached: RwLock<Option<CachedMarkets>>,
}

impl MarketCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cached: RwLock::new(None),
        }
    }

    pub async fn get(&self, service: &dyn TickerService) -> Result<Arc<HashSet<String>>> {
        if !self.ttl.is_zero() {
            if let Some(cached) = self.cached.read().await.as_ref() {
                if cached.loaded_at.elapsed() < self.ttl {
                    return Ok(Arc::clone(&cached.symbols));
                }
            }
        }

        let symbols = Arc::new(service.load_markets().await?);
        if !self.ttl.is_zero() {
            *self.cached.write().await = Some(CachedMarkets {
                loaded_at: Instant::now(),
                symbols: Arc::clone(&symbols),
            });
        }
        Ok(symbols)
    }

    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}

/// Runs the fetch chain for one backend
pub struct PriceFetcher<'a> {
    exchange: &'a str,
    symbols: &'a SymbolMap,
    service: &'a dyn TickerService,
    markets: &'a MarketCache,
}

impl<'a> PriceFetcher<'a> {
    pub const fn new(
        exchange: &'a str,
        symbols: &'a SymbolMap,
        service: &'a dyn TickerService,
        markets: &'a MarketCache,
    ) -> Self {
        Self {
            exchange,
            symbols,
            service,
            markets,
        }
    }

    /// One symbol, translated to the venue spelling
    pub async fn fetch_one(&self, symbol: &Symbol) -> Result<f64> {
        self.service.fetch_ticker(&self.symbols.to_backend(symbol)).await
    }

    /// Every ticker on the venue, keyed canonically
    pub async fn fetch_all(&self) -> Result<PriceTable> {
        let tickers = self.service.fetch_tickers(None).await?;
        debug!(exchange = self.exchange, count = tickers.len(), "fetched all tickers");

        Ok(tickers
            .into_iter()
            .map(|(native, price)| (self.symbols.to_canonical(&native), price))
            .collect())
    }

    /// Full fetch chain; an empty `requested` set means the whole venue
    pub async fn fetch(&self, requested: &BTreeSet<Symbol>) -> Result<PriceTable> {
        let mut requested = Cow::Borrowed(requested);

        if requested.is_empty() {
            match self.fetch_all().await {
                Ok(prices) => return Ok(prices),
                Err(e) => {
                    let known: BTreeSet<Symbol> = self.symbols.explicit_symbols().cloned().collect();
                    if known.is_empty() {
                        warn!(exchange = self.exchange, error = %e, "failed to fetch all tickers");
                        return Err(e);
                    }
                    warn!(
                        exchange = self.exchange,
                        error = %e,
                        fallback = known.len(),
                        "failed to fetch all tickers; falling back to known symbols"
                    );
                    requested = Cow::Owned(known);
                }
            }
        }

        let batch_failure = match self.fetch_batch(&requested).await {
            Ok(prices) if !prices.is_empty() => return Ok(prices),
            Ok(_) => {
                debug!(exchange = self.exchange, "batch returned nothing; fetching individually");
                None
            }
            Err(e) => {
                warn!(exchange = self.exchange, error = %e, "batch fetch failed; fetching individually");
                e.is_transport().then_some(e)
            }
        };

        let (prices, failure) = self.fetch_each(&requested).await;
        if prices.is_empty() {
            if let Some(e) = failure.or(batch_failure) {
                return Err(e);
            }
            warn!(
                exchange = self.exchange,
                requested = requested.len(),
                "no prices retrieved"
            );
        }
        Ok(prices)
    }

    /// Market-checked batch call; unknown symbols are dropped, not fatal
    async fn fetch_batch(&self, requested: &BTreeSet<Symbol>) -> Result<PriceTable> {
        let markets = self.markets.get(self.service).await?;

        let mut by_native: HashMap<String, &Symbol> = HashMap::with_capacity(requested.len());
        for symbol in requested {
            let native = self.symbols.to_backend(symbol);
            if markets.contains(&native) {
                by_native.insert(native, symbol);
            } else {
                let reject = FeedError::UnknownSymbol(native);
                warn!(exchange = self.exchange, symbol = %symbol, error = %reject, "symbol not listed");
            }
        }

        if by_native.is_empty() {
            return Ok(PriceTable::new());
        }

        let natives: Vec<String> = by_native.keys().cloned().collect();
        let tickers = self.service.fetch_tickers(Some(&natives)).await?;

        Ok(tickers
            .into_iter()
            .filter_map(|(native, price)| by_native.get(&native).map(|&symbol| (symbol.clone(), price)))
            .collect())
    }

    /// One call per symbol. When nothing came back, also returns the last
    /// failure other than an unlisted symbol.
    async fn fetch_each(&self, requested: &BTreeSet<Symbol>) -> (PriceTable, Option<FeedError>) {
        let mut prices = PriceTable::new();
        let mut failure = None;

        for symbol in requested {
            match self.fetch_one(symbol).await {
                Ok(price) => {
                    debug!(exchange = self.exchange, symbol = %symbol, price, "fetched price");
                    prices.insert(symbol.clone(), price);
                }
                Err(FeedError::UnknownSymbol(native)) => {
                    warn!(exchange = self.exchange, symbol = %symbol, native = %native, "symbol not traded");
                }
                Err(e) => {
                    warn!(exchange = self.exchange, symbol = %symbol, error = %e, "failed to fetch price");
                    failure = Some(e);
                }
            }
        }

        let failure = if prices.is_empty() { failure } else { None };
        (prices, failure)
    }
}
