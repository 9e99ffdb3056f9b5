//! Exchange Integration
//!
//! Two seams live here:
//!
//! - [`ExchangeClient`] is what callers and the poller see. Symbols in and
//!   out are always canonical.
//! - [`TickerService`] is the raw remote venue, spoken to in its native
//!   symbol spelling. [`Exchange`] glues the two together with a
//!   [`SymbolMap`](crate::symbol::SymbolMap) and the fetch chain.

mod backend;
mod binance;
mod mock;
mod okx;
mod signing;

pub use backend::{Exchange, Venue};
pub use binance::BinanceRest;
pub use mock::StaticTickerService;
pub use okx::OkxRest;
pub use signing::sign_query;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{FeedError, Result};
use crate::model::{AccountSummary, Credentials, PriceTable, Symbol};

/// Exchange client trait (Strategy pattern)
///
/// Every lookup degrades softly: absence of a price is the error signal.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Exchange name, as accepted by the factory
    fn name(&self) -> &str;

    /// Canonical symbol to venue spelling
    fn to_backend(&self, symbol: &Symbol) -> String;

    /// Venue spelling to canonical symbol
    fn to_canonical(&self, native: &str) -> Symbol;

    /// Latest price for one symbol, `None` on any failure
    async fn get_ticker_price(&self, symbol: &Symbol) -> Option<f64>;

    /// Every tradable symbol on the venue; empty on failure
    async fn get_all_tickers(&self) -> PriceTable;

    /// Run one pass of the fetch chain.
    ///
    /// An empty `symbols` set asks for the whole venue. Returns `Err` when
    /// nothing was priced and some call failed for a reason other than an
    /// untraded symbol.
    async fn try_fetch_prices(&self, symbols: &BTreeSet<Symbol>) -> Result<PriceTable>;

    /// Like [`try_fetch_prices`](Self::try_fetch_prices), but never fails
    async fn fetch_prices(&self, symbols: &BTreeSet<Symbol>) -> PriceTable {
        match self.try_fetch_prices(symbols).await {
            Ok(prices) => prices,
            Err(e) => {
                tracing::warn!(exchange = self.name(), error = %e, "price fetch failed");
                PriceTable::new()
            }
        }
    }

    /// Signed account query
    async fn account_summary(&self) -> Result<AccountSummary> {
        Err(FeedError::Unsupported(format!("account lookup on {}", self.name())))
    }

    /// Check the stored credentials against the live account
    async fn verify_credentials(&self) -> Result<()> {
        self.account_summary().await.map(|_| ())
    }

    /// Check if exchange is reachable
    async fn health_check(&self) -> bool;
}

/// Raw remote ticker venue, addressed with native symbols
#[async_trait]
pub trait TickerService: Send + Sync {
    /// Last traded price of one instrument
    async fn fetch_ticker(&self, symbol: &str) -> Result<f64>;

    /// Last prices keyed by native symbol; `None` requests the whole venue
    async fn fetch_tickers(&self, symbols: Option<&[String]>) -> Result<HashMap<String, f64>>;

    /// Native symbols currently open for trading
    async fn load_markets(&self) -> Result<HashSet<String>>;

    async fn account(&self, _credentials: &Credentials) -> Result<AccountSummary> {
        Err(FeedError::Unsupported("account lookup".into()))
    }
}

/// Connection settings shared by the REST backends
#[derive(Clone, Debug)]
pub struct ExchangeOptions {
    /// Overrides the venue's public API root
    pub base_url: Option<String>,

    /// Per-request HTTP timeout
    pub timeout: Duration,

    /// How long a loaded market list stays valid; zero disables caching
    pub market_ttl: Duration,

    /// Binance `recvWindow` for signed requests, in milliseconds
    pub recv_window_ms: u64,
}

impl Default for ExchangeOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(10),
            market_ttl: Duration::from_secs(300),
            recv_window_ms: 5_000,
        }
    }
}

impl ExchangeOptions {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = std::env::var("FEED_BASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        let timeout = std::env::var("FEED_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map_or(defaults.timeout, Duration::from_secs);
        let market_ttl = std::env::var("FEED_MARKET_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map_or(defaults.market_ttl, Duration::from_secs);

        Self {
            base_url,
            timeout,
            market_ttl,
            ..defaults
        }
    }

    /// Resolve the API root, trimming any trailing slash
    pub(crate) fn base_url_or(&self, default: &str) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }

    pub(crate) fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("price-feed/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FeedError::Config(format!("HTTP client: {e}")))
    }
}

/// Rate limits, IP bans and server faults, whatever the body says
pub(crate) fn is_unavailable(status: reqwest::StatusCode) -> bool {
    status.is_server_error()
        || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::IM_A_TEAPOT
}

/// Parse a venue price string
pub(crate) fn parse_price(symbol: &str, raw: &str) -> Result<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|price| price.is_finite())
        .ok_or_else(|| FeedError::Other(format!("invalid price '{raw}' for {symbol}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("BTCUSDT", "65000.10").unwrap(), 65000.10);
        assert!(parse_price("BTCUSDT", "").is_err());
        assert!(parse_price("BTCUSDT", "NaN").is_err());
    }

    #[test]
    fn test_base_url_trims_slash() {
        let options = ExchangeOptions {
            base_url: Some("http://127.0.0.1:9000/".into()),
            ..Default::default()
        };
        assert_eq!(options.base_url_or("https://api.binance.com"), "http://127.0.0.1:9000");
        assert_eq!(
            ExchangeOptions::default().base_url_or("https://api.binance.com"),
            "https://api.binance.com"
        );
    }
}
