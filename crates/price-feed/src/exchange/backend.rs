//! Venue-tagged exchange backend

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{BinanceRest, ExchangeClient, ExchangeOptions, OkxRest, StaticTickerService, TickerService};
use crate::error::{FeedError, Result};
use crate::fetcher::{MarketCache, PriceFetcher};
use crate::model::{AccountSummary, Credentials, PriceTable, Symbol};
use crate::symbol::SymbolMap;

/// Supported exchanges
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Venue {
    Binance,
    /// OKCoin was folded into OKX; both names resolve here
    OkCoin,
    /// In-memory venue with static prices
    Mock,
}

impl Venue {
    pub const ALL: [Self; 3] = [Self::Binance, Self::OkCoin, Self::Mock];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::OkCoin => "okcoin",
            Self::Mock => "mock",
        }
    }

    pub fn symbol_map(self) -> SymbolMap {
        match self {
            Self::Binance => SymbolMap::binance(),
            Self::OkCoin => SymbolMap::okcoin(),
            Self::Mock => SymbolMap::mock(),
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Venue {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "binance" => Ok(Self::Binance),
            "okcoin" | "okx" => Ok(Self::OkCoin),
            "mock" => Ok(Self::Mock),
            _ => Err(FeedError::UnsupportedExchange(s.to_string())),
        }
    }
}

/// One exchange session: symbol translation, remote venue and credentials
pub struct Exchange {
    venue: Venue,
    symbols: SymbolMap,
    service: Arc<dyn TickerService>,
    credentials: Option<Credentials>,
    markets: MarketCache,
}

impl Exchange {
    /// Wire a backend around an arbitrary ticker service
    pub fn new(venue: Venue, symbols: SymbolMap, service: Arc<dyn TickerService>) -> Self {
        Self {
            venue,
            symbols,
            service,
            credentials: None,
            markets: MarketCache::new(ExchangeOptions::default().market_ttl),
        }
    }

    /// Build the venue's default REST backend. No network calls are made.
    pub fn connect(venue: Venue, credentials: Option<Credentials>, options: &ExchangeOptions) -> Result<Self> {
        let service: Arc<dyn TickerService> = match venue {
            Venue::Binance => Arc::new(BinanceRest::new(options)?),
            Venue::OkCoin => Arc::new(OkxRest::new(options)?),
            Venue::Mock => Arc::new(StaticTickerService::demo()),
        };

        let mut exchange = Self::new(venue, venue.symbol_map(), service);
        exchange.credentials = credentials;
        exchange.markets = MarketCache::new(options.market_ttl);
        Ok(exchange)
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub const fn venue(&self) -> Venue {
        self.venue
    }

    pub const fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    pub const fn symbols(&self) -> &SymbolMap {
        &self.symbols
    }

    fn fetcher(&self) -> PriceFetcher<'_> {
        PriceFetcher::new(self.venue.as_str(), &self.symbols, self.service.as_ref(), &self.markets)
    }
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("venue", &self.venue)
            .field("authenticated", &self.has_credentials())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ExchangeClient for Exchange {
    fn name(&self) -> &str {
        self.venue.as_str()
    }

    fn to_backend(&self, symbol: &Symbol) -> String {
        self.symbols.to_backend(symbol)
    }

    fn to_canonical(&self, native: &str) -> Symbol {
        self.symbols.to_canonical(native)
    }

    async fn get_ticker_price(&self, symbol: &Symbol) -> Option<f64> {
        match self.fetcher().fetch_one(symbol).await {
            Ok(price) => Some(price),
            Err(e) => {
                warn!(exchange = self.name(), symbol = %symbol, error = %e, "failed to fetch price");
                None
            }
        }
    }

    async fn get_all_tickers(&self) -> PriceTable {
        match self.fetcher().fetch_all().await {
            Ok(prices) => prices,
            Err(e) => {
                warn!(exchange = self.name(), error = %e, "failed to fetch all tickers");
                PriceTable::new()
            }
        }
    }

    async fn try_fetch_prices(&self, symbols: &BTreeSet<Symbol>) -> Result<PriceTable> {
        self.fetcher().fetch(symbols).await
    }

    async fn account_summary(&self) -> Result<AccountSummary> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| FeedError::Auth(format!("no API credentials configured for {}", self.venue)))?;

        self.service.account(credentials).await
    }

    async fn health_check(&self) -> bool {
        match self.markets.get(self.service.as_ref()).await {
            Ok(markets) => !markets.is_empty(),
            Err(e) => {
                warn!(exchange = self.name(), error = %e, "health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccountSummary, Balance};
    use rust_decimal_macros::dec;

    #[test]
    fn test_venue_parse_is_case_insensitive() {
        assert_eq!("Binance".parse::<Venue>().unwrap(), Venue::Binance);
        assert_eq!("OKCOIN".parse::<Venue>().unwrap(), Venue::OkCoin);
        assert_eq!(" okx ".parse::<Venue>().unwrap(), Venue::OkCoin);
        assert!(matches!(
            "kraken".parse::<Venue>(),
            Err(FeedError::UnsupportedExchange(name)) if name == "kraken"
        ));
    }

    #[tokio::test]
    async fn test_mock_exchange_prices() {
        let exchange = Exchange::connect(Venue::Mock, None, &ExchangeOptions::default()).unwrap();

        let btc = exchange.get_ticker_price(&Symbol::new("BTCUSDT")).await;
        assert_eq!(btc, Some(97_500.0));
        assert_eq!(exchange.get_ticker_price(&Symbol::new("NOTREALUSDT")).await, None);

        let all = exchange.get_all_tickers().await;
        assert!(all.contains_key("ETHUSDT"));
        assert!(exchange.health_check().await);
    }

    #[tokio::test]
    async fn test_get_all_tickers_empty_on_failure() {
        let service = Arc::new(StaticTickerService::demo());
        service.set_offline(true);
        let exchange = Exchange::new(Venue::Mock, SymbolMap::mock(), service);

        assert!(exchange.get_all_tickers().await.is_empty());
        assert!(exchange.fetch_prices(&BTreeSet::new()).await.is_empty());
        assert!(!exchange.health_check().await);
    }

    #[tokio::test]
    async fn test_account_requires_credentials() {
        let summary = AccountSummary::from_balances(
            "SPOT",
            vec![Balance { asset: "USDT".into(), free: dec!(250), locked: dec!(0) }],
        );
        let service = Arc::new(StaticTickerService::demo().with_account(summary));

        let anonymous = Exchange::new(Venue::Mock, SymbolMap::mock(), service.clone());
        assert!(matches!(anonymous.verify_credentials().await, Err(FeedError::Auth(_))));

        let signed = Exchange::new(Venue::Mock, SymbolMap::mock(), service)
            .with_credentials(Credentials::new("key", "secret"));
        let account = signed.account_summary().await.unwrap();
        assert_eq!(account.total_balance, dec!(250));
        assert!(signed.verify_credentials().await.is_ok());
    }
}
