//! Runtime configuration, read from the environment (and `.env`)

use std::time::Duration;

use price_feed::{Credentials, ExchangeOptions, Symbol, poller::DEFAULT_INTERVAL};

/// Watcher configuration
#[derive(Clone, Debug)]
pub struct FeedConfig {
    /// Backend name passed to the factory
    pub exchange: String,

    /// Symbols to poll; empty polls the whole venue
    pub symbols: Vec<Symbol>,

    pub interval: Duration,

    pub credentials: Option<Credentials>,

    pub options: ExchangeOptions,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            exchange: "binance".into(),
            symbols: vec![Symbol::new("BTCUSDT"), Symbol::new("ETHUSDT")],
            interval: DEFAULT_INTERVAL,
            credentials: None,
            options: ExchangeOptions::default(),
        }
    }
}

impl FeedConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let exchange = std::env::var("EXCHANGE").unwrap_or(defaults.exchange);
        let symbols = std::env::var("SYMBOLS")
            .map(|raw| parse_symbols(&raw))
            .unwrap_or(defaults.symbols);
        let interval = std::env::var("POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|secs| *secs > 0)
            .map_or(defaults.interval, Duration::from_secs);
        let credentials = Credentials::from_parts(
            std::env::var("API_KEY").ok().as_deref(),
            std::env::var("API_SECRET").ok().as_deref(),
        );

        Self {
            exchange,
            symbols,
            interval,
            credentials,
            options: ExchangeOptions::from_env(),
        }
    }
}

/// Comma-separated list, blanks ignored
pub fn parse_symbols(raw: &str) -> Vec<Symbol> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Symbol::new)
        .collect()
}
