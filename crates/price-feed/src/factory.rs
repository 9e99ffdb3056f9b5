//! Exchange Factory

use std::sync::Arc;

use crate::error::Result;
use crate::exchange::{Exchange, ExchangeClient, ExchangeOptions, Venue};
use crate::model::Credentials;

/// Build an exchange backend by name with default options.
///
/// Names are matched case-insensitively against `binance`, `okcoin` (alias
/// `okx`) and `mock`. Credentials are attached only when both halves are
/// non-empty. No network calls are made here.
pub fn create_exchange_api(
    exchange_name: &str,
    api_key: Option<&str>,
    api_secret: Option<&str>,
) -> Result<Arc<dyn ExchangeClient>> {
    create_exchange_with(
        exchange_name,
        Credentials::from_parts(api_key, api_secret),
        &ExchangeOptions::default(),
    )
}

/// Build an exchange backend by name with explicit options
pub fn create_exchange_with(
    exchange_name: &str,
    credentials: Option<Credentials>,
    options: &ExchangeOptions,
) -> Result<Arc<dyn ExchangeClient>> {
    let venue: Venue = exchange_name.parse()?;
    let exchange = Exchange::connect(venue, credentials, options)?;

    tracing::info!(
        exchange = %venue,
        authenticated = exchange.has_credentials(),
        "exchange backend created"
    );

    Ok(Arc::new(exchange))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedError;

    #[test]
    fn test_unknown_exchange_is_rejected() {
        let Err(err) = create_exchange_api("unknown", None, None) else {
            panic!("unknown exchange name was accepted");
        };
        assert!(matches!(err, FeedError::UnsupportedExchange(ref name) if name == "unknown"));
        assert!(err.to_string().contains("unknown"));
    }

    #[test]
    fn test_known_exchanges() {
        for name in ["binance", "BINANCE", "okcoin", "OkCoin", "okx", "mock"] {
            let exchange = create_exchange_api(name, None, None).unwrap();
            assert_eq!(exchange.name(), name.parse::<Venue>().unwrap().as_str());
        }

        for venue in Venue::ALL {
            let exchange = create_exchange_api(venue.as_str(), Some("key"), Some("secret")).unwrap();
            assert_eq!(exchange.name(), venue.as_str());
        }
    }
}
