//! Binance spot REST API

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::signing::sign_query;
use super::{ExchangeOptions, TickerService, is_unavailable, parse_price};
use crate::error::{FeedError, Result};
use crate::model::{AccountSummary, Balance, Credentials};

const BINANCE_API_URL: &str = "https://api.binance.com";

/// Binance error code for an unknown or malformed symbol
const INVALID_SYMBOL: i64 = -1121;

/// Error codes meaning the key, secret or signature was refused
const AUTH_CODES: &[i64] = &[-1022, -2014, -2015];

/// Disconnected, too many requests, timeout
const UNAVAILABLE_CODES: &[i64] = &[-1001, -1003, -1007];

#[derive(Debug, Deserialize)]
struct TickerPrice {
    symbol: String,
    price: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    account_type: String,
    balances: Vec<RawBalance>,
}

#[derive(Debug, Deserialize)]
struct RawBalance {
    asset: String,
    free: Decimal,
    locked: Decimal,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}

/// Binance public and signed endpoints
pub struct BinanceRest {
    client: Client,
    base_url: String,
    recv_window_ms: u64,
}

impl BinanceRest {
    pub fn new(options: &ExchangeOptions) -> Result<Self> {
        Ok(Self {
            client: options.http_client()?,
            base_url: options.base_url_or(BINANCE_API_URL),
            recv_window_ms: options.recv_window_ms,
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        api_key: Option<&str>,
    ) -> Result<T> {
        let mut request = self.client.get(format!("{}{path}", self.base_url));
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(key) = api_key {
            request = request.header("X-MBX-APIKEY", key);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(api_error(status, &bytes));
        }

        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Classify a non-2xx Binance response
fn api_error(status: StatusCode, body: &[u8]) -> FeedError {
    let parsed = serde_json::from_slice::<ApiError>(body);

    if is_unavailable(status) {
        let detail = parsed.map(|err| format!(" ({}: {})", err.code, err.msg)).unwrap_or_default();
        return FeedError::Transport(format!("Binance returned HTTP {status}{detail}"));
    }

    match parsed {
        Ok(err) if UNAVAILABLE_CODES.contains(&err.code) => {
            FeedError::Transport(format!("Binance error {}: {}", err.code, err.msg))
        }
        Ok(err) if AUTH_CODES.contains(&err.code) => FeedError::Auth(err.msg),
        Ok(err) => FeedError::Venue {
            code: err.code.to_string(),
            message: err.msg,
        },
        Err(_) if status == StatusCode::UNAUTHORIZED => {
            FeedError::Auth(String::from_utf8_lossy(body).into_owned())
        }
        Err(_) => FeedError::Venue {
            code: status.as_u16().to_string(),
            message: String::from_utf8_lossy(body).into_owned(),
        },
    }
}

fn collect_prices(tickers: Vec<TickerPrice>) -> HashMap<String, f64> {
    tickers
        .into_iter()
        .filter_map(|t| match parse_price(&t.symbol, &t.price) {
            Ok(price) => Some((t.symbol, price)),
            Err(e) => {
                tracing::debug!(error = %e, "skipping Binance ticker");
                None
            }
        })
        .collect()
}

#[async_trait]
impl TickerService for BinanceRest {
    async fn fetch_ticker(&self, symbol: &str) -> Result<f64> {
        let ticker: TickerPrice = self
            .get("/api/v3/ticker/price", &[("symbol", symbol.to_string())], None)
            .await
            .map_err(|e| match e {
                FeedError::Venue { code, .. } if code == INVALID_SYMBOL.to_string() => {
                    FeedError::UnknownSymbol(symbol.to_string())
                }
                other => other,
            })?;

        parse_price(&ticker.symbol, &ticker.price)
    }

    async fn fetch_tickers(&self, symbols: Option<&[String]>) -> Result<HashMap<String, f64>> {
        let query = match symbols {
            Some(symbols) => vec![("symbols", serde_json::to_string(symbols)?)],
            None => Vec::new(),
        };

        let tickers: Vec<TickerPrice> = self.get("/api/v3/ticker/price", &query, None).await?;
        Ok(collect_prices(tickers))
    }

    async fn load_markets(&self) -> Result<HashSet<String>> {
        let info: ExchangeInfo = self.get("/api/v3/exchangeInfo", &[], None).await?;

        Ok(info
            .symbols
            .into_iter()
            .filter(|s| s.status == "TRADING")
            .map(|s| s.symbol)
            .collect())
    }

    async fn account(&self, credentials: &Credentials) -> Result<AccountSummary> {
        let query = format!(
            "recvWindow={}&timestamp={}",
            self.recv_window_ms,
            Utc::now().timestamp_millis()
        );
        let signature = sign_query(&credentials.api_secret, &query)?;

        let path = format!("/api/v3/account?{query}&signature={signature}");
        let account: AccountResponse = self.get(&path, &[], Some(&credentials.api_key)).await?;

        let balances = account
            .balances
            .into_iter()
            .map(|b| Balance {
                asset: b.asset,
                free: b.free,
                locked: b.locked,
            })
            .collect();

        Ok(AccountSummary::from_balances(account.account_type, balances))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_symbol_payload_is_venue_error() {
        let err = api_error(
            StatusCode::BAD_REQUEST,
            br#"{"code":-1121,"msg":"Invalid symbol."}"#,
        );
        assert!(matches!(err, FeedError::Venue { ref code, .. } if code == "-1121"));
        assert!(!err.is_transport());
    }

    #[test]
    fn test_gateway_errors_are_transport() {
        let err = api_error(StatusCode::BAD_GATEWAY, b"<html>bad gateway</html>");
        assert!(err.is_transport());
    }

    #[test]
    fn test_json_bodied_throttle_is_transport() {
        let limited = api_error(
            StatusCode::TOO_MANY_REQUESTS,
            br#"{"code":-1003,"msg":"Too many requests; current limit is 6000 request weight per 1 MINUTE."}"#,
        );
        assert!(limited.is_transport());
        assert!(limited.to_string().contains("-1003"));

        let down = api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            br#"{"code":-1001,"msg":"Internal error; unable to process your request."}"#,
        );
        assert!(down.is_transport());

        let banned = api_error(StatusCode::IM_A_TEAPOT, br#"{"code":-1003,"msg":"Way too many requests."}"#);
        assert!(banned.is_transport());
    }

    #[test]
    fn test_rejected_key_is_auth_error() {
        let err = api_error(
            StatusCode::UNAUTHORIZED,
            br#"{"code":-2015,"msg":"Invalid API-key, IP, or permissions for action."}"#,
        );
        assert!(matches!(err, FeedError::Auth(_)));
    }

    #[test]
    fn test_collect_prices_skips_garbage() {
        let prices = collect_prices(vec![
            TickerPrice { symbol: "BTCUSDT".into(), price: "65000.00".into() },
            TickerPrice { symbol: "BADUSDT".into(), price: "n/a".into() },
        ]);
        assert_eq!(prices.len(), 1);
        assert_eq!(prices["BTCUSDT"], 65000.0);
    }
}
