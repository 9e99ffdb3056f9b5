//! OKX (formerly OKCoin) public REST API
//!
//! OKX has no multi-instrument ticker endpoint, so a batch request pulls the
//! spot ticker list once and keeps only the requested instruments.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{ExchangeOptions, TickerService, is_unavailable, parse_price};
use crate::error::{FeedError, Result};

const OKX_API_URL: &str = "https://www.okx.com";

/// OKX error code for an instrument that does not exist
const INSTRUMENT_NOT_FOUND: &str = "51001";

/// Service unavailable, rate limited, system busy
const UNAVAILABLE_CODES: &[&str] = &["50001", "50011", "50013"];

#[derive(Debug, Deserialize)]
struct OkxResponse<T> {
    code: String,
    msg: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxTicker {
    inst_id: String,
    last: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxInstrument {
    inst_id: String,
    state: String,
}

pub struct OkxRest {
    client: Client,
    base_url: String,
}

impl OkxRest {
    pub fn new(options: &ExchangeOptions) -> Result<Self> {
        Ok(Self {
            client: options.http_client()?,
            base_url: options.base_url_or(OKX_API_URL),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .query(query)
            .send()
            .await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if is_unavailable(status) {
            return Err(FeedError::Transport(format!("OKX returned HTTP {status}")));
        }

        // Error payloads keep the envelope but may carry a non-2xx status
        let parsed: OkxResponse<T> = match serde_json::from_slice(&bytes) {
            Ok(parsed) => parsed,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => {
                return Err(FeedError::Venue {
                    code: status.as_u16().to_string(),
                    message: String::from_utf8_lossy(&bytes).into_owned(),
                });
            }
        };

        if UNAVAILABLE_CODES.contains(&parsed.code.as_str()) {
            return Err(FeedError::Transport(format!("OKX error {}: {}", parsed.code, parsed.msg)));
        }

        if parsed.code != "0" {
            return Err(FeedError::Venue {
                code: parsed.code,
                message: parsed.msg,
            });
        }

        parsed
            .data
            .ok_or_else(|| FeedError::Other(format!("OKX response for {path} has no data")))
    }

    async fn spot_tickers(&self) -> Result<Vec<OkxTicker>> {
        self.get("/api/v5/market/tickers", &[("instType", "SPOT")]).await
    }
}

fn collect_prices(tickers: Vec<OkxTicker>) -> HashMap<String, f64> {
    tickers
        .into_iter()
        .filter_map(|t| match parse_price(&t.inst_id, &t.last) {
            Ok(price) => Some((t.inst_id, price)),
            Err(e) => {
                tracing::debug!(error = %e, "skipping OKX ticker");
                None
            }
        })
        .collect()
}

#[async_trait]
impl TickerService for OkxRest {
    async fn fetch_ticker(&self, symbol: &str) -> Result<f64> {
        let tickers: Vec<OkxTicker> = self
            .get("/api/v5/market/ticker", &[("instId", symbol)])
            .await
            .map_err(|e| match e {
                FeedError::Venue { code, .. } if code == INSTRUMENT_NOT_FOUND => {
                    FeedError::UnknownSymbol(symbol.to_string())
                }
                other => other,
            })?;

        let ticker = tickers
            .into_iter()
            .next()
            .ok_or_else(|| FeedError::UnknownSymbol(symbol.to_string()))?;
        parse_price(&ticker.inst_id, &ticker.last)
    }

    async fn fetch_tickers(&self, symbols: Option<&[String]>) -> Result<HashMap<String, f64>> {
        let mut prices = collect_prices(self.spot_tickers().await?);

        if let Some(symbols) = symbols {
            let wanted: HashSet<&str> = symbols.iter().map(String::as_str).collect();
            prices.retain(|inst_id, _| wanted.contains(inst_id.as_str()));
        }

        Ok(prices)
    }

    async fn load_markets(&self) -> Result<HashSet<String>> {
        let instruments: Vec<OkxInstrument> = self
            .get("/api/v5/public/instruments", &[("instType", "SPOT")])
            .await?;

        Ok(instruments
            .into_iter()
            .filter(|i| i.state == "live")
            .map(|i| i.inst_id)
            .collect())
    }
}
