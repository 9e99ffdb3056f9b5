//! Domain Models
//!
//! Core data types shared by every exchange backend. Ticker prices are `f64`
//! because venues publish them at float precision; account balances use
//! `rust_decimal` since they are summed.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Canonical trading-pair identifier (e.g., "BTCUSDT")
///
/// Always upper-case with surrounding whitespace removed. Backend-native
/// spellings never appear in this type.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(symbol: impl AsRef<str>) -> Self {
        Self(symbol.as_ref().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Symbol {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Latest known price per canonical symbol
pub type PriceTable = BTreeMap<Symbol, f64>;

/// Immutable view of the poller's shared table
///
/// A new snapshot is built for every successful cycle and swapped in whole,
/// so readers never observe a half-populated table.
#[derive(Clone, Debug, Default)]
pub struct PriceSnapshot {
    pub prices: Arc<PriceTable>,

    /// When `prices` was fetched; `None` until the first cycle completes
    pub updated_at: Option<DateTime<Utc>>,
}

impl PriceSnapshot {
    pub fn new(prices: PriceTable) -> Self {
        Self {
            prices: Arc::new(prices),
            updated_at: Some(Utc::now()),
        }
    }

    pub fn price(&self, symbol: &str) -> Option<f64> {
        self.prices.get(symbol).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Exchange API key pair
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    #[serde(skip_serializing)]
    pub api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Build credentials only when both halves are present and non-empty
    pub fn from_parts(api_key: Option<&str>, api_secret: Option<&str>) -> Option<Self> {
        match (api_key.map(str::trim), api_secret.map(str::trim)) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Some(Self::new(key, secret))
            }
            _ => None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Holdings of one asset
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
}

impl Balance {
    pub fn total(&self) -> Decimal {
        self.free + self.locked
    }
}

/// Result of a signed account query
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountSummary {
    /// Venue account classification (e.g., "SPOT")
    pub account_type: String,

    /// Non-zero balances only
    pub balances: Vec<Balance>,

    /// Sum of free and locked amounts across every asset
    pub total_balance: Decimal,
}

impl AccountSummary {
    /// Build a summary, dropping empty balances and computing the total
    pub fn from_balances(account_type: impl Into<String>, balances: Vec<Balance>) -> Self {
        let balances: Vec<Balance> = balances
            .into_iter()
            .filter(|b| !b.total().is_zero())
            .collect();
        let total_balance = balances.iter().map(Balance::total).sum();

        Self {
            account_type: account_type.into(),
            balances,
            total_balance,
        }
    }
}
