//! Symbol Translation
//!
//! Each backend spells trading pairs its own way. A [`SymbolMap`] converts
//! between the canonical form used everywhere in this crate (`BTCUSDT`) and
//! the venue-native form (`BTC-USDT` on OKX, `BTC` on the mock venue).
//!
//! Lookups go through an explicit table first. Symbols missing from the
//! table are translated mechanically by the map's [`FallbackRule`].

use std::collections::HashMap;

use crate::model::Symbol;

/// Length of the quote asset assumed by the mechanical fallback rules.
///
/// Correct for USDT/USDC/BUSD quoted pairs only. `ETHBTC` becomes `ET-HBTC`.
pub const QUOTE_LEN: usize = 4;

/// How to translate a symbol absent from the explicit table
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FallbackRule {
    /// Native spelling equals canonical spelling
    Identity,

    /// Insert `separator` before the last [`QUOTE_LEN`] characters
    SplitQuote { separator: char },

    /// Venue quotes everything in one asset: drop the canonical quote and
    /// append `native_suffix` instead
    FixedQuote {
        canonical_quote: String,
        native_suffix: String,
    },
}

/// Bidirectional canonical/native symbol mapping for one backend
#[derive(Clone, Debug)]
pub struct SymbolMap {
    to_native: HashMap<Symbol, String>,
    to_canonical: HashMap<String, Symbol>,
    fallback: FallbackRule,
}

/// Pairs listed explicitly for the OKX/OKCoin backend
const OKCOIN_PAIRS: &[(&str, &str)] = &[
    ("BTCUSDT", "BTC-USDT"),
    ("ETHUSDT", "ETH-USDT"),
    ("LTCUSDT", "LTC-USDT"),
    ("XRPUSDT", "XRP-USDT"),
    ("ETCUSDT", "ETC-USDT"),
    ("BCHUSDT", "BCH-USDT"),
    ("EOSUSDT", "EOS-USDT"),
    ("BSVUSDT", "BSV-USDT"),
    ("TRXUSDT", "TRX-USDT"),
    ("ADAUSDT", "ADA-USDT"),
    ("DOGEUSDT", "DOGE-USDT"),
    ("SOLUSDT", "SOL-USDT"),
    ("DOTUSDT", "DOT-USDT"),
    ("MATICUSDT", "MATIC-USDT"),
    ("BNBUSDT", "BNB-USDT"),
];

impl SymbolMap {
    pub fn new(fallback: FallbackRule) -> Self {
        Self {
            to_native: HashMap::new(),
            to_canonical: HashMap::new(),
            fallback,
        }
    }

    /// Add explicit pairs on top of the fallback rule
    pub fn with_pairs<'a>(mut self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        for (canonical, native) in pairs {
            self.insert(canonical, native);
        }
        self
    }

    pub fn insert(&mut self, canonical: &str, native: &str) {
        let canonical = Symbol::new(canonical);
        self.to_canonical.insert(native.to_string(), canonical.clone());
        self.to_native.insert(canonical, native.to_string());
    }

    /// Binance spells pairs canonically
    pub fn binance() -> Self {
        Self::new(FallbackRule::Identity)
    }

    pub fn okcoin() -> Self {
        Self::new(FallbackRule::SplitQuote { separator: '-' }).with_pairs(OKCOIN_PAIRS.iter().copied())
    }

    /// The mock venue lists bare base assets quoted in USDT
    pub fn mock() -> Self {
        Self::new(FallbackRule::FixedQuote {
            canonical_quote: "USDT".into(),
            native_suffix: String::new(),
        })
    }

    pub const fn fallback(&self) -> &FallbackRule {
        &self.fallback
    }

    /// Canonical symbols that have an explicit native spelling
    pub fn explicit_symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.to_native.keys()
    }

    /// Translate a canonical symbol into the venue's spelling
    pub fn to_backend(&self, canonical: &Symbol) -> String {
        if let Some(native) = self.to_native.get(canonical) {
            return native.clone();
        }

        let symbol = canonical.as_str();
        match &self.fallback {
            FallbackRule::Identity => symbol.to_string(),
            FallbackRule::SplitQuote { separator } => {
                // Already native
                if symbol.contains(*separator) {
                    return symbol.to_string();
                }
                split_quote(symbol)
                    .map_or_else(|| symbol.to_string(), |(base, quote)| format!("{base}{separator}{quote}"))
            }
            FallbackRule::FixedQuote {
                canonical_quote,
                native_suffix,
            } => {
                if !native_suffix.is_empty()
                    && symbol.ends_with(native_suffix.as_str())
                    && !symbol.ends_with(canonical_quote.as_str())
                {
                    return symbol.to_string();
                }
                let base = symbol
                    .strip_suffix(canonical_quote.as_str())
                    .filter(|base| !base.is_empty())
                    .or_else(|| split_quote(symbol).map(|(base, _)| base))
                    .unwrap_or(symbol);
                format!("{base}{native_suffix}")
            }
        }
    }

    /// Translate a venue spelling back into canonical form
    pub fn to_canonical(&self, native: &str) -> Symbol {
        if let Some(canonical) = self.to_canonical.get(native) {
            return canonical.clone();
        }

        match &self.fallback {
            FallbackRule::Identity => Symbol::new(native),
            FallbackRule::SplitQuote { separator } => Symbol::new(native.replace(*separator, "")),
            FallbackRule::FixedQuote {
                canonical_quote,
                native_suffix,
            } => {
                let base = if native_suffix.is_empty() {
                    Some(native)
                } else {
                    native.strip_suffix(native_suffix.as_str())
                };
                match base {
                    Some(base) if !base.is_empty() => Symbol::new(format!("{base}{canonical_quote}")),
                    _ => Symbol::new(native),
                }
            }
        }
    }
}

/// Split off the trailing quote asset, if the symbol is long enough to have one
fn split_quote(symbol: &str) -> Option<(&str, &str)> {
    let cut = symbol.len().checked_sub(QUOTE_LEN)?;
    if cut == 0 || !symbol.is_char_boundary(cut) {
        return None;
    }
    Some(symbol.split_at(cut))
}
