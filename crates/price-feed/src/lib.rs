//! # price-feed
//!
//! Background ticker polling over pluggable exchange backends, plus
//! credential-checked account lookup.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  create_exchange_api("okcoin", key, secret)                  │
//! │        │                                                     │
//! │        ▼                                                     │
//! │  ┌──────────────┐   ┌────────────┐   ┌────────────────────┐  │
//! │  │ PricePoller  │──▶│  Exchange  │──▶│  TickerService     │  │
//! │  │ (tokio task) │   │ SymbolMap  │   │  Binance / OKX /   │  │
//! │  │ watch<Snap>  │   │ fetch chain│   │  static (mock)     │  │
//! │  └──────────────┘   └────────────┘   └────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Prices are keyed by canonical symbol (`BTCUSDT`) everywhere; each backend
//! translates to its own spelling internally. Remote failures never reach
//! the caller: a missing symbol in the table is the error signal. The one
//! hard failure is asking the factory for an exchange it does not know.
//!
//! ## Example
//!
//! ```no_run
//! # async fn run() -> price_feed::Result<()> {
//! use std::sync::Arc;
//! use std::time::Duration;
//! use price_feed::{create_exchange_api, PricePoller};
//!
//! let exchange = create_exchange_api("binance", None, None)?;
//! let poller = PricePoller::new(exchange);
//!
//! poller
//!     .start_price_update(
//!         ["BTCUSDT", "ETHUSDT"],
//!         Some(Arc::new(|prices: &price_feed::PriceTable| println!("{prices:?}"))),
//!         Duration::from_secs(5),
//!     )
//!     .await;
//! // ...
//! poller.stop_price_update().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod exchange;
pub mod factory;
pub mod fetcher;
pub mod model;
pub mod poller;
pub mod symbol;

pub use error::{FeedError, Result};
pub use exchange::{Exchange, ExchangeClient, ExchangeOptions, TickerService, Venue};
pub use factory::{create_exchange_api, create_exchange_with};
pub use model::{AccountSummary, Balance, Credentials, PriceSnapshot, PriceTable, Symbol};
pub use poller::{PriceCallback, PricePoller};
pub use symbol::{FallbackRule, SymbolMap};
