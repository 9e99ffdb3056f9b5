//! price-feed watcher
//!
//! Polls ticker prices from one exchange and logs every refresh until
//! Ctrl-C. With `API_KEY`/`API_SECRET` set, the credentials are checked
//! against the live account first.

mod config;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use price_feed::{ExchangeClient, PriceCallback, PricePoller, PriceTable, create_exchange_with};

use crate::config::FeedConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,price_feed=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = FeedConfig::from_env();
    let exchange = create_exchange_with(&config.exchange, config.credentials.clone(), &config.options)?;

    if !exchange.health_check().await {
        tracing::warn!("⚠ {} is not reachable - prices may stay empty", exchange.name());
    }

    if config.credentials.is_some() {
        match exchange.account_summary().await {
            Ok(account) => {
                tracing::info!("✓ Credentials verified ({} account)", account.account_type);
                tracing::info!("  Total balance: {}", account.total_balance);
                for balance in &account.balances {
                    tracing::info!("  {:<8} free {} / locked {}", balance.asset, balance.free, balance.locked);
                }
            }
            Err(e) => {
                tracing::warn!("⚠ Credential check failed: {}", e.user_message());
                tracing::debug!(error = %e, "account lookup failed");
            }
        }
    } else {
        tracing::info!("No API credentials set - public market data only");
    }

    let callback: PriceCallback = Arc::new(|prices: &PriceTable| {
        for (symbol, price) in prices {
            tracing::info!("  {symbol:<12} {price}");
        }
    });

    let poller = PricePoller::new(exchange);
    poller
        .start_price_update(config.symbols.clone(), Some(callback), config.interval)
        .await;

    tracing::info!(
        "Watching {} symbol(s) every {:?} - press Ctrl-C to stop",
        config.symbols.len(),
        config.interval
    );

    tokio::signal::ctrl_c().await?;
    poller.stop_price_update().await;

    Ok(())
}
