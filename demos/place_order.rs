//! Place and cancel a post-only order on testnet.
//!
//! Reads `HYPERLIQUID_PRIVATE_KEY` (and the other `HYPERLIQUID_*` settings)
//! from the environment or a `.env` file.

use anyhow::{bail, Context, Result};
use lotusx_hyperliquid::exchanges::hyperliquid::{OrderStatus, TimeInForce};
use lotusx_hyperliquid::{ExchangeConfig, HyperliquidClient, OrderRequest};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    #[cfg(feature = "env-file")]
    let config = ExchangeConfig::from_env_file("HYPERLIQUID")?;
    #[cfg(not(feature = "env-file"))]
    let config = ExchangeConfig::from_env("HYPERLIQUID")?;

    if !config.has_credentials() {
        bail!("set HYPERLIQUID_PRIVATE_KEY to run this demo");
    }
    let client = HyperliquidClient::new(config.testnet(true))?;
    info!(wallet = ?client.wallet_address(), "client ready");

    let asset = client.asset_id("ETH").await?;
    let mid: f64 = client
        .all_mids()
        .await?
        .get("ETH")
        .context("no ETH mid price")?
        .parse()?;

    // well below the market so it rests
    let price = (mid * 0.5).round();
    let order = OrderRequest::limit(asset, true, price, 0.01).with_tif(TimeInForce::Alo);
    let response = client.place_order(&order).await?;
    println!("📤 place: {:?}", response);

    for status in response.statuses() {
        if let OrderStatus::Resting { resting } = status {
            let cancel = client.cancel_order(asset, resting.oid).await?;
            println!("🗑️  cancel {}: {:?}", resting.oid, cancel);
        }
    }

    let open = client.open_orders(None).await?;
    println!("📋 {} open orders", open.len());
    Ok(())
}
