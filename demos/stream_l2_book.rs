//! Stream the BTC book from testnet for half a minute.
//!
//! ```sh
//! cargo run --example stream_l2_book
//! ```

use anyhow::Result;
use lotusx_hyperliquid::exchanges::hyperliquid::InboundMessage;
use lotusx_hyperliquid::{ExchangeConfig, HyperliquidBuilder, Subscription};
use std::time::Duration;
use tracing::{info, warn};

fn print_book(message: &InboundMessage) {
    let best = |side: usize| {
        message.data["levels"][side][0]["px"]
            .as_str()
            .unwrap_or("-")
            .to_string()
    };
    println!("📖 {} bid {} / ask {}", message.data["coin"], best(0), best(1));
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let client = HyperliquidBuilder::new(ExchangeConfig::read_only().testnet(true))
        .with_websocket()
        .build()?;

    let mids = client.all_mids().await?;
    info!(coins = mids.len(), "mid prices loaded");

    client.connect_stream().await?;
    let identifier = client
        .subscribe(Subscription::l2_book("BTC"), print_book)
        .await?;
    info!(%identifier, "subscribed");

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(30)) => {}
        _ = tokio::signal::ctrl_c() => warn!("interrupted"),
    }

    client.close_stream().await?;
    println!("✅ stream closed");
    Ok(())
}
