pub mod core;
pub mod exchanges;

pub use crate::core::{config::ExchangeConfig, errors::ExchangeError};
pub use exchanges::hyperliquid::{
    HyperliquidBuilder, HyperliquidClient, HyperliquidStream, OrderRequest, Subscription,
};
