pub mod builder;
pub mod client;
pub mod codec;
pub mod rest;
pub mod signer;
pub mod subscription;
pub mod types;
pub mod websocket;
pub mod wire;

// Re-export main types for easier importing
pub use builder::HyperliquidBuilder;
pub use client::HyperliquidClient;
pub use codec::HyperliquidCodec;
pub use rest::HyperliquidRest;
pub use signer::HyperliquidSigner;
pub use subscription::{InboundMessage, Subscription, SubscriptionRouter};
pub use types::{
    Action, Candle, Coin, ExchangeResponse, Grouping, L2Book, Meta, OpenOrder, OrderRequest,
    OrderStatus, OrderType, Signature, SpotMeta, SpotUserState, TimeInForce, Tpsl, UserState,
};
pub use websocket::{ConnectionState, HyperliquidStream};
