//! Exchange-agnostic transport layer
//!
//! The kernel holds only transport logic: a rate-limited JSON-over-POST
//! client, the token bucket that gates it, socket connect/reconnect helpers
//! and the frame codec contract. Anything that knows about a particular
//! exchange's payloads lives under `crate::exchanges`.
//!
//! ```rust,no_run
//! use lotusx_hyperliquid::core::kernel::{RestClient, RestClientBuilder, RestClientConfig};
//!
//! # async fn example() -> Result<(), lotusx_hyperliquid::ExchangeError> {
//! let config = RestClientConfig::new(
//!     "https://api.hyperliquid.xyz".to_string(),
//!     "hyperliquid".to_string(),
//! )
//! .with_requests_per_minute(60);
//! let rest = RestClientBuilder::new(config).build()?;
//! let mids = rest.post("/info", &serde_json::json!({"type": "allMids"})).await?;
//! # let _ = mids;
//! # Ok(())
//! # }
//! ```
pub mod codec;
pub mod rate_limiter;
pub mod rest;
pub mod ws;

pub use codec::WsCodec;
pub use rate_limiter::RateLimiter;
pub use rest::{ReqwestRest, RestClient, RestClientBuilder, RestClientConfig};
pub use ws::{WsConfig, WsSink, WsSource};
