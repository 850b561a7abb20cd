use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{RateLimiter, ReqwestRest, RestClientBuilder, RestClientConfig, WsConfig};
use crate::exchanges::hyperliquid::client::HyperliquidClient;
use crate::exchanges::hyperliquid::rest::HyperliquidRest;
use crate::exchanges::hyperliquid::signer::HyperliquidSigner;
use crate::exchanges::hyperliquid::websocket::HyperliquidStream;
use std::sync::Arc;
use tracing::debug;

/// Builder for creating Hyperliquid clients
pub struct HyperliquidBuilder {
    config: ExchangeConfig,
    ws_config: Option<WsConfig>,
    rate_limiter: Option<Arc<RateLimiter>>,
}

impl HyperliquidBuilder {
    /// Create a new builder with the provided config
    pub fn new(config: ExchangeConfig) -> Self {
        Self {
            config,
            ws_config: None,
            rate_limiter: None,
        }
    }

    /// Attach a stream connection with default tuning
    pub fn with_websocket(self) -> Self {
        self.with_ws_config(WsConfig::default())
    }

    pub fn with_ws_config(mut self, ws_config: WsConfig) -> Self {
        self.ws_config = Some(ws_config);
        self
    }

    /// Share one request budget between several clients
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    /// Validate the configuration and assemble the client.
    ///
    /// A malformed private key fails here with `KeyError`, before any I/O.
    pub fn build(self) -> Result<HyperliquidClient, ExchangeError> {
        self.config.validate()?;

        let rest = self.build_hyperliquid_rest(self.build_rest_client()?)?;
        let stream = self
            .ws_config
            .map(|ws_config| HyperliquidStream::new(self.config.stream_url(), ws_config));

        debug!(
            mainnet = self.config.is_mainnet(),
            can_sign = rest.can_sign(),
            stream = stream.is_some(),
            "hyperliquid client built"
        );
        Ok(HyperliquidClient::from_parts(rest, stream))
    }

    fn build_rest_client(&self) -> Result<ReqwestRest, ExchangeError> {
        let rest_config = RestClientConfig::new(
            self.config.rest_url().to_string(),
            "hyperliquid".to_string(),
        )
        .with_requests_per_minute(self.config.requests_per_minute);

        let mut rest_builder = RestClientBuilder::new(rest_config);
        if let Some(rate_limiter) = &self.rate_limiter {
            rest_builder = rest_builder.with_rate_limiter(Arc::clone(rate_limiter));
        }
        rest_builder.build()
    }

    fn build_hyperliquid_rest(
        &self,
        rest_client: ReqwestRest,
    ) -> Result<HyperliquidRest<ReqwestRest>, ExchangeError> {
        let signer = match self.config.private_key() {
            Some(private_key) if !private_key.is_empty() => {
                Some(HyperliquidSigner::with_private_key(private_key)?)
            }
            _ => None,
        };

        let mut hyperliquid_rest =
            HyperliquidRest::new(rest_client, signer, self.config.is_mainnet());
        if let Some(wallet_address) = &self.config.wallet_address {
            hyperliquid_rest = hyperliquid_rest.with_wallet_address(wallet_address.clone());
        }
        if let Some(vault_address) = &self.config.vault_address {
            hyperliquid_rest = hyperliquid_rest.with_vault_address(vault_address.clone());
        }

        Ok(hyperliquid_rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::TESTNET_WS_URL;
    use crate::exchanges::hyperliquid::websocket::ConnectionState;

    const KEY: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn test_read_only_build() {
        let client = HyperliquidBuilder::new(ExchangeConfig::read_only())
            .build()
            .unwrap();
        assert!(!client.can_sign());
        assert!(client.stream().is_none());
        assert!(client.rest().is_mainnet());
    }

    #[test]
    fn test_build_with_key_derives_wallet() {
        let client = HyperliquidBuilder::new(ExchangeConfig::new(KEY.to_string()))
            .build()
            .unwrap();
        assert!(client.can_sign());
        assert_eq!(
            client.wallet_address(),
            Some("0x7e5f4552091a69125d5dfcb7b8c2659029395bdf")
        );
    }

    #[test]
    fn test_invalid_key_fails_build() {
        let err = HyperliquidBuilder::new(ExchangeConfig::new("0xnothex".to_string()))
            .build()
            .unwrap_err();
        assert!(matches!(err, ExchangeError::KeyError(_)));
    }

    #[test]
    fn test_zero_rate_fails_build() {
        let config = ExchangeConfig::read_only().requests_per_minute(0);
        let err = HyperliquidBuilder::new(config).build().unwrap_err();
        assert!(matches!(err, ExchangeError::ConfigError(_)));
    }

    #[test]
    fn test_testnet_stream() {
        let client = HyperliquidBuilder::new(ExchangeConfig::read_only().testnet(true))
            .with_websocket()
            .build()
            .unwrap();
        let stream = client.stream().unwrap();
        assert_eq!(stream.url(), TESTNET_WS_URL);
        assert_eq!(stream.state(), ConnectionState::Disconnected);
        assert!(!client.rest().is_mainnet());
    }

    #[test]
    fn test_vault_and_wallet_from_config() {
        let vault = "0x3333333333333333333333333333333333333333";
        let wallet = "0x4444444444444444444444444444444444444444";
        let config = ExchangeConfig::new(KEY.to_string())
            .vault_address(vault.to_string())
            .wallet_address(wallet.to_string());
        let client = HyperliquidBuilder::new(config).build().unwrap();
        assert_eq!(client.rest().vault_address(), Some(vault));
        assert_eq!(client.wallet_address(), Some(wallet));
    }
}
