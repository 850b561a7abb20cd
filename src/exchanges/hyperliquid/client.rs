use super::builder::HyperliquidBuilder;
use super::rest::HyperliquidRest;
use super::subscription::{InboundMessage, Subscription};
#[allow(clippy::wildcard_imports)]
use super::types::*;
use super::websocket::HyperliquidStream;
use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::ReqwestRest;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Reads, signed writes and the optional stream behind one configuration
#[derive(Debug)]
pub struct HyperliquidClient {
    rest: HyperliquidRest<ReqwestRest>,
    stream: Option<HyperliquidStream>,
    asset_ids: RwLock<HashMap<String, u32>>,
}

impl HyperliquidClient {
    /// REST-only client for `config`
    pub fn new(config: ExchangeConfig) -> Result<Self, ExchangeError> {
        HyperliquidBuilder::new(config).build()
    }

    pub(crate) fn from_parts(
        rest: HyperliquidRest<ReqwestRest>,
        stream: Option<HyperliquidStream>,
    ) -> Self {
        Self {
            rest,
            stream,
            asset_ids: RwLock::new(HashMap::new()),
        }
    }

    pub fn rest(&self) -> &HyperliquidRest<ReqwestRest> {
        &self.rest
    }

    pub fn can_sign(&self) -> bool {
        self.rest.can_sign()
    }

    pub fn wallet_address(&self) -> Option<&str> {
        self.rest.wallet_address()
    }

    fn account<'a>(&'a self, user: Option<&'a str>) -> Result<&'a str, ExchangeError> {
        user.or_else(|| self.wallet_address()).ok_or_else(|| {
            ExchangeError::invalid("no user given and no wallet address configured")
        })
    }

    /// Perp account summary of `user`, or of the configured wallet
    pub async fn user_state(&self, user: Option<&str>) -> Result<UserState, ExchangeError> {
        self.rest.user_state(self.account(user)?).await
    }

    pub async fn spot_user_state(&self, user: Option<&str>) -> Result<SpotUserState, ExchangeError> {
        self.rest.spot_user_state(self.account(user)?).await
    }

    pub async fn open_orders(&self, user: Option<&str>) -> Result<Vec<OpenOrder>, ExchangeError> {
        self.rest.open_orders(self.account(user)?).await
    }

    pub async fn meta(&self) -> Result<Meta, ExchangeError> {
        self.rest.meta().await
    }

    pub async fn spot_meta(&self) -> Result<SpotMeta, ExchangeError> {
        self.rest.spot_meta().await
    }

    pub async fn all_mids(&self) -> Result<HashMap<String, String>, ExchangeError> {
        self.rest.all_mids().await
    }

    pub async fn candle_snapshot(
        &self,
        coin: &str,
        interval: &str,
        start_time: Option<u64>,
        end_time: Option<u64>,
    ) -> Result<Vec<Candle>, ExchangeError> {
        self.rest
            .candle_snapshot(coin, interval, start_time, end_time)
            .await
    }

    pub async fn l2_snapshot(&self, coin: &str) -> Result<L2Book, ExchangeError> {
        self.rest.l2_snapshot(coin).await
    }

    /// Numeric asset id of a perp symbol, from the `meta` universe.
    ///
    /// The universe is fetched once and cached for the life of the client.
    #[instrument(skip(self), fields(exchange = "hyperliquid"))]
    pub async fn asset_id(&self, symbol: &str) -> Result<u32, ExchangeError> {
        let key = symbol.to_lowercase();
        if let Some(id) = self.asset_ids.read().await.get(&key) {
            return Ok(*id);
        }

        let meta = self.rest.meta().await?;
        let mut asset_ids = self.asset_ids.write().await;
        for (index, asset) in meta.universe.iter().enumerate() {
            if let Ok(id) = u32::try_from(index) {
                asset_ids.insert(asset.name.to_lowercase(), id);
            }
        }
        debug!(assets = asset_ids.len(), "asset universe cached");

        asset_ids
            .get(&key)
            .copied()
            .ok_or_else(|| ExchangeError::invalid(format!("unknown coin {}", symbol)))
    }

    /// Sign and submit one order; the coin must already be an asset id
    pub async fn place_order(&self, order: &OrderRequest) -> Result<ExchangeResponse, ExchangeError> {
        self.rest.place_order(order).await
    }

    pub async fn bulk_orders(
        &self,
        orders: &[OrderRequest],
        grouping: Grouping,
    ) -> Result<ExchangeResponse, ExchangeError> {
        self.rest.bulk_orders(orders, grouping).await
    }

    pub async fn modify_order(
        &self,
        oid: u64,
        order: &OrderRequest,
    ) -> Result<ExchangeResponse, ExchangeError> {
        self.rest.modify_order(oid, order).await
    }

    pub async fn cancel_order(&self, asset: u32, oid: u64) -> Result<ExchangeResponse, ExchangeError> {
        self.rest.cancel_order(asset, oid).await
    }

    /// The stream, when the client was built with one
    pub fn stream(&self) -> Option<&HyperliquidStream> {
        self.stream.as_ref()
    }

    fn require_stream(&self) -> Result<&HyperliquidStream, ExchangeError> {
        self.stream.as_ref().ok_or(ExchangeError::NotConnected)
    }

    pub async fn connect_stream(&self) -> Result<(), ExchangeError> {
        self.require_stream()?.connect().await
    }

    pub async fn subscribe<F>(
        &self,
        subscription: Subscription,
        callback: F,
    ) -> Result<String, ExchangeError>
    where
        F: Fn(&InboundMessage) + Send + Sync + 'static,
    {
        self.require_stream()?
            .subscribe(subscription, callback)
            .await
    }

    pub async fn unsubscribe(&self, subscription: &Subscription) -> Result<(), ExchangeError> {
        self.require_stream()?.unsubscribe(subscription).await
    }

    pub async fn close_stream(&self) -> Result<(), ExchangeError> {
        match &self.stream {
            Some(stream) => stream.close().await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_only_client_has_no_account() {
        let client = HyperliquidClient::new(ExchangeConfig::read_only()).unwrap();
        assert!(!client.can_sign());
        assert!(client.stream().is_none());

        let err = client.open_orders(None).await.unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn test_stream_calls_without_stream() {
        let client = HyperliquidClient::new(ExchangeConfig::read_only()).unwrap();
        assert!(matches!(
            client.subscribe(Subscription::AllMids, |_| {}).await,
            Err(ExchangeError::NotConnected)
        ));
        client.close_stream().await.unwrap();
    }

    #[tokio::test]
    async fn test_place_order_with_symbol_fails_before_signing() {
        let client = HyperliquidClient::new(ExchangeConfig::read_only()).unwrap();
        // no key configured: a symbol still fails validation first
        let err = client
            .place_order(&OrderRequest::limit("ETH", true, 2_000.0, 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn test_place_order_without_key() {
        let client = HyperliquidClient::new(ExchangeConfig::read_only()).unwrap();
        let err = client
            .place_order(&OrderRequest::limit(1, true, 2_000.0, 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::KeyError(_)));
    }
}
