use super::signer::{generate_nonce, HyperliquidSigner};
#[allow(clippy::wildcard_imports)]
use super::types::*;
use crate::core::errors::ExchangeError;
use crate::core::kernel::RestClient;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, instrument};

const INFO_ENDPOINT: &str = "/info";
const EXCHANGE_ENDPOINT: &str = "/exchange";

/// Thin typed wrapper around `RestClient` for the info and exchange endpoints
#[derive(Clone, Debug)]
pub struct HyperliquidRest<R: RestClient> {
    client: R,
    signer: Option<HyperliquidSigner>,
    wallet_address: Option<String>,
    vault_address: Option<String>,
    is_mainnet: bool,
}

impl<R: RestClient> HyperliquidRest<R> {
    pub fn new(client: R, signer: Option<HyperliquidSigner>, is_mainnet: bool) -> Self {
        Self {
            client,
            signer,
            wallet_address: None,
            vault_address: None,
            is_mainnet,
        }
    }

    pub fn with_vault_address(mut self, vault_address: String) -> Self {
        self.vault_address = Some(vault_address);
        self
    }

    /// Query a different account than the signing key's own
    pub fn with_wallet_address(mut self, wallet_address: String) -> Self {
        self.wallet_address = Some(wallet_address);
        self
    }

    /// Account used by user-scoped reads
    pub fn wallet_address(&self) -> Option<&str> {
        self.wallet_address
            .as_deref()
            .or_else(|| self.signer.as_ref().map(HyperliquidSigner::wallet_address))
    }

    pub fn vault_address(&self) -> Option<&str> {
        self.vault_address.as_deref()
    }

    pub fn can_sign(&self) -> bool {
        self.signer.is_some()
    }

    pub fn is_mainnet(&self) -> bool {
        self.is_mainnet
    }

    async fn info<T: DeserializeOwned>(&self, request: &InfoRequest) -> Result<T, ExchangeError> {
        let body = serde_json::to_value(request)
            .map_err(|e| ExchangeError::encoding(format!("info request: {}", e)))?;
        self.client.post_json(INFO_ENDPOINT, &body).await
    }

    /// Perp account summary
    #[instrument(skip(self), fields(exchange = "hyperliquid", user = %user))]
    pub async fn user_state(&self, user: &str) -> Result<UserState, ExchangeError> {
        self.info(&InfoRequest::ClearinghouseState {
            user: user.to_string(),
        })
        .await
    }

    #[instrument(skip(self), fields(exchange = "hyperliquid", user = %user))]
    pub async fn spot_user_state(&self, user: &str) -> Result<SpotUserState, ExchangeError> {
        self.info(&InfoRequest::SpotClearinghouseState {
            user: user.to_string(),
        })
        .await
    }

    #[instrument(skip(self), fields(exchange = "hyperliquid", user = %user))]
    pub async fn open_orders(&self, user: &str) -> Result<Vec<OpenOrder>, ExchangeError> {
        self.info(&InfoRequest::OpenOrders {
            user: user.to_string(),
        })
        .await
    }

    #[instrument(skip(self), fields(exchange = "hyperliquid"))]
    pub async fn meta(&self) -> Result<Meta, ExchangeError> {
        self.info(&InfoRequest::Meta).await
    }

    #[instrument(skip(self), fields(exchange = "hyperliquid"))]
    pub async fn spot_meta(&self) -> Result<SpotMeta, ExchangeError> {
        self.info(&InfoRequest::SpotMeta).await
    }

    /// Mid price of every coin, keyed by symbol
    #[instrument(skip(self), fields(exchange = "hyperliquid"))]
    pub async fn all_mids(&self) -> Result<HashMap<String, String>, ExchangeError> {
        self.info(&InfoRequest::AllMids).await
    }

    /// Candles between `start_time` and `end_time` (ms).
    ///
    /// `start_time` defaults to 1, i.e. the full history, and `end_time` to now.
    #[instrument(skip(self), fields(exchange = "hyperliquid", coin = %coin, interval = %interval))]
    pub async fn candle_snapshot(
        &self,
        coin: &str,
        interval: &str,
        start_time: Option<u64>,
        end_time: Option<u64>,
    ) -> Result<Vec<Candle>, ExchangeError> {
        self.info(&InfoRequest::CandleSnapshot {
            req: CandleRequest {
                coin: coin.to_string(),
                interval: interval.to_string(),
                start_time: start_time.unwrap_or(1),
                end_time: end_time.unwrap_or_else(generate_nonce),
            },
        })
        .await
    }

    #[instrument(skip(self), fields(exchange = "hyperliquid", coin = %coin))]
    pub async fn l2_snapshot(&self, coin: &str) -> Result<L2Book, ExchangeError> {
        self.info(&InfoRequest::L2Book {
            coin: coin.to_string(),
        })
        .await
    }

    /// Signed `/exchange` body for `action` at `nonce`
    pub fn signed_payload(&self, action: &Action, nonce: u64) -> Result<Value, ExchangeError> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| ExchangeError::key("No private key configured for signing"))?;

        let vault_address = self.vault_address.as_deref();
        let signature = signer.sign_l1_action(action, nonce, vault_address, self.is_mainnet)?;
        let payload = ExchangePayload {
            action,
            signature,
            nonce,
            vault_address,
        };
        serde_json::to_value(&payload)
            .map_err(|e| ExchangeError::encoding(format!("exchange payload: {}", e)))
    }

    /// Sign `action` with a fresh millisecond nonce and submit it
    #[instrument(skip(self, action), fields(exchange = "hyperliquid", action = action.name()))]
    pub async fn submit_action(&self, action: &Action) -> Result<ExchangeResponse, ExchangeError> {
        let nonce = generate_nonce();
        let payload = self.signed_payload(action, nonce)?;
        debug!(nonce, "submitting signed action");
        self.client.post_json(EXCHANGE_ENDPOINT, &payload).await
    }

    /// Place one order. The coin must be a numeric asset id.
    #[instrument(skip(self, order), fields(exchange = "hyperliquid"))]
    pub async fn place_order(&self, order: &OrderRequest) -> Result<ExchangeResponse, ExchangeError> {
        let wire = order.to_wire()?;
        self.submit_action(&Action::Order(BulkOrder {
            orders: vec![wire],
            grouping: Grouping::Na,
        }))
        .await
    }

    /// Place several orders in one signed action
    #[instrument(skip(self, orders), fields(exchange = "hyperliquid", count = orders.len()))]
    pub async fn bulk_orders(
        &self,
        orders: &[OrderRequest],
        grouping: Grouping,
    ) -> Result<ExchangeResponse, ExchangeError> {
        if orders.is_empty() {
            return Err(ExchangeError::invalid("bulk order needs at least one order"));
        }
        let orders = orders
            .iter()
            .map(OrderRequest::to_wire)
            .collect::<Result<Vec<_>, _>>()?;
        self.submit_action(&Action::Order(BulkOrder { orders, grouping }))
            .await
    }

    /// Replace resting order `oid` with `order`
    #[instrument(skip(self, order), fields(exchange = "hyperliquid", oid = oid))]
    pub async fn modify_order(
        &self,
        oid: u64,
        order: &OrderRequest,
    ) -> Result<ExchangeResponse, ExchangeError> {
        let order = order.to_wire()?;
        self.submit_action(&Action::Modify(ModifyOrder { oid, order }))
            .await
    }

    #[instrument(skip(self), fields(exchange = "hyperliquid", asset = asset, oid = oid))]
    pub async fn cancel_order(&self, asset: u32, oid: u64) -> Result<ExchangeResponse, ExchangeError> {
        self.submit_action(&Action::Cancel(BulkCancel {
            cancels: vec![CancelWire { asset, oid }],
        }))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kernel::rest::ReqwestRest;
    use crate::exchanges::hyperliquid::signer::{action_hash, recover_address};

    const KEY: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    fn rest(signer: Option<HyperliquidSigner>) -> HyperliquidRest<ReqwestRest> {
        let client = ReqwestRest::new(
            "https://api.hyperliquid.xyz".to_string(),
            "hyperliquid".to_string(),
        )
        .unwrap();
        HyperliquidRest::new(client, signer, true)
    }

    #[test]
    fn test_rest_client_creation() {
        let hyperliquid_rest = rest(None);
        assert!(!hyperliquid_rest.can_sign());
        assert!(hyperliquid_rest.wallet_address().is_none());
    }

    #[test]
    fn test_wallet_address_override() {
        let signer = HyperliquidSigner::with_private_key(KEY).unwrap();
        let hyperliquid_rest = rest(Some(signer.clone()));
        assert_eq!(hyperliquid_rest.wallet_address(), Some(signer.wallet_address()));

        let hyperliquid_rest = hyperliquid_rest.with_wallet_address("0xabc".to_string());
        assert_eq!(hyperliquid_rest.wallet_address(), Some("0xabc"));
    }

    #[test]
    fn test_signed_payload_without_key() {
        let action = Action::Cancel(BulkCancel { cancels: vec![] });
        let err = rest(None).signed_payload(&action, 1).unwrap_err();
        assert!(matches!(err, ExchangeError::KeyError(_)));
    }

    #[test]
    fn test_signed_payload_envelope() {
        let signer = HyperliquidSigner::with_private_key(KEY).unwrap();
        let vault = "0x2222222222222222222222222222222222222222";
        let hyperliquid_rest = rest(Some(signer.clone())).with_vault_address(vault.to_string());
        let action = Action::Cancel(BulkCancel {
            cancels: vec![CancelWire { asset: 4, oid: 99 }],
        });

        let payload = hyperliquid_rest.signed_payload(&action, 1_234).unwrap();
        assert_eq!(payload["action"]["type"], "cancel");
        assert_eq!(payload["nonce"], 1_234);
        assert_eq!(payload["vaultAddress"], vault);

        let signature: Signature = serde_json::from_value(payload["signature"].clone()).unwrap();
        let connection_id = action_hash(&action, 1_234, Some(vault)).unwrap();
        assert_eq!(
            recover_address(&connection_id, true, &signature).unwrap(),
            signer.wallet_address()
        );
    }

    #[test]
    fn test_envelope_omits_missing_vault() {
        let signer = HyperliquidSigner::with_private_key(KEY).unwrap();
        let action = Action::Cancel(BulkCancel { cancels: vec![] });
        let payload = rest(Some(signer)).signed_payload(&action, 5).unwrap();
        assert!(payload.get("vaultAddress").is_none());
    }

    #[tokio::test]
    async fn test_bulk_orders_rejects_empty_batch() {
        let signer = HyperliquidSigner::with_private_key(KEY).unwrap();
        let err = rest(Some(signer))
            .bulk_orders(&[], Grouping::Na)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidParameters(_)));
    }
}
