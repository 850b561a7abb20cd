use super::wire;
use crate::core::errors::ExchangeError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// Signed actions. Field order is the signing contract: the structs below are
// MessagePack-encoded in declaration order, so never reorder fields.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TimeInForce {
    Gtc,
    Ioc,
    #[default]
    Alo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tpsl {
    Tp,
    Sl,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitOrder {
    pub tif: TimeInForce,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerOrder {
    pub is_market: bool,
    pub trigger_px: String,
    pub tpsl: Tpsl,
}

/// Wire form `{"limit":{"tif":..}}` or `{"trigger":{..}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit(LimitOrder),
    Trigger(TriggerOrder),
}

impl OrderType {
    pub const fn limit(tif: TimeInForce) -> Self {
        Self::Limit(LimitOrder { tif })
    }

    pub fn trigger(trigger_px: f64, is_market: bool, tpsl: Tpsl) -> Result<Self, ExchangeError> {
        Ok(Self::Trigger(TriggerOrder {
            is_market,
            trigger_px: wire::encode_decimal(trigger_px)?,
            tpsl,
        }))
    }
}

impl Default for OrderType {
    fn default() -> Self {
        Self::limit(TimeInForce::default())
    }
}

/// One order exactly as it is signed and submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWire {
    #[serde(rename = "a")]
    pub asset: u32,
    #[serde(rename = "b")]
    pub is_buy: bool,
    #[serde(rename = "p")]
    pub limit_px: String,
    #[serde(rename = "s")]
    pub sz: String,
    #[serde(rename = "r")]
    pub reduce_only: bool,
    #[serde(rename = "t")]
    pub order_type: OrderType,
    #[serde(rename = "c", skip_serializing_if = "Option::is_none", default)]
    pub cloid: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Grouping {
    #[default]
    Na,
    NormalTpsl,
    PositionTpsl,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOrder {
    pub orders: Vec<OrderWire>,
    pub grouping: Grouping,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelWire {
    #[serde(rename = "a")]
    pub asset: u32,
    #[serde(rename = "o")]
    pub oid: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkCancel {
    pub cancels: Vec<CancelWire>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyOrder {
    pub oid: u64,
    pub order: OrderWire,
}

/// A trade intent; serialized with its `type` tag first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    Order(BulkOrder),
    Cancel(BulkCancel),
    Modify(ModifyOrder),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Order(_) => "order",
            Self::Cancel(_) => "cancel",
            Self::Modify(_) => "modify",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub r: String,
    pub s: String,
    pub v: u8,
}

/// Body posted to `/exchange`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangePayload<'a> {
    pub action: &'a Action,
    pub signature: Signature,
    pub nonce: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault_address: Option<&'a str>,
}

// Caller-facing order description

/// How the caller names the market of an order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coin {
    Id(u32),
    Symbol(String),
}

impl From<u32> for Coin {
    fn from(id: u32) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for Coin {
    fn from(symbol: &str) -> Self {
        Self::Symbol(symbol.to_string())
    }
}

impl From<String> for Coin {
    fn from(symbol: String) -> Self {
        Self::Symbol(symbol)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub coin: Coin,
    pub is_buy: bool,
    pub price: f64,
    pub size: f64,
    pub reduce_only: bool,
    pub order_type: OrderType,
    pub cloid: Option<String>,
}

impl OrderRequest {
    /// Post-only limit order; adjust with the `with_*` setters
    pub fn limit(coin: impl Into<Coin>, is_buy: bool, price: f64, size: f64) -> Self {
        Self {
            coin: coin.into(),
            is_buy,
            price,
            size,
            reduce_only: false,
            order_type: OrderType::default(),
            cloid: None,
        }
    }

    pub fn with_tif(mut self, tif: TimeInForce) -> Self {
        self.order_type = OrderType::limit(tif);
        self
    }

    pub fn with_order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = order_type;
        self
    }

    pub fn reduce_only(mut self) -> Self {
        self.reduce_only = true;
        self
    }

    pub fn with_cloid(mut self, cloid: String) -> Self {
        self.cloid = Some(cloid);
        self
    }

    /// Resolve to the signed wire form.
    ///
    /// The coin must already be a numeric asset id; passing a symbol is a
    /// caller error and fails here, before anything is signed or sent.
    pub fn to_wire(&self) -> Result<OrderWire, ExchangeError> {
        let asset = match &self.coin {
            Coin::Id(id) => *id,
            Coin::Symbol(symbol) => {
                return Err(ExchangeError::invalid(format!(
                    "coin must be a numeric asset id, got symbol {:?}; resolve it with asset_id() first",
                    symbol
                )));
            }
        };
        if !(self.price > 0.0) {
            return Err(ExchangeError::invalid(format!(
                "price must be positive, got {}",
                self.price
            )));
        }
        if !(self.size > 0.0) {
            return Err(ExchangeError::invalid(format!(
                "size must be positive, got {}",
                self.size
            )));
        }

        Ok(OrderWire {
            asset,
            is_buy: self.is_buy,
            limit_px: wire::encode_decimal(self.price)?,
            sz: wire::encode_decimal(self.size)?,
            reduce_only: self.reduce_only,
            order_type: self.order_type.clone(),
            cloid: self.cloid.clone(),
        })
    }
}

// Info endpoint request types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandleRequest {
    pub coin: String,
    pub interval: String,
    pub start_time: u64,
    pub end_time: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InfoRequest {
    Meta,
    SpotMeta,
    AllMids,
    ClearinghouseState { user: String },
    SpotClearinghouseState { user: String },
    OpenOrders { user: String },
    L2Book { coin: String },
    CandleSnapshot { req: CandleRequest },
}

// Info endpoint response types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetInfo {
    pub name: String,
    #[serde(rename = "szDecimals")]
    pub sz_decimals: u32,
    #[serde(rename = "maxLeverage", default)]
    pub max_leverage: u32,
    #[serde(rename = "onlyIsolated", default)]
    pub only_isolated: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub universe: Vec<AssetInfo>,
}

impl Meta {
    /// Asset id of a perp symbol: its index in the universe
    pub fn asset_id(&self, symbol: &str) -> Option<u32> {
        self.universe
            .iter()
            .position(|asset| asset.name.eq_ignore_ascii_case(symbol))
            .and_then(|index| u32::try_from(index).ok())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotToken {
    pub name: String,
    pub sz_decimals: u32,
    pub wei_decimals: u32,
    pub index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotPair {
    pub name: String,
    pub tokens: Vec<u32>,
    pub index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotMeta {
    pub universe: Vec<SpotPair>,
    pub tokens: Vec<SpotToken>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllMids(pub HashMap<String, String>);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserState {
    #[serde(rename = "assetPositions")]
    pub asset_positions: Vec<AssetPosition>,
    #[serde(rename = "crossMaintenanceMarginUsed", default)]
    pub cross_maintenance_margin_used: String,
    #[serde(rename = "marginSummary")]
    pub margin_summary: MarginSummary,
    #[serde(rename = "crossMarginSummary", default)]
    pub cross_margin_summary: Option<MarginSummary>,
    pub withdrawable: String,
    #[serde(default)]
    pub time: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetPosition {
    pub position: Position,
    #[serde(rename = "type")]
    pub position_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub coin: String,
    #[serde(rename = "entryPx")]
    pub entry_px: Option<String>,
    pub leverage: Leverage,
    #[serde(rename = "liquidationPx")]
    pub liquidation_px: Option<String>,
    #[serde(rename = "marginUsed")]
    pub margin_used: String,
    #[serde(rename = "maxLeverage", default)]
    pub max_leverage: u32,
    #[serde(rename = "positionValue")]
    pub position_value: String,
    #[serde(rename = "returnOnEquity")]
    pub return_on_equity: String,
    pub szi: String,
    #[serde(rename = "unrealizedPnl")]
    pub unrealized_pnl: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leverage {
    #[serde(rename = "type")]
    pub leverage_type: String,
    pub value: u32,
    #[serde(rename = "rawUsd", default)]
    pub raw_usd: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginSummary {
    #[serde(rename = "accountValue")]
    pub account_value: String,
    #[serde(rename = "totalMarginUsed")]
    pub total_margin_used: String,
    #[serde(rename = "totalNtlPos")]
    pub total_ntl_pos: String,
    #[serde(rename = "totalRawUsd")]
    pub total_raw_usd: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotBalance {
    pub coin: String,
    pub token: u32,
    pub hold: String,
    pub total: String,
    #[serde(default)]
    pub entry_ntl: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotUserState {
    pub balances: Vec<SpotBalance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenOrder {
    pub coin: String,
    #[serde(rename = "limitPx")]
    pub limit_px: String,
    pub oid: u64,
    pub side: String,
    pub sz: String,
    pub timestamp: u64,
    #[serde(default)]
    pub cloid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct L2Book {
    pub coin: String,
    pub levels: [Vec<L2Level>; 2], // [bids, asks]
    pub time: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct L2Level {
    pub px: String,
    pub sz: String,
    pub n: u32, // number of orders
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    #[serde(rename = "t")]
    pub open_time: u64,
    #[serde(rename = "T")]
    pub close_time: u64,
    #[serde(rename = "s")]
    pub coin: String,
    #[serde(rename = "i")]
    pub interval: String,
    #[serde(rename = "o")]
    pub open: String,
    #[serde(rename = "c")]
    pub close: String,
    #[serde(rename = "h")]
    pub high: String,
    #[serde(rename = "l")]
    pub low: String,
    #[serde(rename = "v")]
    pub volume: String,
    #[serde(rename = "n")]
    pub num_trades: u64,
}

// Exchange endpoint response types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeResponse {
    pub status: String,
    pub response: ExchangeResponseBody,
}

impl ExchangeResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    /// Per-order outcomes, empty when the exchange rejected the whole action
    pub fn statuses(&self) -> &[OrderStatus] {
        match &self.response {
            ExchangeResponseBody::Data(ResponseData {
                data: Some(data), ..
            }) => &data.statuses,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExchangeResponseBody {
    Data(ResponseData),
    Message(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseData {
    #[serde(rename = "type")]
    pub response_type: String,
    #[serde(default)]
    pub data: Option<StatusList>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusList {
    pub statuses: Vec<OrderStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderStatus {
    Resting { resting: RestingOrder },
    Filled { filled: FilledOrder },
    Error { error: String },
    Success(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestingOrder {
    pub oid: u64,
    #[serde(default)]
    pub cloid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilledOrder {
    #[serde(rename = "avgPx")]
    pub avg_px: String,
    pub oid: u64,
    #[serde(rename = "totalSz")]
    pub total_sz: String,
}
