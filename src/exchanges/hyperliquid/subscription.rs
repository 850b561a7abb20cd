use crate::core::errors::ExchangeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One logical stream multiplexed over the connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Subscription {
    AllMids,
    L2Book { coin: String },
    Trades { coin: String },
    UserEvents { user: String },
    WebData2 { user: String },
    Candle { coin: String, interval: String },
}

impl Subscription {
    pub fn l2_book(coin: impl Into<String>) -> Self {
        Self::L2Book { coin: coin.into() }
    }

    pub fn trades(coin: impl Into<String>) -> Self {
        Self::Trades { coin: coin.into() }
    }

    pub fn candle(coin: impl Into<String>, interval: impl Into<String>) -> Self {
        Self::Candle {
            coin: coin.into(),
            interval: interval.into(),
        }
    }

    /// Routing key for this subscription
    pub fn to_identifier(&self) -> String {
        match self {
            Self::AllMids => "allMids".to_string(),
            Self::L2Book { coin } => format!("l2Book:{}", coin.to_lowercase()),
            Self::Trades { coin } => format!("trades:{}", coin.to_lowercase()),
            Self::UserEvents { .. } => "userEvents".to_string(),
            Self::WebData2 { user } => format!("webData2:{}", user.to_lowercase()),
            Self::Candle { coin, interval } => {
                format!("candle:{},{}", coin.to_lowercase(), interval)
            }
        }
    }
}

impl TryFrom<&Value> for Subscription {
    type Error = ExchangeError;

    /// Parse the JSON form, e.g. `{"type":"l2Book","coin":"BTC"}`
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Self::deserialize(value)
            .map_err(|e| ExchangeError::UnsupportedSubscription(format!("{}: {}", value, e)))
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_identifier())
    }
}

/// Routing key of a JSON subscription description
pub fn to_identifier(subscription: &Value) -> Result<String, ExchangeError> {
    Subscription::try_from(subscription).map(|s| s.to_identifier())
}

/// A decoded stream frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub channel: String,
    #[serde(default)]
    pub data: Value,
}

impl InboundMessage {
    /// Routing key carried by this frame.
    ///
    /// `None` for administrative frames and for frames with nothing to
    /// address, such as an empty trade batch.
    pub fn identifier(&self) -> Result<Option<String>, ExchangeError> {
        from_message(self)
    }
}

pub fn from_message(message: &InboundMessage) -> Result<Option<String>, ExchangeError> {
    let data = &message.data;
    let field = |key: &str| -> Result<String, ExchangeError> {
        data.get(key)
            .and_then(Value::as_str)
            .map(str::to_lowercase)
            .ok_or_else(|| {
                ExchangeError::decode(format!("{} frame without {:?}", message.channel, key))
            })
    };

    let identifier = match message.channel.as_str() {
        "pong" | "subscriptionResponse" => None,
        "allMids" => Some("allMids".to_string()),
        "l2Book" => Some(format!("l2Book:{}", field("coin")?)),
        "trades" => match data.as_array().and_then(|trades| trades.first()) {
            None => None,
            Some(first) => {
                let coin = first
                    .get("coin")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ExchangeError::decode("trades frame without \"coin\""))?;
                Some(format!("trades:{}", coin.to_lowercase()))
            }
        },
        "user" => Some("userEvents".to_string()),
        "webData2" => Some(format!("webData2:{}", field("user")?)),
        "candle" => {
            let interval = data
                .get("i")
                .and_then(Value::as_str)
                .ok_or_else(|| ExchangeError::decode("candle frame without \"i\""))?;
            Some(format!("candle:{},{}", field("s")?, interval))
        }
        "post" => {
            let id = data
                .get("id")
                .and_then(Value::as_u64)
                .ok_or_else(|| ExchangeError::decode("post frame without \"id\""))?;
            Some(post_identifier(id))
        }
        other => return Err(ExchangeError::UnknownChannel(other.to_string())),
    };
    Ok(identifier)
}

#[inline]
pub fn post_identifier(id: u64) -> String {
    format!("post:{}", id)
}

/// Handler invoked on the receive loop for every frame of a subscription.
///
/// Runs synchronously: a slow handler delays every frame behind it.
pub type Callback = Arc<dyn Fn(&InboundMessage) + Send + Sync>;

struct Route {
    subscription: Subscription,
    callback: Callback,
}

/// Identifier to handler table, one handler per identifier
#[derive(Default)]
pub struct SubscriptionRouter {
    routes: RwLock<HashMap<String, Route>>,
}

impl fmt::Debug for SubscriptionRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRouter").finish_non_exhaustive()
    }
}

impl SubscriptionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`, replacing any earlier handler for the same identifier
    pub async fn insert(&self, subscription: Subscription, callback: Callback) -> String {
        let identifier = subscription.to_identifier();
        self.routes.write().await.insert(
            identifier.clone(),
            Route {
                subscription,
                callback,
            },
        );
        identifier
    }

    pub async fn remove(&self, identifier: &str) -> Option<Subscription> {
        self.routes
            .write()
            .await
            .remove(identifier)
            .map(|route| route.subscription)
    }

    pub async fn contains(&self, identifier: &str) -> bool {
        self.routes.read().await.contains_key(identifier)
    }

    pub async fn len(&self) -> usize {
        self.routes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.routes.read().await.is_empty()
    }

    /// Every active subscription, for re-sending after a reconnect
    pub async fn subscriptions(&self) -> Vec<Subscription> {
        self.routes
            .read()
            .await
            .values()
            .map(|route| route.subscription.clone())
            .collect()
    }

    pub async fn clear(&self) {
        self.routes.write().await.clear();
    }

    /// Invoke the handler registered for `identifier`; false when none is
    pub async fn dispatch(&self, identifier: &str, message: &InboundMessage) -> bool {
        // Release the lock before running user code
        let callback = self
            .routes
            .read()
            .await
            .get(identifier)
            .map(|route| Arc::clone(&route.callback));
        match callback {
            Some(callback) => {
                callback(message);
                true
            }
            None => false,
        }
    }
}
