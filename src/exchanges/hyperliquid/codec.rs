use super::subscription::{InboundMessage, Subscription};
use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::WsCodec;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

/// Hyperliquid stream frame codec
#[derive(Debug, Clone, Copy, Default)]
pub struct HyperliquidCodec;

impl HyperliquidCodec {
    pub fn new() -> Self {
        Self
    }

    /// `{"method":"post","id":n,"request":...}`
    pub fn encode_post(&self, id: u64, request: &Value) -> Result<Message, ExchangeError> {
        text_frame(&json!({
            "method": "post",
            "id": id,
            "request": request,
        }))
    }

    fn control_frame(
        &self,
        method: &str,
        subscription: &Subscription,
    ) -> Result<Message, ExchangeError> {
        text_frame(&json!({
            "method": method,
            "subscription": subscription,
        }))
    }
}

fn text_frame(value: &Value) -> Result<Message, ExchangeError> {
    let text = serde_json::to_string(value)
        .map_err(|e| ExchangeError::encoding(format!("control frame: {}", e)))?;
    Ok(Message::Text(text))
}

impl WsCodec for HyperliquidCodec {
    type Subscription = Subscription;
    type Message = InboundMessage;

    fn encode_subscription(&self, subscription: &Subscription) -> Result<Message, ExchangeError> {
        self.control_frame("subscribe", subscription)
    }

    fn encode_unsubscription(
        &self,
        subscription: &Subscription,
    ) -> Result<Message, ExchangeError> {
        self.control_frame("unsubscribe", subscription)
    }

    fn encode_ping(&self) -> Result<Message, ExchangeError> {
        text_frame(&json!({"method": "ping"}))
    }

    fn decode_message(&self, message: Message) -> Result<Option<InboundMessage>, ExchangeError> {
        match message {
            Message::Text(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| ExchangeError::decode(format!("{}: {}", e, text))),
            Message::Binary(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| ExchangeError::decode(e.to_string())),
            // control frames are handled by the transport
            Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => {
                Ok(None)
            }
        }
    }
}
