use crate::core::errors::ExchangeError;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::Retry;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{error, instrument, warn};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type WsSink = SplitSink<WsStream, Message>;
pub type WsSource = SplitStream<WsStream>;

/// WebSocket connection tuning
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Application-level ping interval in milliseconds
    pub heartbeat_interval_ms: u64,
    /// How long a request sent over the socket waits for its answer
    pub post_timeout_ms: u64,
    /// Delayed retries after the immediate reconnection attempt fails; zero
    /// disables reconnecting altogether
    pub max_reconnect_attempts: u32,
    /// First reconnection delay in milliseconds, doubled per attempt
    pub reconnect_delay_ms: u64,
    /// Upper bound for the reconnection delay in milliseconds
    pub max_reconnect_delay_ms: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            heartbeat_interval_ms: 50_000,
            post_timeout_ms: 30_000,
            max_reconnect_attempts: 5,
            reconnect_delay_ms: 1_000,
            max_reconnect_delay_ms: 60_000,
        }
    }
}

impl WsConfig {
    /// Fail-and-stop: an abnormal close leaves the connection closed
    pub fn without_reconnect(mut self) -> Self {
        self.max_reconnect_attempts = 0;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_post_timeout(mut self, timeout: Duration) -> Self {
        self.post_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_reconnect(mut self, attempts: u32, initial_delay: Duration) -> Self {
        self.max_reconnect_attempts = attempts;
        self.reconnect_delay_ms = initial_delay.as_millis() as u64;
        self
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn post_timeout(&self) -> Duration {
        Duration::from_millis(self.post_timeout_ms)
    }

    /// Capped exponential delays, one per permitted reconnection attempt
    pub fn reconnect_delays(&self) -> impl Iterator<Item = Duration> {
        // ExponentialBackoff yields base^n * factor, so base 2 with half the
        // initial delay as factor gives initial, 2*initial, 4*initial, ...
        ExponentialBackoff::from_millis(2)
            .factor((self.reconnect_delay_ms / 2).max(1))
            .max_delay(Duration::from_millis(self.max_reconnect_delay_ms))
            .take(self.max_reconnect_attempts as usize)
    }
}

/// Open a socket and split it into its write and read halves
#[instrument(skip(config), fields(url = %url))]
pub async fn connect(url: &str, config: &WsConfig) -> Result<(WsSink, WsSource), ExchangeError> {
    let connect_timeout = Duration::from_millis(config.connect_timeout_ms);

    let (ws_stream, _) = tokio::time::timeout(connect_timeout, connect_async(url))
        .await
        .map_err(|_| ExchangeError::ConnectionTimeout("WebSocket connection timeout".to_string()))?
        .map_err(|e| ExchangeError::NetworkError(format!("WebSocket connection failed: {}", e)))?;

    Ok(ws_stream.split())
}

/// Connect again after an abnormal close, backing off between attempts
#[instrument(skip(config), fields(url = %url, attempts = config.max_reconnect_attempts))]
pub async fn reconnect(url: &str, config: &WsConfig) -> Result<(WsSink, WsSource), ExchangeError> {
    if config.max_reconnect_attempts == 0 {
        return Err(ExchangeError::connection("reconnection disabled"));
    }

    let mut attempt = 0u32;
    Retry::start(config.reconnect_delays(), || {
        attempt += 1;
        async move {
            connect(url, config).await.map_err(|e| {
                warn!(attempt, error = %e, "reconnection attempt failed");
                e
            })
        }
    })
    .await
    .map_err(|e| {
        error!(error = %e, "giving up on reconnection");
        ExchangeError::connection(format!("failed to reconnect: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_delays_double_and_cap() {
        let config = WsConfig {
            max_reconnect_attempts: 8,
            reconnect_delay_ms: 1_000,
            max_reconnect_delay_ms: 10_000,
            ..WsConfig::default()
        };
        let delays: Vec<u64> = config
            .reconnect_delays()
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(
            delays,
            vec![1_000, 2_000, 4_000, 8_000, 10_000, 10_000, 10_000, 10_000]
        );
    }

    #[test]
    fn test_without_reconnect_yields_no_delays() {
        let config = WsConfig::default().without_reconnect();
        assert_eq!(config.reconnect_delays().count(), 0);
    }

    #[test]
    fn test_default_heartbeat_is_fifty_seconds() {
        assert_eq!(WsConfig::default().heartbeat_interval(), Duration::from_secs(50));
    }
}
