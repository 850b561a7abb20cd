use super::codec::HyperliquidCodec;
use super::subscription::{from_message, Callback, InboundMessage, Subscription, SubscriptionRouter};
use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::WsCodec;
use crate::core::kernel::ws::{self, WsConfig, WsSink, WsSource};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, instrument, trace, warn};

/// Lifecycle of the stream connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Closed,
}

struct Shared {
    url: String,
    config: WsConfig,
    codec: HyperliquidCodec,
    state: watch::Sender<ConnectionState>,
    shutdown: watch::Sender<bool>,
    router: SubscriptionRouter,
    writer: Mutex<Option<WsSink>>,
    pending_posts: Mutex<HashMap<u64, oneshot::Sender<Value>>>,
    next_post_id: AtomicU64,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "stream state changed");
        }
    }

    fn ensure_connected(&self) -> Result<(), ExchangeError> {
        if self.state() == ConnectionState::Connected {
            Ok(())
        } else {
            Err(ExchangeError::NotConnected)
        }
    }

    async fn send(&self, frame: Message) -> Result<(), ExchangeError> {
        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut().ok_or(ExchangeError::NotConnected)?;
        sink.send(frame)
            .await
            .map_err(|e| ExchangeError::connection(format!("failed to send frame: {}", e)))
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    async fn close_writer(&self) {
        let sink = self.writer.lock().await.take();
        if let Some(mut sink) = sink {
            if let Err(e) = sink.close().await {
                debug!(error = %e, "close frame not delivered");
            }
        }
    }

    /// Drop every waiter; their receivers resolve with a closed-channel error
    async fn fail_pending_posts(&self) {
        self.pending_posts.lock().await.clear();
    }

    async fn handle_frame(&self, frame: Message) {
        let message = match self.codec.decode_message(frame) {
            Ok(Some(message)) => message,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
                return;
            }
        };

        let identifier = match from_message(&message) {
            Ok(Some(identifier)) => identifier,
            Ok(None) => {
                trace!(channel = %message.channel, "administrative frame");
                return;
            }
            Err(e) => {
                warn!(error = %e, "dropping frame");
                return;
            }
        };

        if message.channel == "post" {
            self.resolve_post(message).await;
        } else if !self.router.dispatch(&identifier, &message).await {
            warn!(%identifier, "no handler registered, dropping frame");
        }
    }

    async fn resolve_post(&self, mut message: InboundMessage) {
        let Some(id) = message.data.get("id").and_then(Value::as_u64) else {
            return;
        };
        let waiter = self.pending_posts.lock().await.remove(&id);
        match waiter {
            Some(waiter) => {
                let response = message
                    .data
                    .get_mut("response")
                    .map(Value::take)
                    .unwrap_or(Value::Null);
                // the caller may have timed out already
                let _ = waiter.send(response);
            }
            None => debug!(id, "post response without a waiter"),
        }
    }

    /// Peer closed the stream cleanly: Closing, then Closed
    async fn finish_clean_close(&self) {
        self.set_state(ConnectionState::Closing);
        self.writer.lock().await.take();
        self.router.clear().await;
        self.fail_pending_posts().await;
        let _ = self.shutdown.send(true);
        self.set_state(ConnectionState::Closed);
    }

    /// Abnormal closure: Closed, then Connecting while retrying with backoff.
    ///
    /// Returns the new read half once every active subscription has been
    /// re-sent, or `None` when the connection stays closed.
    async fn recover(&self) -> Option<WsSource> {
        self.writer.lock().await.take();
        self.fail_pending_posts().await;
        self.set_state(ConnectionState::Closed);

        if self.config.max_reconnect_attempts == 0 || self.is_shutting_down() {
            return None;
        }
        self.set_state(ConnectionState::Connecting);

        let (sink, source) = match ws::reconnect(&self.url, &self.config).await {
            Ok(halves) => halves,
            Err(e) => {
                error!(error = %e, "stream stays closed");
                self.set_state(ConnectionState::Closed);
                return None;
            }
        };
        let mut writer = self.writer.lock().await;
        if self.is_shutting_down() {
            debug!("closed while reconnecting, dropping new socket");
            return None;
        }
        *writer = Some(sink);
        drop(writer);

        for subscription in self.router.subscriptions().await {
            let resent = match self.codec.encode_subscription(&subscription) {
                Ok(frame) => self.send(frame).await,
                Err(e) => Err(e),
            };
            if let Err(e) = resent {
                warn!(%subscription, error = %e, "failed to restore subscription");
            }
        }

        info!("stream reconnected");
        self.set_state(ConnectionState::Connected);
        Some(source)
    }
}

async fn receive_loop(
    shared: Arc<Shared>,
    mut source: WsSource,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let frame = tokio::select! {
            _ = shutdown.changed() => return,
            frame = source.next() => frame,
        };

        match frame {
            Some(Ok(Message::Close(close))) => {
                info!(?close, "stream closed by peer");
                shared.finish_clean_close().await;
                return;
            }
            Some(Ok(frame)) => {
                shared.handle_frame(frame).await;
                continue;
            }
            Some(Err(e)) => error!(error = %e, "stream failed"),
            None => error!("stream ended without a close frame"),
        }

        source = tokio::select! {
            _ = shutdown.changed() => return,
            recovered = shared.recover() => match recovered {
                Some(source) => source,
                None => break,
            },
        };
    }

    // gave up reconnecting; stop the heartbeat
    shared.router.clear().await;
    let _ = shared.shutdown.send(true);
}

async fn heartbeat_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let period = shared.config.heartbeat_interval();
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = interval.tick() => {
                let sent = match shared.codec.encode_ping() {
                    Ok(frame) => shared.send(frame).await,
                    Err(e) => Err(e),
                };
                match sent {
                    Ok(()) => trace!("ping sent"),
                    // the receive loop owns failure handling
                    Err(e) => debug!(error = %e, "ping not sent"),
                }
            }
        }
    }
}

/// One persistent socket carrying every subscription.
///
/// Callbacks run on the receive loop, one frame at a time, in arrival order.
/// A slow callback delays all frames behind it; hand heavy work off to a
/// channel or task from inside the callback.
pub struct HyperliquidStream {
    shared: Arc<Shared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl HyperliquidStream {
    pub fn new(url: impl Into<String>, config: WsConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (shutdown, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                url: url.into(),
                config,
                codec: HyperliquidCodec::new(),
                state,
                shutdown,
                router: SubscriptionRouter::new(),
                writer: Mutex::new(None),
                pending_posts: Mutex::new(HashMap::new()),
                next_post_id: AtomicU64::new(1),
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn url(&self) -> &str {
        &self.shared.url
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Watch state transitions, e.g. to wait for a reconnect
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Open the socket and start the heartbeat and receive loops
    #[instrument(skip(self), fields(exchange = "hyperliquid", url = %self.shared.url))]
    pub async fn connect(&self) -> Result<(), ExchangeError> {
        // held for the whole handshake so concurrent calls see its outcome
        let mut tasks = self.tasks.lock().await;
        match self.state() {
            ConnectionState::Disconnected | ConnectionState::Closed => {}
            state => {
                return Err(ExchangeError::invalid(format!(
                    "cannot connect while {:?}",
                    state
                )))
            }
        }

        for task in tasks.drain(..) {
            task.abort();
        }

        self.shared.set_state(ConnectionState::Connecting);
        let (sink, source) = match ws::connect(&self.shared.url, &self.shared.config).await {
            Ok(halves) => halves,
            Err(e) => {
                self.shared.set_state(ConnectionState::Closed);
                return Err(e);
            }
        };
        *self.shared.writer.lock().await = Some(sink);

        self.shared.shutdown.send_replace(false);
        tasks.push(tokio::spawn(heartbeat_loop(
            Arc::clone(&self.shared),
            self.shared.shutdown.subscribe(),
        )));
        tasks.push(tokio::spawn(receive_loop(
            Arc::clone(&self.shared),
            source,
            self.shared.shutdown.subscribe(),
        )));

        self.shared.set_state(ConnectionState::Connected);
        info!("stream connected");
        Ok(())
    }

    /// Register `callback` and subscribe; returns the routing identifier.
    ///
    /// Subscribing again to the same identifier replaces the callback.
    #[instrument(skip(self, callback), fields(exchange = "hyperliquid", %subscription))]
    pub async fn subscribe<F>(
        &self,
        subscription: Subscription,
        callback: F,
    ) -> Result<String, ExchangeError>
    where
        F: Fn(&InboundMessage) + Send + Sync + 'static,
    {
        self.shared.ensure_connected()?;
        let frame = self.shared.codec.encode_subscription(&subscription)?;

        let callback: Callback = Arc::new(callback);
        let identifier = self.shared.router.insert(subscription, callback).await;
        if let Err(e) = self.shared.send(frame).await {
            self.shared.router.remove(&identifier).await;
            return Err(e);
        }

        debug!(%identifier, "subscribed");
        Ok(identifier)
    }

    #[instrument(skip(self), fields(exchange = "hyperliquid", %subscription))]
    pub async fn unsubscribe(&self, subscription: &Subscription) -> Result<(), ExchangeError> {
        self.shared.ensure_connected()?;
        let frame = self.shared.codec.encode_unsubscription(subscription)?;

        let identifier = subscription.to_identifier();
        if self.shared.router.remove(&identifier).await.is_none() {
            debug!(%identifier, "no active subscription");
        }
        self.shared.send(frame).await?;

        debug!(%identifier, "unsubscribed");
        Ok(())
    }

    /// Send a request over the socket and wait for its `post` response
    #[instrument(skip(self, request), fields(exchange = "hyperliquid"))]
    pub async fn post(&self, request: Value) -> Result<Value, ExchangeError> {
        self.shared.ensure_connected()?;

        let id = self.shared.next_post_id.fetch_add(1, Ordering::Relaxed);
        let frame = self.shared.codec.encode_post(id, &request)?;
        let (tx, rx) = oneshot::channel();
        self.shared.pending_posts.lock().await.insert(id, tx);

        if let Err(e) = self.shared.send(frame).await {
            self.shared.pending_posts.lock().await.remove(&id);
            return Err(e);
        }
        debug!(id, "post sent");

        match tokio::time::timeout(self.shared.config.post_timeout(), rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ExchangeError::connection(
                "connection lost before the post response arrived",
            )),
            Err(_) => {
                self.shared.pending_posts.lock().await.remove(&id);
                Err(ExchangeError::ConnectionTimeout(format!(
                    "no response to post {}",
                    id
                )))
            }
        }
    }

    pub async fn subscription_count(&self) -> usize {
        self.shared.router.len().await
    }

    /// Close the socket, stop both loops and forget every subscription
    #[instrument(skip(self), fields(exchange = "hyperliquid"))]
    pub async fn close(&self) -> Result<(), ExchangeError> {
        // Closed without shutdown means the receive loop may still reconnect
        match self.state() {
            ConnectionState::Disconnected => return Ok(()),
            ConnectionState::Closed if self.shared.is_shutting_down() => return Ok(()),
            _ => {}
        }

        self.shared.set_state(ConnectionState::Closing);
        self.shared.shutdown.send_replace(true);

        self.shared.close_writer().await;
        for task in self.tasks.lock().await.drain(..) {
            let _ = task.await;
        }
        // a reconnect that finished before the loops stopped left a new sink
        self.shared.close_writer().await;

        self.shared.router.clear().await;
        self.shared.fail_pending_posts().await;
        self.shared.set_state(ConnectionState::Closed);
        info!("stream closed");
        Ok(())
    }
}

impl Drop for HyperliquidStream {
    fn drop(&mut self) {
        let _ = self.shared.shutdown.send(true);
    }
}

impl std::fmt::Debug for HyperliquidStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperliquidStream")
            .field("url", &self.shared.url)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
