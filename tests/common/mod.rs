//! Shared fixtures for the integration tests

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use lotusx_hyperliquid::ExchangeConfig;
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use wiremock::MockServer;

/// Private key 1; its address is well known
pub const TEST_PRIVATE_KEY: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000001";
pub const TEST_WALLET: &str = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf";

pub const WAIT: Duration = Duration::from_secs(5);

pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Signing config pointed at a mock server
pub fn signing_config(server: &MockServer) -> ExchangeConfig {
    ExchangeConfig::new(TEST_PRIVATE_KEY.to_string()).base_url(server.uri())
}

pub fn read_only_config(server: &MockServer) -> ExchangeConfig {
    ExchangeConfig::read_only().base_url(server.uri())
}

enum ServerCommand {
    Frame(Message),
    Drop,
}

/// In-process stream server on 127.0.0.1.
///
/// Accepts connections one at a time; frames sent by the client are parsed
/// as JSON and queued for inspection.
pub struct TestStreamServer {
    pub url: String,
    commands: mpsc::UnboundedSender<ServerCommand>,
    received: mpsc::UnboundedReceiver<Value>,
}

impl TestStreamServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (command_tx, mut command_rx) = mpsc::unbounded_channel();
        let (received_tx, received_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let Ok(socket) = tokio_tungstenite::accept_async(tcp).await else {
                    continue;
                };
                let (mut sink, mut source) = socket.split();
                loop {
                    tokio::select! {
                        command = command_rx.recv() => match command {
                            Some(ServerCommand::Frame(frame)) => {
                                if sink.send(frame).await.is_err() {
                                    break;
                                }
                            }
                            // drop both halves without a close frame
                            Some(ServerCommand::Drop) => break,
                            None => return,
                        },
                        incoming = source.next() => match incoming {
                            Some(Ok(Message::Text(text))) => {
                                if let Ok(value) = serde_json::from_str(&text) {
                                    let _ = received_tx.send(value);
                                }
                            }
                            Some(Ok(_)) => {}
                            _ => break,
                        },
                    }
                }
            }
        });

        Self {
            url,
            commands: command_tx,
            received: received_rx,
        }
    }

    pub fn send_json(&self, value: Value) {
        self.send_text(&value.to_string());
    }

    pub fn send_text(&self, text: &str) {
        let _ = self
            .commands
            .send(ServerCommand::Frame(Message::Text(text.to_string())));
    }

    /// Clean close handshake from the server side
    pub fn close(&self) {
        let _ = self.commands.send(ServerCommand::Frame(Message::Close(None)));
    }

    /// Abnormal closure: the TCP connection goes away without a close frame
    pub fn drop_connection(&self) {
        let _ = self.commands.send(ServerCommand::Drop);
    }

    /// Next client frame whose `method` matches, skipping everything else
    pub async fn expect_method(&mut self, method: &str) -> Value {
        let wait = async {
            loop {
                match self.received.recv().await {
                    Some(frame) if frame["method"] == method => return frame,
                    Some(_) => continue,
                    None => panic!("stream server stopped"),
                }
            }
        };
        tokio::time::timeout(WAIT, wait)
            .await
            .unwrap_or_else(|_| panic!("no {} frame from the client", method))
    }
}
