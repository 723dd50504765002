//! Common test utilities for rpclink-client integration tests
//!
//! [`MockServer`] is a small WebSocket server that answers the `initialize`
//! handshake on its own and hands every other inbound message to the test,
//! which decides what (if anything) to send back.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use rpclink_client::ClientConfig;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

/// How the mock answers `initialize`
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeMode {
    /// Reply with a normal result
    Accept,
    /// Reply with this exact result value
    AcceptWith(Value),
    /// Reply with a JSON-RPC error
    Reject,
    /// Never reply
    Ignore,
}

enum Outbound {
    Frame(String),
    Drop,
}

struct Shared {
    mode: StdMutex<HandshakeMode>,
    handshakes: AtomicUsize,
    connections: AtomicUsize,
    auth_headers: StdMutex<Vec<Option<String>>>,
    current: StdMutex<Option<mpsc::UnboundedSender<Outbound>>>,
    inbound: mpsc::UnboundedSender<Value>,
}

/// Mock JSON-RPC WebSocket server
pub struct MockServer {
    addr: SocketAddr,
    shared: Arc<Shared>,
    inbound: Mutex<mpsc::UnboundedReceiver<Value>>,
    accept_task: JoinHandle<()>,
}

impl MockServer {
    /// Start a server that accepts the handshake
    pub async fn start() -> Self {
        Self::with_mode(HandshakeMode::Accept).await
    }

    pub async fn with_mode(mode: HandshakeMode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            mode: StdMutex::new(mode),
            handshakes: AtomicUsize::new(0),
            connections: AtomicUsize::new(0),
            auth_headers: StdMutex::new(Vec::new()),
            current: StdMutex::new(None),
            inbound: inbound_tx,
        });

        let accept_shared = Arc::clone(&shared);
        let accept_task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve_connection(stream, Arc::clone(&accept_shared)));
            }
        });

        Self {
            addr,
            shared,
            inbound: Mutex::new(inbound_rx),
            accept_task,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Client config with timeouts and delays short enough for tests
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.url());
        config.request_timeout_ms = 2_000;
        config.connect_timeout_ms = 2_000;
        config.reconnect_base_delay_ms = 50;
        config.reconnect_max_delay_ms = 200;
        config.max_reconnect_attempts = 3;
        config
    }

    pub fn set_mode(&self, mode: HandshakeMode) {
        *self.shared.mode.lock().unwrap() = mode;
    }

    /// Number of `initialize` requests received
    pub fn handshakes(&self) -> usize {
        self.shared.handshakes.load(Ordering::SeqCst)
    }

    /// Number of WebSocket upgrades accepted
    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// `Authorization` header of every upgrade request, in order
    pub fn auth_headers(&self) -> Vec<Option<String>> {
        self.shared.auth_headers.lock().unwrap().clone()
    }

    /// Next non-handshake message from the client (5s limit)
    pub async fn next_message(&self) -> Option<Value> {
        let mut inbound = self.inbound.lock().await;
        tokio::time::timeout(Duration::from_secs(5), inbound.recv())
            .await
            .ok()
            .flatten()
    }

    /// Whether a message arrives within `wait`
    pub async fn message_within(&self, wait: Duration) -> Option<Value> {
        let mut inbound = self.inbound.lock().await;
        tokio::time::timeout(wait, inbound.recv()).await.ok().flatten()
    }

    /// Send a raw frame on the current connection
    pub fn send_text(&self, text: impl Into<String>) {
        if let Some(tx) = self.shared.current.lock().unwrap().as_ref() {
            let _ = tx.send(Outbound::Frame(text.into()));
        }
    }

    pub fn send(&self, value: Value) {
        self.send_text(value.to_string());
    }

    pub fn respond(&self, id: &Value, result: Value) {
        self.send(json!({"jsonrpc": "2.0", "id": id, "result": result}));
    }

    pub fn respond_error(&self, id: &Value, code: i32, message: &str) {
        self.send(json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}}));
    }

    pub fn notify(&self, method: &str, params: Value) {
        self.send(json!({"jsonrpc": "2.0", "method": method, "params": params}));
    }

    /// Drop the current connection without a close handshake
    pub fn kick(&self) {
        if let Some(tx) = self.shared.current.lock().unwrap().take() {
            let _ = tx.send(Outbound::Drop);
        }
    }

    /// Stop accepting connections and drop the current one
    pub fn shutdown(&self) {
        self.accept_task.abort();
        self.kick();
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn serve_connection(stream: TcpStream, shared: Arc<Shared>) {
    let header_shared = Arc::clone(&shared);
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let header = request
            .headers()
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        header_shared.auth_headers.lock().unwrap().push(header);
        Ok(response)
    };

    let Ok(ws) = accept_hdr_async(stream, callback).await else {
        return;
    };
    shared.connections.fetch_add(1, Ordering::SeqCst);

    let (tx, mut rx) = mpsc::unbounded_channel();
    *shared.current.lock().unwrap() = Some(tx);
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            incoming = read.next() => {
                let Some(Ok(message)) = incoming else { break };
                let Message::Text(text) = message else { continue };
                let value: Value = match serde_json::from_str(&text) {
                    Ok(value) => value,
                    Err(_) => continue,
                };

                match value.get("method").and_then(Value::as_str) {
                    Some("initialize") => {
                        shared.handshakes.fetch_add(1, Ordering::SeqCst);
                        let mode = shared.mode.lock().unwrap().clone();
                        let reply = match mode {
                            HandshakeMode::Accept => Some(json!({
                                "jsonrpc": "2.0",
                                "id": value["id"],
                                "result": {
                                    "protocolVersion": "2024-11-05",
                                    "capabilities": {"tools": {}},
                                    "serverInfo": {"name": "mock", "version": "0.0.1"}
                                }
                            })),
                            HandshakeMode::AcceptWith(result) => Some(json!({
                                "jsonrpc": "2.0",
                                "id": value["id"],
                                "result": result
                            })),
                            HandshakeMode::Reject => Some(json!({
                                "jsonrpc": "2.0",
                                "id": value["id"],
                                "error": {"code": -32602, "message": "Unsupported protocol version"}
                            })),
                            HandshakeMode::Ignore => None,
                        };
                        if let Some(reply) = reply {
                            if write.send(Message::Text(reply.to_string())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some("notifications/initialized") => {}
                    _ => {
                        let _ = shared.inbound.send(value);
                    }
                }
            }
            outbound = rx.recv() => match outbound {
                Some(Outbound::Frame(text)) => {
                    if write.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Some(Outbound::Drop) | None => break,
            }
        }
    }
}

/// Wait until `condition` holds, polling every 10ms for up to 5s
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_url() {
        let server = MockServer::start().await;
        assert!(server.url().starts_with("ws://127.0.0.1:"));
        assert_eq!(server.connections(), 0);
    }
}
