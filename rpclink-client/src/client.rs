//! JSON-RPC client engine over WebSocket
//!
//! This module provides [`LinkClient`], which owns one logical connection to
//! a server and everything that hangs off it: the correlation table, the
//! notification dispatcher and the reconnection state machine.
//!
//! # Client Lifecycle
//!
//! 1. **Create**: [`LinkClient::new`] validates the config; state is `Idle`
//! 2. **Connect**: open the transport, run the `initialize` handshake; state
//!    becomes `Open` only once the server acknowledges it
//! 3. **Use**: send requests, subscribe to notifications
//! 4. **Reconnect**: on an unexpected close every pending request is rejected
//!    with `ConnectionLost` and the backoff loop starts
//! 5. **Disconnect**: [`LinkClient::disconnect`] closes deliberately, rejects
//!    pending requests with `ConnectionClosed` and stops reconnection
//!
//! # Tasks
//!
//! Each open connection has one reader task. It performs every
//! message-arrival mutation: settling correlation entries, dispatching
//! notifications and answering server requests. A generation counter tags
//! each reader so a reader that outlived its connection cannot tear down its
//! successor. Reconnection runs in its own task and takes the same connect
//! lock as [`LinkClient::connect`], so at most one connection attempt is in
//! flight at a time.
//!
//! # Cloning
//!
//! `LinkClient` is cheaply cloneable using `Arc` internally. All clones share
//! the same connection and state. Separate `LinkClient::new` calls never share
//! anything.

use crate::client_builder::ClientBuilder;
use crate::config::ClientConfig;
use crate::connection_state::{ConnectionEvent, ConnectionManager, ConnectionState};
use crate::correlation::CorrelationTable;
use crate::handshake::{self, InitializeResult};
use crate::metrics::ClientMetrics;
use crate::notification::{NotificationDispatcher, SubscriptionId};
use crate::reconnect::{ExponentialBackoff, ReconnectionStrategy};
use crate::transport::{self, WsSink, WsSource};
use futures::{FutureExt, SinkExt, StreamExt};
use rpclink_core::{
    codec, Envelope, Error, Id, JsonRpcErrorData, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, Result,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

/// Server-initiated request answered with an empty result
const PING_METHOD: &str = "ping";

/// State shared by every clone of one client
pub(crate) struct ClientInner {
    pub(crate) config: ClientConfig,
    pub(crate) table: CorrelationTable,
    pub(crate) dispatcher: NotificationDispatcher,
    pub(crate) connection: ConnectionManager,
    sender: Mutex<Option<WsSink>>,
    /// Serializes connection attempts from callers and the reconnect loop
    connect_lock: Mutex<()>,
    /// Bumped whenever a connection is opened or torn down
    generation: AtomicU64,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
    /// Bumped by `disconnect()` to abandon a connection attempt in flight
    cancel: watch::Sender<u64>,
    server: RwLock<Option<InitializeResult>>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl ClientInner {
    /// Correlated request that skips the `Open` check (used by the handshake)
    pub(crate) async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let (id, rx) = self.table.register(method, self.config.request_timeout()).await;

        let request = JsonRpcRequest::new(method, params, Id::from(id));
        let sent = match codec::encode_request(&request) {
            Ok(frame) => self.transmit(frame).await,
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            self.table.fail(id, e.clone()).await;
            return Err(e);
        }

        tracing::debug!(id, method, "Request sent, waiting for response");
        rx.await
            .map_err(|_| Error::Internal("pending request dropped without settling".into()))?
    }

    pub(crate) async fn transmit_notification(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<()> {
        let frame = codec::encode_notification(&JsonRpcNotification::new(method, params))?;
        self.transmit(frame).await
    }

    async fn transmit(&self, frame: String) -> Result<()> {
        let mut sender = self.sender.lock().await;
        let sink = sender.as_mut().ok_or(Error::NotConnected)?;
        sink.send(Message::Text(frame))
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }

    fn ensure_open(&self) -> Result<()> {
        match self.connection.state() {
            ConnectionState::Open => Ok(()),
            _ => Err(Error::NotConnected),
        }
    }

    fn record_state(&self) {
        if let Some(ref m) = self.metrics {
            m.update_connection_state(self.connection.state());
        }
    }

    /// Open the transport and run the handshake
    ///
    /// Callers must hold `connect_lock`.
    async fn establish(self: &Arc<Self>) -> Result<()> {
        let mut cancelled = self.cancel.subscribe();
        self.connection.connecting();
        self.record_state();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let opened = tokio::select! {
            opened = transport::open(&self.config) => opened,
            _ = cancelled.changed() => Err(Error::ConnectionClosed),
        };
        let stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "Transport open failed");
                self.connection.set_state(ConnectionState::Closed);
                self.record_state();
                return Err(e);
            }
        };

        let (sink, source) = stream.split();
        *self.sender.lock().await = Some(sink);
        let reader = self.spawn_reader(source, generation);
        if let Some(stale) = self.reader_task.lock().await.replace(reader) {
            stale.abort();
        }

        let acknowledged = tokio::select! {
            result = handshake::perform(self) => result,
            _ = cancelled.changed() => Err(Error::ConnectionClosed),
        };
        match acknowledged {
            Ok(result) => {
                *self.server.write().await = Some(result);
                self.connection.opened().await;
                self.record_state();
                tracing::info!("Connected");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Handshake failed");
                self.teardown().await;
                self.table.clear(Error::ConnectionClosed).await;
                self.connection.set_state(ConnectionState::Closed);
                self.record_state();
                if let Some(ref m) = self.metrics {
                    m.record_error(&e);
                }
                Err(match e {
                    Error::HandshakeFailed(_) => e,
                    other => Error::HandshakeFailed(other.to_string()),
                })
            }
        }
    }

    /// Invalidate the current connection and close its socket
    async fn teardown(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(reader) = self.reader_task.lock().await.take() {
            reader.abort();
        }
        if let Some(mut sink) = self.sender.lock().await.take() {
            if let Err(e) = sink.close().await {
                tracing::debug!(error = %e, "Close frame not delivered");
            }
        }
    }

    fn spawn_reader(self: &Arc<Self>, source: WsSource, generation: u64) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).read_loop(source, generation).boxed())
    }

    async fn read_loop(self: Arc<Self>, mut source: WsSource, generation: u64) {
        while let Some(frame) = source.next().await {
            match frame {
                Ok(Message::Text(text)) => self.handle_frame(&text).await,
                Ok(Message::Close(frame)) => {
                    tracing::info!(frame = ?frame, "Connection closed by server");
                    break;
                }
                Ok(Message::Binary(data)) => {
                    tracing::debug!(len = data.len(), "Ignoring binary frame");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "WebSocket error");
                    if let Some(ref m) = self.metrics {
                        m.record_error(&Error::Transport(e.to_string()));
                    }
                    break;
                }
            }
        }

        self.handle_close(generation).await;
    }

    async fn handle_frame(&self, text: &str) {
        let envelope = match codec::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding malformed frame");
                if let Some(ref m) = self.metrics {
                    m.record_error(&e);
                }
                return;
            }
        };

        match envelope {
            Envelope::Response(response) => {
                let id = response.id.clone();
                if !self.table.resolve(response).await {
                    tracing::debug!(id = %id, "Discarding response with no pending request");
                }
            }
            Envelope::Notification(notification) => {
                tracing::debug!(method = %notification.method, "Notification received");
                if let Some(ref m) = self.metrics {
                    m.record_notification(&notification.method);
                }
                self.dispatcher.dispatch(notification).await;
            }
            Envelope::Request(request) => self.answer_server_request(request).await,
        }
    }

    async fn answer_server_request(&self, request: JsonRpcRequest) {
        let response = match request.method.as_str() {
            PING_METHOD => JsonRpcResponse::success(Value::Object(Default::default()), request.id),
            other => {
                tracing::debug!(method = other, "Rejecting unsupported server request");
                JsonRpcResponse::error(JsonRpcErrorData::method_not_found(other), request.id)
            }
        };

        let sent = match codec::encode_response(&response) {
            Ok(frame) => self.transmit(frame).await,
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            tracing::warn!(error = %e, "Failed to answer server request");
        }
    }

    async fn handle_close(self: &Arc<Self>, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(generation, "Stale reader exited");
            return;
        }

        self.sender.lock().await.take();
        let was_open = self.connection.state() == ConnectionState::Open;
        let rejected = self.table.clear(Error::ConnectionLost).await;
        if !was_open {
            // Closed mid-handshake: the connect attempt in flight cleans up.
            return;
        }

        tracing::warn!(rejected, "Connection lost");
        *self.server.write().await = None;
        self.connection.closed(false);
        self.record_state();
        if let Some(ref m) = self.metrics {
            m.record_error(&Error::ConnectionLost);
        }

        if self.connection.is_deliberate() {
            return;
        }
        let task = self.spawn_reconnect();
        if let Some(previous) = self.reconnect_task.lock().await.replace(task) {
            previous.abort();
        }
    }

    fn spawn_reconnect(self: &Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).reconnect_loop().boxed())
    }

    async fn reconnect_loop(self: Arc<Self>) {
        loop {
            let delay = match self.connection.next_reconnect_delay().await {
                Ok(delay) => delay,
                Err(e) => {
                    tracing::error!(error = %e, "Giving up on reconnection");
                    return;
                }
            };

            let attempt = self.connection.reconnect_attempts();
            tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");
            if let Some(ref m) = self.metrics {
                m.record_reconnection_attempt();
            }
            tokio::time::sleep(delay).await;

            let _guard = self.connect_lock.lock().await;
            if self.connection.is_deliberate() {
                tracing::debug!("Reconnection cancelled by disconnect");
                return;
            }
            if self.connection.state() == ConnectionState::Open {
                return;
            }

            match self.establish().await {
                Ok(()) => {
                    tracing::info!(attempt, "Reconnected");
                    if let Some(ref m) = self.metrics {
                        m.record_reconnection_success();
                    }
                    return;
                }
                Err(e) => tracing::warn!(attempt, error = %e, "Reconnection attempt failed"),
            }
        }
    }
}

/// JSON-RPC client with automatic reconnection
#[derive(Clone)]
pub struct LinkClient {
    inner: Arc<ClientInner>,
}

impl LinkClient {
    /// Create an idle client; nothing is opened until [`connect`](Self::connect)
    ///
    /// Reconnection uses exponential backoff derived from the config.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if the config fails validation.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let strategy = Box::new(ExponentialBackoff::from(&config));
        Ok(Self::from_parts(config, strategy, None))
    }

    pub(crate) fn from_parts(
        config: ClientConfig,
        strategy: Box<dyn ReconnectionStrategy>,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                table: CorrelationTable::new(),
                dispatcher: NotificationDispatcher::new(),
                connection: ConnectionManager::new(strategy),
                sender: Mutex::new(None),
                connect_lock: Mutex::new(()),
                generation: AtomicU64::new(0),
                reader_task: Mutex::new(None),
                reconnect_task: Mutex::new(None),
                cancel: watch::channel(0).0,
                server: RwLock::new(None),
                metrics,
            }),
        }
    }

    /// Create a client and connect it
    pub async fn start(config: ClientConfig) -> Result<Self> {
        let client = Self::new(config)?;
        client.connect().await?;
        Ok(client)
    }

    /// Fluent configuration starting from a server address
    pub fn builder(server_address: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(server_address)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Open the connection and complete the handshake
    ///
    /// A no-op when already `Open`. Cancels a pending reconnection loop and
    /// re-enables reconnection after an earlier `disconnect()`.
    ///
    /// # Errors
    ///
    /// `Error::Transport` if the socket or upgrade fails, `Error::HandshakeFailed`
    /// if `initialize` fails or times out. Neither starts a reconnection loop.
    #[tracing::instrument(skip(self), fields(server = %self.inner.config.server_address))]
    pub async fn connect(&self) -> Result<()> {
        let inner = &self.inner;
        let _guard = inner.connect_lock.lock().await;

        if inner.connection.state() == ConnectionState::Open {
            tracing::debug!("Already connected");
            return Ok(());
        }
        if let Some(task) = inner.reconnect_task.lock().await.take() {
            task.abort();
        }
        inner.connection.clear_deliberate();

        tracing::info!("Connecting to server");
        inner.establish().await
    }

    /// Close deliberately and stop reconnecting
    ///
    /// Pending requests fail with `Error::ConnectionClosed`. A `connect()` still
    /// opening the transport or waiting on the handshake is abandoned and
    /// returns an error.
    #[tracing::instrument(skip(self), fields(server = %self.inner.config.server_address))]
    pub async fn disconnect(&self) {
        let inner = &self.inner;
        inner.connection.mark_deliberate();
        inner.cancel.send_modify(|epoch| *epoch = epoch.wrapping_add(1));
        if let Some(task) = inner.reconnect_task.lock().await.take() {
            task.abort();
        }

        let _guard = inner.connect_lock.lock().await;
        let previous = inner.connection.state();
        inner.teardown().await;
        let rejected = inner.table.clear(Error::ConnectionClosed).await;
        *inner.server.write().await = None;

        if previous != ConnectionState::Closed {
            inner.connection.closed(true);
            inner.record_state();
        }
        tracing::info!(rejected, "Disconnected");
    }

    /// Whether requests are currently permitted
    pub fn is_connected(&self) -> bool {
        self.inner.connection.state() == ConnectionState::Open
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    /// Watch receiver that sees every state change
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.watch()
    }

    /// Lifecycle events, including reconnection exhaustion
    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.connection.events()
    }

    /// The server's handshake result for the current connection
    pub async fn server_info(&self) -> Option<InitializeResult> {
        self.inner.server.read().await.clone()
    }

    /// Register a callback for notifications named `event`
    ///
    /// Subscriptions are local and survive reconnects.
    pub async fn subscribe<F, Fut>(&self, event: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.dispatcher.subscribe(event, handler).await
    }

    /// Remove a callback registered with [`subscribe`](Self::subscribe)
    pub async fn unsubscribe(&self, event: &str, id: SubscriptionId) -> bool {
        self.inner.dispatcher.unsubscribe(event, id).await
    }

    /// Event names that currently have subscribers
    pub async fn subscribed_events(&self) -> Vec<String> {
        self.inner.dispatcher.events().await
    }

    /// Drop every subscription on every event
    pub async fn clear_subscriptions(&self) {
        self.inner.dispatcher.clear().await;
    }

    /// Send a request and await its result
    ///
    /// # Errors
    ///
    /// - `Error::NotConnected` immediately unless the state is `Open`
    /// - `Error::Timeout` if no response arrives within `requestTimeoutMs`
    /// - `Error::Protocol` if the server answers with an error object
    /// - `Error::ConnectionLost` / `Error::ConnectionClosed` if the connection
    ///   goes away first
    #[tracing::instrument(skip(self, params), fields(method = %method))]
    pub async fn send_request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        if let Err(e) = self.inner.ensure_open() {
            tracing::debug!("Request rejected: not connected");
            return Err(e);
        }

        let started = Instant::now();
        let outcome = self.inner.call(method, params).await;
        let elapsed = started.elapsed();

        if let Some(ref m) = self.inner.metrics {
            m.record_request(method, &outcome, elapsed);
        }
        match &outcome {
            Ok(_) => tracing::debug!(duration_ms = elapsed.as_millis() as u64, "Request completed"),
            Err(e) => tracing::debug!(error = %e, "Request failed"),
        }
        outcome
    }

    /// Typed request: serialize `params`, deserialize the result
    ///
    /// Params that serialize to `null` (for example `()`) are omitted.
    pub async fn request<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params = match serde_json::to_value(params)? {
            Value::Null => None,
            value => Some(value),
        };
        let result = self.send_request(method, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Send a notification to the server; nothing comes back
    pub async fn notify<P: Serialize>(&self, method: &str, params: P) -> Result<()> {
        self.inner.ensure_open()?;
        let params = match serde_json::to_value(params)? {
            Value::Null => None,
            value => Some(value),
        };
        self.inner.transmit_notification(method, params).await
    }

    /// Number of requests awaiting a response
    pub async fn pending_requests(&self) -> usize {
        self.inner.table.len().await
    }
}
