//! Reconnecting JSON-RPC 2.0 client over WebSocket
//!
//! This crate provides the client engine: one persistent duplex connection to
//! a server, with request/response correlation, per-request timeouts,
//! transparent reconnection with backoff and notification dispatch.
//!
//! # Core Features
//!
//! - **Handshake**: `initialize` runs on every successful open, before any
//!   caller traffic is allowed
//! - **Request-Response**: responses matched by id, in any order, with typed
//!   helpers on top
//! - **Timeouts**: one timer per request; only that request fails
//! - **Auto-Reconnection**: bounded exponential backoff, with pluggable
//!   strategies and an explicit "gave up" event
//! - **Notifications**: ordered, panic-isolated subscriber callbacks per event
//! - **Facade**: resource, tool and prompt operations
//! - **Observability**: `tracing` spans and OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use rpclink_client::{ClientConfig, LinkClient};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = ClientConfig::new("ws://localhost:8080/rpc");
//!     config.auth_token = Some("s3cret".into());
//!
//!     let client = LinkClient::start(config).await?;
//!
//!     client
//!         .subscribe("notifications/tools/list_changed", |_| async move {
//!             println!("tool list changed");
//!         })
//!         .await;
//!
//!     let result = client.call_tool("search", json!({"query": "rust"})).await?;
//!     println!("Result: {}", result);
//!
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! # Watching the Connection
//!
//! ```rust,no_run
//! use rpclink_client::{ConnectionEvent, LinkClient};
//!
//! # async fn example(client: LinkClient) {
//! let mut events = client.events();
//! while let Ok(event) = events.recv().await {
//!     if let ConnectionEvent::ReconnectExhausted { attempts } = event {
//!         eprintln!("server unreachable after {} attempts", attempts);
//!         break;
//!     }
//! }
//! # }
//! ```

mod client;
mod client_builder;
mod config;
mod connection_state;
mod correlation;
mod facade;
mod handshake;
mod metrics;
mod notification;
mod reconnect;
mod transport;

pub use client::LinkClient;
pub use client_builder::ClientBuilder;
pub use config::{ClientConfig, ClientInfo, DEFAULT_PROTOCOL_VERSION};
pub use connection_state::{ConnectionEvent, ConnectionManager, ConnectionState};
pub use correlation::{CorrelationTable, PendingReceiver};
pub use facade::{
    PROMPTS_GET, PROMPTS_LIST, RESOURCES_LIST, RESOURCES_READ, TOOLS_CALL, TOOLS_LIST,
};
pub use handshake::{
    InitializeParams, InitializeResult, ServerInfo, INITIALIZED_NOTIFICATION, INITIALIZE_METHOD,
};
pub use metrics::ClientMetrics;
pub use notification::{NotificationDispatcher, NotificationFn, SubscriptionId};
pub use reconnect::{ExponentialBackoff, FixedDelay, NoReconnect, ReconnectionStrategy};
