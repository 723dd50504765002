//! rpclink - reconnecting JSON-RPC 2.0 client over WebSocket
//!
//! This is the convenience crate that re-exports the rpclink sub-crates.
//! Use it if you want a single dependency.
//!
//! # Architecture
//!
//! - **rpclink-core**: envelope types, codec, error taxonomy, observability
//! - **rpclink-client**: connection manager, correlation table, notification
//!   dispatcher, handshake and the resource/tool/prompt facade
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use rpclink::LinkClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = LinkClient::builder("ws://localhost:8080/rpc")
//!         .with_auth_token("s3cret")
//!         .connect()
//!         .await?;
//!
//!     let resources = client.list_resources().await?;
//!     println!("Resources: {}", resources);
//!
//!     let contents = client.read_resource("file:///etc/motd").await?;
//!     println!("Contents: {}", contents);
//!
//!     Ok(())
//! }
//! ```

pub use rpclink_client as client;
pub use rpclink_core as core;

pub use rpclink_client::{ClientBuilder, ClientConfig, ConnectionEvent, ConnectionState, LinkClient};
pub use rpclink_core::{Error, Result};
