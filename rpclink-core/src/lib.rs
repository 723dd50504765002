//! Core JSON-RPC 2.0 types and codec for rpclink
//!
//! This crate holds everything the client engine needs that is independent of
//! a live connection:
//!
//! - **Types**: the [`Envelope`] tagged union and its request, response and
//!   notification variants
//! - **Codec**: text frame encoding and decoding
//! - **Error handling**: the [`Error`] taxonomy shared by every rpclink crate
//! - **Observability**: OpenTelemetry and `tracing` bootstrap
//!
//! # Architecture
//!
//! The crate is transport-agnostic. It classifies and encodes messages but
//! never touches a socket; `rpclink-client` layers the WebSocket connection,
//! correlation and reconnection on top.
//!
//! # Example
//!
//! ```rust
//! use rpclink_core::{codec, Envelope, Id, JsonRpcRequest};
//!
//! let request = JsonRpcRequest::new("resources/list", None, Id::Number(1));
//! let frame = codec::encode_request(&request).unwrap();
//!
//! match codec::decode(&frame).unwrap() {
//!     Envelope::Request(req) => assert_eq!(req.method, "resources/list"),
//!     other => panic!("unexpected {}", other.kind()),
//! }
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod types;

pub use error::{Error, JsonRpcErrorData, Result};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use types::{
    Envelope, Id, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ResponseOutcome,
    JSONRPC_VERSION,
};
