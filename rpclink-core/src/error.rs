//! Error types for rpclink
//!
//! Two error types live here:
//!
//! - **Error**: what a caller of the client engine sees (uses thiserror)
//! - **JsonRpcErrorData**: the wire-format error object carried in a response
//!
//! # Error Taxonomy
//!
//! - **Per-operation**: `NotConnected`, `Timeout`, `Protocol`
//! - **Structural**: `Transport`, `ConnectionLost`, `ConnectionClosed`
//! - **Lifecycle**: `HandshakeFailed`, `ReconnectExhausted`
//! - **Local**: `Serialization`, `InvalidMessage`, `InvalidConfig`, `Internal`
//!
//! Per-operation errors settle exactly one pending request. Structural errors
//! are broadcast to every request that was in flight on the connection.
//!
//! # Standard Error Codes
//!
//! - `-32700`: Parse error
//! - `-32600`: Invalid request
//! - `-32601`: Method not found
//! - `-32602`: Invalid params
//! - `-32603`: Internal error
//!
//! # Examples
//!
//! ```rust
//! use rpclink_core::{Error, JsonRpcErrorData};
//!
//! let wire = JsonRpcErrorData::method_not_found("tools/frobnicate");
//! assert_eq!(wire.code, -32601);
//!
//! let error = Error::Protocol(wire);
//! assert_eq!(error.metric_label(), "protocol");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for rpclink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the rpclink client engine
///
/// The type is `Clone` because structural failures (a dropped connection,
/// a deliberate disconnect) are fanned out to every pending request.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A request was issued while the connection was not open
    ///
    /// Requests are never queued: this fails immediately.
    #[error("Not connected")]
    NotConnected,

    /// No response arrived within the request timeout
    ///
    /// Only the request that timed out fails; the connection stays up.
    #[error("Request '{method}' timed out after {timeout_ms}ms")]
    Timeout {
        /// Method of the request that timed out
        method: String,
        /// Configured timeout in milliseconds
        timeout_ms: u64,
    },

    /// The peer answered with a JSON-RPC error object
    #[error("JSON-RPC error: {0}")]
    Protocol(#[from] JsonRpcErrorData),

    /// Low-level WebSocket or socket failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The connection dropped while the request was in flight
    #[error("Connection lost")]
    ConnectionLost,

    /// The request was abandoned by a deliberate `disconnect()`
    #[error("Connection closed")]
    ConnectionClosed,

    /// The `initialize` exchange failed or timed out
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    /// The reconnection strategy gave up
    #[error("Reconnection abandoned after {attempts} attempts")]
    ReconnectExhausted {
        /// Number of attempts made before giving up
        attempts: u32,
    },

    /// Serialization or deserialization error
    ///
    /// Usually a mismatch between the expected result type and the payload
    /// the peer sent back.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An inbound frame was valid JSON but not a JSON-RPC envelope
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// The client configuration was rejected before connecting
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Short, stable label used as a metrics attribute
    pub fn metric_label(&self) -> &'static str {
        match self {
            Error::NotConnected => "not_connected",
            Error::Timeout { .. } => "timeout",
            Error::Protocol(_) => "protocol",
            Error::Transport(_) => "transport",
            Error::ConnectionLost => "connection_lost",
            Error::ConnectionClosed => "connection_closed",
            Error::HandshakeFailed(_) => "handshake",
            Error::ReconnectExhausted { .. } => "reconnect_exhausted",
            Error::Serialization(_) => "serialization",
            Error::InvalidMessage(_) => "invalid_message",
            Error::InvalidConfig(_) => "invalid_config",
            Error::Internal(_) => "internal",
        }
    }

    /// Whether the error was caused by the connection going away rather than
    /// by the request itself
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Error::NotConnected
                | Error::Transport(_)
                | Error::ConnectionLost
                | Error::ConnectionClosed
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// JSON-RPC 2.0 error object, exactly as it appears on the wire
///
/// ```json
/// {"code": -32601, "message": "Method not found", "data": {...}}
/// ```
///
/// `data` is optional and omitted when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorData {
    /// Numeric error code
    ///
    /// Codes from -32768 to -32000 are reserved by JSON-RPC 2.0.
    pub code: i32,

    /// Short human-readable description
    pub message: String,

    /// Optional structured detail supplied by the peer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcErrorData {
    /// Create an error object with code and message
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Method not found (-32601)
    ///
    /// ```rust
    /// use rpclink_core::JsonRpcErrorData;
    ///
    /// let error = JsonRpcErrorData::method_not_found("sampling/createMessage");
    /// assert_eq!(error.message, "Method not found: sampling/createMessage");
    /// ```
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(-32601, format!("Method not found: {}", method.into()))
    }
}

impl std::fmt::Display for JsonRpcErrorData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcErrorData {}
