//! Codec for JSON-RPC envelopes
//!
//! Text frames in, [`Envelope`]s out; typed messages in, text frames out.
//! The transport already delimits frames, so the codec never has to find
//! message boundaries itself.
//!
//! # Error Mapping
//!
//! - Invalid JSON -> `Error::InvalidMessage` (the frame is discarded)
//! - Valid JSON that is not an envelope -> `Error::InvalidMessage`
//! - Outbound values that cannot be encoded -> `Error::Serialization`
//!
//! # Examples
//!
//! ```rust
//! use rpclink_core::{codec, Envelope, Id, JsonRpcRequest};
//!
//! let request = JsonRpcRequest::new("tools/list", None, Id::Number(1));
//! let text = codec::encode_request(&request).unwrap();
//! assert_eq!(text, r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#);
//!
//! let inbound = codec::decode(r#"{"jsonrpc":"2.0","id":1,"result":{"tools":[]}}"#).unwrap();
//! assert!(matches!(inbound, Envelope::Response(_)));
//! ```

use crate::error::{Error, Result};
use crate::types::{Envelope, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use serde::Serialize;

/// Encode any serializable message to a JSON string
///
/// # Errors
///
/// Returns `Error::Serialization` if the value cannot be represented as JSON
/// (for example a map with non-string keys).
pub fn encode<T: Serialize>(msg: &T) -> Result<String> {
    serde_json::to_string(msg).map_err(|e| Error::Serialization(e.to_string()))
}

/// Encode a request
pub fn encode_request(req: &JsonRpcRequest) -> Result<String> {
    encode(req)
}

/// Encode a notification
pub fn encode_notification(notif: &JsonRpcNotification) -> Result<String> {
    encode(notif)
}

/// Encode a response
pub fn encode_response(resp: &JsonRpcResponse) -> Result<String> {
    encode(resp)
}

/// Decode one text frame into a classified envelope
///
/// # Errors
///
/// Returns `Error::InvalidMessage` if the frame is not JSON, or is JSON but
/// not a single JSON-RPC 2.0 envelope.
pub fn decode(data: &str) -> Result<Envelope> {
    let value: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| Error::InvalidMessage(format!("parse error: {}", e)))?;
    Envelope::from_value(value)
}
