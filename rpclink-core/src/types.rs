//! JSON-RPC 2.0 envelope types
//!
//! Every frame on the wire is one [`Envelope`]:
//!
//! 1. **Request**: `id` + `method`, expects a response
//! 2. **Response**: `id` + exactly one of `result` / `error`
//! 3. **Notification**: `method` without `id`, expects nothing back
//!
//! Inbound classification happens once, at parse time, from the presence or
//! absence of the `id` member (see [`Envelope::from_value`]). Downstream code
//! matches on the variant and never inspects raw JSON properties.

use crate::error::{Error, JsonRpcErrorData, Result};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Protocol version string carried in every envelope
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 request ID
///
/// The client only ever allocates numeric ids, but peers may echo strings or
/// `null` (for errors about unparseable requests), so all three shapes are
/// accepted on the way in.
///
/// ```rust
/// use rpclink_core::Id;
///
/// let id: Id = 7u64.into();
/// assert_eq!(id.as_u64(), Some(7));
/// assert_eq!(Id::from("abc").as_u64(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    /// String identifier
    String(String),
    /// Numeric identifier
    Number(i64),
    /// Null identifier
    Null,
}

impl Id {
    /// The id as a correlation key, if it is a non-negative number
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Id::Number(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::String(s) => write!(f, "\"{}\"", s),
            Id::Number(n) => write!(f, "{}", n),
            Id::Null => write!(f, "null"),
        }
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::String(s.to_string())
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::String(s)
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Number(n)
    }
}

impl From<u64> for Id {
    /// Ids above `i64::MAX` saturate; the client counter never gets there.
    fn from(n: u64) -> Self {
        Id::Number(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

/// JSON-RPC 2.0 request
///
/// `params` is omitted from the encoded frame when `None`.
///
/// ```rust
/// use rpclink_core::{Id, JsonRpcRequest};
/// use serde_json::json;
///
/// let req = JsonRpcRequest::new("resources/read", Some(json!({"uri": "file:///a"})), Id::Number(3));
/// assert_eq!(req.jsonrpc, "2.0");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Correlation id
    pub id: Id,
    /// Remote method name
    pub method: String,
    /// Optional object or array parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a new request
    pub fn new(method: impl Into<String>, params: Option<Value>, id: Id) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 notification (no `id`, no response)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Event or method name
    pub method: String,
    /// Optional event payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a new notification
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// What a response carries: a result or an error, never both
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    /// `result` member, which may legitimately be `null`
    Success(Value),
    /// `error` member
    Failure(JsonRpcErrorData),
}

/// JSON-RPC 2.0 response
///
/// The result/error exclusivity is carried by [`ResponseOutcome`] rather than
/// by a pair of options, so a `{"result": null}` success cannot be confused
/// with a missing result.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcResponse {
    /// Id of the request this answers
    pub id: Id,
    /// Result or error
    pub outcome: ResponseOutcome,
}

impl JsonRpcResponse {
    /// Successful response
    pub fn success(result: Value, id: Id) -> Self {
        Self {
            id,
            outcome: ResponseOutcome::Success(result),
        }
    }

    /// Error response
    pub fn error(error: JsonRpcErrorData, id: Id) -> Self {
        Self {
            id,
            outcome: ResponseOutcome::Failure(error),
        }
    }

    /// Convert the outcome into the caller-facing result
    pub fn into_result(self) -> Result<Value> {
        match self.outcome {
            ResponseOutcome::Success(value) => Ok(value),
            ResponseOutcome::Failure(error) => Err(Error::Protocol(error)),
        }
    }
}

impl Serialize for JsonRpcResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("jsonrpc", JSONRPC_VERSION)?;
        map.serialize_entry("id", &self.id)?;
        match &self.outcome {
            ResponseOutcome::Success(result) => map.serialize_entry("result", result)?,
            ResponseOutcome::Failure(error) => map.serialize_entry("error", error)?,
        }
        map.end()
    }
}

/// One JSON-RPC frame, classified
#[derive(Debug, Clone)]
pub enum Envelope {
    /// Peer-initiated call expecting an answer
    Request(JsonRpcRequest),
    /// Answer to one of our requests
    Response(JsonRpcResponse),
    /// Peer-initiated event
    Notification(JsonRpcNotification),
}

impl Envelope {
    /// Classify a decoded JSON value
    ///
    /// | `id` member | `method` member | variant        |
    /// |-------------|-----------------|----------------|
    /// | present     | present         | Request        |
    /// | present     | absent          | Response       |
    /// | absent      | present         | Notification   |
    /// | absent      | absent          | error          |
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidMessage` for arrays (batches are not supported),
    /// non-objects, a `jsonrpc` member other than "2.0", a non-string method,
    /// a malformed id, or a response with neither `result` nor `error`.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut object = match value {
            Value::Object(object) => object,
            Value::Array(_) => {
                return Err(Error::InvalidMessage("batches are not supported".into()))
            }
            other => {
                return Err(Error::InvalidMessage(format!(
                    "expected a JSON object, got {}",
                    json_kind(&other)
                )))
            }
        };

        if let Some(version) = object.get("jsonrpc") {
            if version.as_str() != Some(JSONRPC_VERSION) {
                return Err(Error::InvalidMessage(format!(
                    "unsupported jsonrpc version {}",
                    version
                )));
            }
        }

        let id = match object.remove("id") {
            Some(raw) => Some(
                serde_json::from_value::<Id>(raw)
                    .map_err(|_| Error::InvalidMessage("malformed id".into()))?,
            ),
            None => None,
        };
        let method = take_method(&mut object)?;
        let params = object.remove("params");

        match (id, method) {
            (Some(id), Some(method)) => Ok(Envelope::Request(JsonRpcRequest::new(method, params, id))),
            (Some(id), None) => Ok(Envelope::Response(take_outcome(id, &mut object)?)),
            (None, Some(method)) => Ok(Envelope::Notification(JsonRpcNotification::new(
                method, params,
            ))),
            (None, None) => Err(Error::InvalidMessage(
                "envelope has neither id nor method".into(),
            )),
        }
    }

    /// Short name of the variant, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Request(_) => "request",
            Envelope::Response(_) => "response",
            Envelope::Notification(_) => "notification",
        }
    }
}

fn take_method(object: &mut Map<String, Value>) -> Result<Option<String>> {
    match object.remove("method") {
        None => Ok(None),
        Some(Value::String(method)) => Ok(Some(method)),
        Some(_) => Err(Error::InvalidMessage("method must be a string".into())),
    }
}

fn take_outcome(id: Id, object: &mut Map<String, Value>) -> Result<JsonRpcResponse> {
    if let Some(raw) = object.remove("error") {
        let error = serde_json::from_value::<JsonRpcErrorData>(raw)
            .map_err(|e| Error::InvalidMessage(format!("malformed error object: {}", e)))?;
        return Ok(JsonRpcResponse::error(error, id));
    }
    match object.remove("result") {
        Some(result) => Ok(JsonRpcResponse::success(result, id)),
        None => Err(Error::InvalidMessage(format!(
            "response {} has neither result nor error",
            id
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
