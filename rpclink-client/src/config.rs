//! Client configuration
//!
//! [`ClientConfig`] is the single immutable value a [`LinkClient`](crate::LinkClient)
//! is built from. It deserializes from camelCase JSON so any configuration
//! loader can hand it over directly:
//!
//! ```rust
//! use rpclink_client::ClientConfig;
//!
//! let config: ClientConfig = serde_json::from_str(r#"{
//!     "serverAddress": "ws://127.0.0.1:9000/rpc",
//!     "authToken": "s3cret",
//!     "requestTimeoutMs": 5000
//! }"#).unwrap();
//!
//! assert_eq!(config.max_reconnect_attempts, 5);
//! assert!(config.validate().is_ok());
//! ```

use rpclink_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio_tungstenite::tungstenite::http::Uri;

/// Protocol revision announced in the `initialize` handshake by default
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// Name and version the client announces to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client name
    pub name: String,
    /// Client version
    pub version: String,
}

impl ClientInfo {
    /// Create client identity
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    }
}

/// Settings for one client instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// `ws://` or `wss://` address of the server
    pub server_address: String,

    /// Opaque token sent as `Authorization: Bearer <token>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Per-request timeout, handshake included
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Reconnection attempts after an unexpected close before giving up
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Capabilities object sent in `initialize`
    #[serde(default = "default_capabilities")]
    pub declared_capabilities: Value,

    /// Identity sent in `initialize`
    #[serde(default)]
    pub client_info: ClientInfo,

    /// Protocol revision sent in `initialize`
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,

    /// First reconnection delay
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,

    /// Upper bound on any reconnection delay
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,

    /// Limit on TCP connect plus WebSocket upgrade
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_capabilities() -> Value {
    Value::Object(Default::default())
}

fn default_protocol_version() -> String {
    DEFAULT_PROTOCOL_VERSION.to_string()
}

fn default_reconnect_base_delay_ms() -> u64 {
    1_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl ClientConfig {
    /// Defaults for everything but the server address
    pub fn new(server_address: impl Into<String>) -> Self {
        Self {
            server_address: server_address.into(),
            auth_token: None,
            request_timeout_ms: default_request_timeout_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            declared_capabilities: default_capabilities(),
            client_info: ClientInfo::default(),
            protocol_version: default_protocol_version(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }

    /// Reject configurations that could never connect
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` when the address is not a `ws`/`wss`
    /// URI, a timeout is zero, the capabilities are not a JSON object, or
    /// the base reconnection delay exceeds the cap.
    pub fn validate(&self) -> Result<()> {
        let uri: Uri = self.server_address.parse().map_err(|e| {
            Error::InvalidConfig(format!("serverAddress '{}': {}", self.server_address, e))
        })?;
        match uri.scheme_str() {
            Some("ws") | Some("wss") => {}
            other => {
                return Err(Error::InvalidConfig(format!(
                    "serverAddress must use ws:// or wss://, got {:?}",
                    other.unwrap_or("")
                )))
            }
        }
        if uri.host().is_none() {
            return Err(Error::InvalidConfig("serverAddress has no host".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::InvalidConfig("requestTimeoutMs must be positive".into()));
        }
        if self.connect_timeout_ms == 0 {
            return Err(Error::InvalidConfig("connectTimeoutMs must be positive".into()));
        }
        if self.reconnect_base_delay_ms > self.reconnect_max_delay_ms {
            return Err(Error::InvalidConfig(
                "reconnectBaseDelayMs exceeds reconnectMaxDelayMs".into(),
            ));
        }
        if !self.declared_capabilities.is_object() {
            return Err(Error::InvalidConfig(
                "declaredCapabilities must be a JSON object".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_delay_ms)
    }
}
