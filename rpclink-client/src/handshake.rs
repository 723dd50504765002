//! The `initialize` handshake
//!
//! Runs once per successful transport open, before the connection is
//! reported as `Open`:
//!
//! 1. Send `initialize` with our protocol version, capabilities and identity
//! 2. Await the result through the correlation table (same timeout and error
//!    rules as any request)
//! 3. Send the `notifications/initialized` notification
//! 4. Keep the server's [`InitializeResult`]
//!
//! Any success response acknowledges the handshake. A server answering with a
//! different protocol version, or with a result we cannot read, is accepted
//! with a warning.

use crate::client::ClientInner;
use crate::config::{ClientConfig, ClientInfo};
use rpclink_core::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const INITIALIZE_METHOD: &str = "initialize";
pub const INITIALIZED_NOTIFICATION: &str = "notifications/initialized";

/// Parameters of the `initialize` request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    pub capabilities: Value,
    pub client_info: ClientInfo,
}

impl From<&ClientConfig> for InitializeParams {
    fn from(config: &ClientConfig) -> Self {
        Self {
            protocol_version: config.protocol_version.clone(),
            capabilities: config.declared_capabilities.clone(),
            client_info: config.client_info.clone(),
        }
    }
}

/// Server identity from the `initialize` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// What the server told us during the handshake
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol revision the server settled on; empty if it did not say
    #[serde(default)]
    pub protocol_version: String,
    /// Server capabilities, verbatim
    #[serde(default)]
    pub capabilities: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_info: Option<ServerInfo>,
    /// Free-form usage hints from the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl InitializeResult {
    /// Read a successful `initialize` result, falling back to defaults
    pub fn from_ack(raw: Value) -> Self {
        if raw.is_null() {
            return Self::default();
        }
        serde_json::from_value(raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Unreadable initialize result, using defaults");
            Self::default()
        })
    }
}

/// Run the handshake on a freshly opened transport
///
/// Uses the ungated send path: the connection is still `Connecting`.
#[tracing::instrument(skip_all, fields(protocol_version = %inner.config.protocol_version))]
pub(crate) async fn perform(inner: &ClientInner) -> Result<InitializeResult> {
    let params = serde_json::to_value(InitializeParams::from(&inner.config))?;
    let raw = inner.call(INITIALIZE_METHOD, Some(params)).await?;
    let result = InitializeResult::from_ack(raw);

    if !result.protocol_version.is_empty() && result.protocol_version != inner.config.protocol_version {
        tracing::warn!(
            requested = %inner.config.protocol_version,
            negotiated = %result.protocol_version,
            "Server negotiated a different protocol version"
        );
    }

    inner.transmit_notification(INITIALIZED_NOTIFICATION, None).await?;

    tracing::info!(
        server = result.server_info.as_ref().map(|s| s.name.as_str()).unwrap_or("unknown"),
        protocol_version = %result.protocol_version,
        "Handshake complete"
    );
    Ok(result)
}
