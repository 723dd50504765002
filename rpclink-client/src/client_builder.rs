//! Client builder for configuration, reconnection and observability
//!
//! The `ClientBuilder` provides a fluent alternative to filling in a
//! [`ClientConfig`] by hand. On top of the config fields it lets you:
//! - Swap the reconnection strategy (defaults to backoff from the config)
//! - Enable OpenTelemetry observability and client metrics
//!
//! # Examples
//!
//! ```rust,no_run
//! use rpclink_client::{ClientBuilder, FixedDelay};
//! use std::time::Duration;
//!
//! # async fn example() -> rpclink_core::Result<()> {
//! let client = ClientBuilder::new("ws://localhost:8080/rpc")
//!     .with_auth_token("s3cret")
//!     .with_request_timeout(Duration::from_secs(10))
//!     .with_client_info("desk-agent", "0.4.2")
//!     .connect()
//!     .await?;
//!
//! let tools = client.list_tools().await?;
//!
//! // Fixed retry interval, observability on
//! let client2 = ClientBuilder::new("ws://localhost:8080/rpc")
//!     .with_reconnect(Box::new(FixedDelay::new(Duration::from_secs(2)).with_max_attempts(20)))
//!     .with_default_observability()
//!     .service_name("desk-agent")
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{ClientConfig, ClientInfo};
use crate::reconnect::{ExponentialBackoff, NoReconnect, ReconnectionStrategy};
use crate::{ClientMetrics, LinkClient};
use rpclink_core::{ObservabilityConfig, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Builder for configuring and creating a [`LinkClient`]
pub struct ClientBuilder {
    config: ClientConfig,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl ClientBuilder {
    /// Builder with default settings for `server_address`
    pub fn new(server_address: impl Into<String>) -> Self {
        Self::from_config(ClientConfig::new(server_address))
    }

    /// Builder seeded from an existing config
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            reconnect_strategy: None,
            observability_config: None,
            service_name: None,
        }
    }

    /// Token sent as `Authorization: Bearer <token>`
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.config.auth_token = Some(token.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = duration_ms(timeout);
        self
    }

    /// Attempts the default backoff makes before giving up
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    /// Base and cap of the default backoff
    pub fn with_reconnect_delays(mut self, base: Duration, max: Duration) -> Self {
        self.config.reconnect_base_delay_ms = duration_ms(base);
        self.config.reconnect_max_delay_ms = duration_ms(max);
        self
    }

    /// Capabilities declared in the handshake
    pub fn with_capabilities(mut self, capabilities: Value) -> Self {
        self.config.declared_capabilities = capabilities;
        self
    }

    pub fn with_client_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.config.client_info = ClientInfo::new(name, version);
        self
    }

    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.config.protocol_version = version.into();
        self
    }

    /// Replace the backoff derived from the config
    pub fn with_reconnect(mut self, strategy: Box<dyn ReconnectionStrategy>) -> Self {
        self.reconnect_strategy = Some(strategy);
        self
    }

    /// Never reconnect after an unexpected close
    pub fn without_reconnect(mut self) -> Self {
        self.reconnect_strategy = Some(Box::new(NoReconnect));
        self
    }

    /// Enable OpenTelemetry observability with custom configuration
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Enable OpenTelemetry observability with default configuration
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Service name for observability (used if observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Validate and create an idle client
    ///
    /// # Errors
    ///
    /// `Error::InvalidConfig` if the assembled config fails validation.
    pub fn build(self) -> Result<LinkClient> {
        self.config.validate()?;

        let metrics = match self.observability_config {
            Some(mut observability) => {
                if let Some(name) = self.service_name {
                    observability.service_name = name;
                }
                // A second client in the same process finds the pipeline installed.
                if let Err(e) = rpclink_core::init_observability(observability) {
                    tracing::warn!(error = %e, "Observability not initialized");
                }
                Some(Arc::new(ClientMetrics::new()))
            }
            None => None,
        };

        let strategy = match self.reconnect_strategy {
            Some(strategy) => strategy,
            None => Box::new(ExponentialBackoff::from(&self.config)),
        };

        Ok(LinkClient::from_parts(self.config, strategy, metrics))
    }

    /// Build the client and connect it
    pub async fn connect(self) -> Result<LinkClient> {
        let client = self.build()?;
        client.connect().await?;
        Ok(client)
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
