//! Client metrics definitions
//!
//! OpenTelemetry instruments for client health. They are recorded only when
//! the client was built with `ClientBuilder::with_observability()`, and are
//! exported by whatever meter provider is installed globally.
//!
//! # Metrics Collected
//!
//! - **rpclink.client.connection.state**: current state (gauge, see
//!   [`ConnectionState::as_gauge`])
//! - **rpclink.client.requests.total**: requests by method and status (counter)
//! - **rpclink.client.request.duration**: request latency in seconds (histogram)
//! - **rpclink.client.errors.total**: errors by kind (counter)
//! - **rpclink.client.timeouts.total**: timed-out requests by method (counter)
//! - **rpclink.client.reconnection.attempts**: scheduled attempts (counter)
//! - **rpclink.client.reconnection.success**: successful reconnects (counter)
//! - **rpclink.client.notifications.received**: notifications by method (counter)

use crate::connection_state::ConnectionState;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};
use rpclink_core::{Error, Result};
use serde_json::Value;
use std::time::Duration;

/// Instrumentation scope for every client instrument
pub const METER_NAME: &str = "rpclink.client";

/// Client instruments
pub struct ClientMetrics {
    pub connection_state: Gauge<i64>,
    pub requests_total: Counter<u64>,
    pub request_duration: Histogram<f64>,
    pub errors_total: Counter<u64>,
    pub timeouts_total: Counter<u64>,
    pub reconnection_attempts: Counter<u64>,
    pub reconnection_success: Counter<u64>,
    pub notifications_received: Counter<u64>,
}

impl ClientMetrics {
    /// Instruments on the global meter provider
    pub fn new() -> Self {
        Self::new_with_meter(&global::meter(METER_NAME))
    }

    /// Instruments on a caller-supplied meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("rpclink.client.connection.state")
                .with_description("Connection state (0=idle, 1=connecting, 2=open, 3=closed)")
                .build(),
            requests_total: meter
                .u64_counter("rpclink.client.requests.total")
                .with_description("Total number of requests sent")
                .build(),
            request_duration: meter
                .f64_histogram("rpclink.client.request.duration")
                .with_description("Request duration in seconds")
                .with_unit("s")
                .build(),
            errors_total: meter
                .u64_counter("rpclink.client.errors.total")
                .with_description("Total number of errors encountered")
                .build(),
            timeouts_total: meter
                .u64_counter("rpclink.client.timeouts.total")
                .with_description("Total number of requests that timed out")
                .build(),
            reconnection_attempts: meter
                .u64_counter("rpclink.client.reconnection.attempts")
                .with_description("Total number of reconnection attempts")
                .build(),
            reconnection_success: meter
                .u64_counter("rpclink.client.reconnection.success")
                .with_description("Total number of successful reconnections")
                .build(),
            notifications_received: meter
                .u64_counter("rpclink.client.notifications.received")
                .with_description("Total number of notifications received")
                .build(),
        }
    }

    pub fn update_connection_state(&self, state: ConnectionState) {
        self.connection_state.record(state.as_gauge(), &[]);
    }

    /// Record a settled request, its latency and any error
    pub fn record_request(&self, method: &str, outcome: &Result<Value>, elapsed: Duration) {
        let status = if outcome.is_ok() { "success" } else { "error" };
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(elapsed.as_secs_f64(), attributes);

        if let Err(e) = outcome {
            if matches!(e, Error::Timeout { .. }) {
                self.timeouts_total
                    .add(1, &[KeyValue::new("method", method.to_string())]);
            }
            self.record_error(e);
        }
    }

    /// Count an error, tagged with its kind and whether the connection caused it
    pub fn record_error(&self, error: &Error) {
        self.errors_total.add(
            1,
            &[
                KeyValue::new("error_type", error.metric_label()),
                KeyValue::new("connection", error.is_connection_error()),
            ],
        );
    }

    pub fn record_reconnection_attempt(&self) {
        self.reconnection_attempts.add(1, &[]);
    }

    pub fn record_reconnection_success(&self) {
        self.reconnection_success.add(1, &[]);
    }

    pub fn record_notification(&self, method: &str) {
        self.notifications_received
            .add(1, &[KeyValue::new("method", method.to_string())]);
    }
}

impl Default for ClientMetrics {
    fn default() -> Self {
        Self::new()
    }
}
