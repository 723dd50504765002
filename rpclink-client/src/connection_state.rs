//! Connection state and the reconnection state machine
//!
//! # Connection States
//!
//! - **Idle**: created, never connected
//! - **Connecting**: transport opening or handshake in flight
//! - **Open**: handshake acknowledged; requests are permitted
//! - **Closed**: connection gone, deliberately or not
//!
//! # State Transitions
//!
//! ```text
//! Idle → Connecting → Open → Closed
//!            ↑  ↓              │
//!            │ Closed          │ unexpected close
//!            └─────────────────┘ (after backoff delay)
//! ```
//!
//! # Reconnection Logic
//!
//! After an unexpected close:
//! 1. Ask [`ConnectionManager::next_reconnect_delay`] for the next delay
//! 2. Wait the delay
//! 3. Reconnect (transport + handshake)
//! 4. On success the attempt counter and strategy reset
//! 5. On failure repeat from step 1; once the strategy gives up, publish
//!    [`ConnectionEvent::ReconnectExhausted`] and stop
//!
//! A deliberate disconnect sets a flag the loop checks before every attempt.

use crate::reconnect::ReconnectionStrategy;
use rpclink_core::{Error, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};

const EVENT_CAPACITY: usize = 64;

/// Lifecycle state of a client's connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Never connected
    Idle,
    /// Opening the transport or running the handshake
    Connecting,
    /// Handshake complete; requests are permitted
    Open,
    /// Disconnected
    Closed,
}

impl ConnectionState {
    /// Numeric value used by the connection state gauge
    pub fn as_gauge(self) -> i64 {
        match self {
            ConnectionState::Idle => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Open => 2,
            ConnectionState::Closed => 3,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Lifecycle events published to [`LinkClient::events`](crate::LinkClient::events)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Transport open and handshake acknowledged
    Opened,
    /// The connection closed
    Closed {
        /// `true` when caused by `disconnect()`
        deliberate: bool,
    },
    /// A reconnection attempt is scheduled
    Reconnecting {
        /// 1-based attempt number
        attempt: u32,
        /// Wait before the attempt
        delay: Duration,
    },
    /// The strategy gave up; the client stays closed until `connect()`
    ReconnectExhausted {
        /// Attempts made since the last successful open
        attempts: u32,
    },
}

/// Owns the connection state, the reconnect counter and the strategy
pub struct ConnectionManager {
    state: watch::Sender<ConnectionState>,
    strategy: Mutex<Box<dyn ReconnectionStrategy>>,
    attempts: AtomicU32,
    deliberate: AtomicBool,
    events: broadcast::Sender<ConnectionEvent>,
}

impl ConnectionManager {
    /// Manager in the `Idle` state
    pub fn new(strategy: Box<dyn ReconnectionStrategy>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state,
            strategy: Mutex::new(strategy),
            attempts: AtomicU32::new(0),
            deliberate: AtomicBool::new(false),
            events,
        }
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Receiver for lifecycle events published from now on
    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Connection state changed");
        }
    }

    /// Transport opening or handshake in flight
    pub fn connecting(&self) {
        self.set_state(ConnectionState::Connecting);
    }

    /// Handshake succeeded: reset the counter and strategy, publish `Opened`
    pub async fn opened(&self) {
        self.attempts.store(0, Ordering::SeqCst);
        self.strategy.lock().await.reset();
        self.set_state(ConnectionState::Open);
        self.publish(ConnectionEvent::Opened);
    }

    /// The connection is gone
    pub fn closed(&self, deliberate: bool) {
        self.set_state(ConnectionState::Closed);
        self.publish(ConnectionEvent::Closed { deliberate });
    }

    /// Suppress reconnection until the next `connect()`
    pub fn mark_deliberate(&self) {
        self.deliberate.store(true, Ordering::SeqCst);
    }

    pub fn clear_deliberate(&self) {
        self.deliberate.store(false, Ordering::SeqCst);
    }

    pub fn is_deliberate(&self) -> bool {
        self.deliberate.load(Ordering::SeqCst)
    }

    /// Attempts made since the last successful open
    pub fn reconnect_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Delay before the next reconnection attempt
    ///
    /// Increments the attempt counter and publishes `Reconnecting`.
    ///
    /// # Errors
    ///
    /// Returns `Error::ReconnectExhausted` (and publishes the matching event)
    /// once the strategy gives up. The counter is left as is, so every later
    /// call keeps failing until a successful open resets it.
    pub async fn next_reconnect_delay(&self) -> Result<Duration> {
        let attempt = self.attempts.load(Ordering::SeqCst);
        let delay = self.strategy.lock().await.next_delay(attempt);

        match delay {
            Some(delay) => {
                let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                self.publish(ConnectionEvent::Reconnecting { attempt, delay });
                Ok(delay)
            }
            None => {
                self.publish(ConnectionEvent::ReconnectExhausted { attempts: attempt });
                Err(Error::ReconnectExhausted { attempts: attempt })
            }
        }
    }

    fn publish(&self, event: ConnectionEvent) {
        // No listeners is the common case.
        let _ = self.events.send(event);
    }
}
