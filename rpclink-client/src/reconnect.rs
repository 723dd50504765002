//! Reconnection strategies
//!
//! When the connection drops unexpectedly, the strategy decides how long to
//! wait before the next attempt and when to stop trying. The connection
//! manager owns the attempt counter; the strategy is a pure delay function of
//! the attempt index.
//!
//! # Built-in Strategies
//!
//! - **ExponentialBackoff**: `min(base * 2^n, cap)`, bounded attempts (default)
//! - **FixedDelay**: constant delay between attempts
//! - **NoReconnect**: never reconnect
//!
//! # Examples
//!
//! ```rust
//! use rpclink_client::{ExponentialBackoff, ReconnectionStrategy};
//! use std::time::Duration;
//!
//! let mut backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(30))
//!     .with_max_attempts(5);
//!
//! assert_eq!(backoff.next_delay(0), Some(Duration::from_secs(1)));
//! assert_eq!(backoff.next_delay(3), Some(Duration::from_secs(8)));
//! assert_eq!(backoff.next_delay(5), None);
//! ```

use crate::config::ClientConfig;
use std::time::Duration;

/// Delay policy for reconnection attempts
///
/// `next_delay` is consulted once per attempt with a 0-based attempt index.
/// Strategies that keep state of their own override `reset`, which runs after
/// every successful open.
pub trait ReconnectionStrategy: Send + Sync {
    /// Delay before attempt `attempt`, or `None` to give up
    fn next_delay(&mut self, attempt: u32) -> Option<Duration>;

    fn reset(&mut self) {}
}

/// `true` while `attempt` is below the optional limit
fn within_limit(limit: Option<u32>, attempt: u32) -> bool {
    limit.map_or(true, |max| attempt < max)
}

/// Exponential backoff with a delay cap and optional jitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExponentialBackoff {
    base: Duration,
    cap: Duration,
    limit: Option<u32>,
    jitter: bool,
}

impl ExponentialBackoff {
    /// Unbounded backoff from `base` up to `cap`
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            limit: None,
            jitter: false,
        }
    }

    /// Give up once `max_attempts` attempts have been made
    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self {
            limit: Some(max_attempts),
            ..self
        }
    }

    /// Stretch each delay by a random 0-25%
    pub fn with_jitter(self) -> Self {
        Self { jitter: true, ..self }
    }

    /// `min(base * 2^attempt, cap)` in milliseconds, saturating
    fn capped_ms(&self, attempt: u32) -> u64 {
        let base = u64::try_from(self.base.as_millis()).unwrap_or(u64::MAX);
        let cap = u64::try_from(self.cap.as_millis()).unwrap_or(u64::MAX);
        1u64.checked_shl(attempt)
            .map_or(u64::MAX, |factor| base.saturating_mul(factor))
            .min(cap)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::from(&ClientConfig::new(""))
    }
}

impl From<&ClientConfig> for ExponentialBackoff {
    fn from(config: &ClientConfig) -> Self {
        Self::new(config.reconnect_base_delay(), config.reconnect_max_delay())
            .with_max_attempts(config.max_reconnect_attempts)
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        if !within_limit(self.limit, attempt) {
            return None;
        }

        let mut ms = self.capped_ms(attempt);
        if self.jitter {
            use rand::Rng;
            ms = ms.saturating_add(rand::thread_rng().gen_range(0..=ms / 4));
        }
        Some(Duration::from_millis(ms))
    }
}

/// Constant delay between attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedDelay {
    delay: Duration,
    limit: Option<u32>,
}

impl FixedDelay {
    /// Retry forever every `delay`
    pub fn new(delay: Duration) -> Self {
        Self { delay, limit: None }
    }

    /// Give up once `max_attempts` attempts have been made
    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self {
            limit: Some(max_attempts),
            ..self
        }
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        within_limit(self.limit, attempt).then_some(self.delay)
    }
}

/// Never reconnect; an unexpected close is final
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReconnect;

impl ReconnectionStrategy for NoReconnect {
    fn next_delay(&mut self, _: u32) -> Option<Duration> {
        None
    }
}
