//! Notification dispatcher
//!
//! Server-initiated notifications carry no id and expect no answer. The
//! dispatcher maps an event name (the notification's `method`) to the ordered
//! list of callbacks subscribed to it.
//!
//! # Delivery Rules
//!
//! - Callbacks for one event run in subscription order, one after another
//! - A callback that panics is logged and skipped; the rest still run
//! - Events nobody subscribed to are dropped
//! - Dispatch runs inline in the connection's reader, so the next inbound
//!   frame is not read until every callback for this one has finished
//!
//! Because of the last rule a callback must not await a request on the same
//! client: the response could never be read. Spawn a task instead.
//!
//! # Examples
//!
//! ```rust,no_run
//! use rpclink_client::LinkClient;
//!
//! # async fn example(client: &LinkClient) {
//! let id = client
//!     .subscribe("notifications/resources/list_changed", |params| async move {
//!         println!("resources changed: {}", params);
//!     })
//!     .await;
//!
//! client.unsubscribe("notifications/resources/list_changed", id).await;
//! # }
//! ```

use futures::future::BoxFuture;
use futures::FutureExt;
use rpclink_core::JsonRpcNotification;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Type-erased notification callback
pub type NotificationFn = Arc<dyn Fn(Value) -> BoxFuture<'static, ()> + Send + Sync>;

/// Handle identifying one subscription, returned by `subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    by_event: HashMap<String, Vec<(SubscriptionId, NotificationFn)>>,
}

/// Event name to ordered subscriber list, private to one client
#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    registry: Arc<Mutex<Registry>>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback for `event`
    ///
    /// The callback receives the notification's `params`, or `null` when the
    /// notification had none.
    pub async fn subscribe<F, Fut>(&self, event: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: NotificationFn = Arc::new(move |params| handler(params).boxed());
        let event = event.into();

        let mut registry = self.registry.lock().await;
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        tracing::debug!(event = %event, subscription = %id, "Subscribed");
        registry.by_event.entry(event).or_default().push((id, handler));
        id
    }

    /// Remove one callback; returns `false` if it was not subscribed to `event`
    pub async fn unsubscribe(&self, event: &str, id: SubscriptionId) -> bool {
        let mut registry = self.registry.lock().await;
        let Some(handlers) = registry.by_event.get_mut(event) else {
            return false;
        };

        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            registry.by_event.remove(event);
        }
        removed
    }

    /// Fan a notification out to its subscribers
    ///
    /// Returns how many callbacks completed without panicking.
    pub async fn dispatch(&self, notification: JsonRpcNotification) -> usize {
        // Snapshot so callbacks can (un)subscribe without deadlocking.
        let handlers: Vec<(SubscriptionId, NotificationFn)> = {
            let registry = self.registry.lock().await;
            match registry.by_event.get(&notification.method) {
                Some(handlers) => handlers.clone(),
                None => Vec::new(),
            }
        };

        if handlers.is_empty() {
            tracing::debug!(event = %notification.method, "No subscribers for notification");
            return 0;
        }

        let params = notification.params.unwrap_or(Value::Null);
        let mut completed = 0;
        for (id, handler) in handlers {
            let started = std::panic::catch_unwind(AssertUnwindSafe(|| handler(params.clone())));
            let outcome = match started {
                Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
                Err(panic) => Err(panic),
            };

            match outcome {
                Ok(()) => completed += 1,
                Err(_) => tracing::error!(
                    event = %notification.method,
                    subscription = %id,
                    "Notification handler panicked"
                ),
            }
        }
        completed
    }

    pub async fn has_subscribers(&self, event: &str) -> bool {
        self.registry.lock().await.by_event.contains_key(event)
    }

    /// Event names with at least one subscriber
    pub async fn events(&self) -> Vec<String> {
        self.registry.lock().await.by_event.keys().cloned().collect()
    }

    /// Drop every subscription
    pub async fn clear(&self) {
        self.registry.lock().await.by_event.clear();
    }
}
