//! Correlation table for in-flight requests
//!
//! Every request the client sends gets an entry here until exactly one of
//! these settles it:
//!
//! 1. **Resolve**: a response with the same id arrives
//! 2. **Timeout**: the per-request timer fires first
//! 3. **Fail**: the send itself failed
//! 4. **Clear**: the connection went away and every entry is rejected
//!
//! # Single Settle Point
//!
//! Removal from the map is the only way to reach an entry's completion
//! channel, and it happens under the map lock. Whoever removes the entry
//! settles it; everyone else finds nothing and does nothing. A timer that
//! wakes after its response was matched therefore cannot fire, and a
//! response arriving after its timeout is discarded.
//!
//! # Ids
//!
//! Ids come from a monotonically increasing counter starting at 1 that is
//! never reset, so an id is never reused, not even across reconnects.

use rpclink_core::{Error, JsonRpcResponse, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

/// Receiver half handed to the caller awaiting a result
pub type PendingReceiver = oneshot::Receiver<Result<Value>>;

struct PendingOperation {
    method: String,
    tx: oneshot::Sender<Result<Value>>,
    timer: JoinHandle<()>,
}

impl PendingOperation {
    fn settle(self, outcome: Result<Value>) {
        self.timer.abort();
        // The caller may have stopped waiting.
        let _ = self.tx.send(outcome);
    }
}

type PendingMap = HashMap<u64, PendingOperation>;

/// Map from request id to pending operation, private to one client
#[derive(Clone)]
pub struct CorrelationTable {
    pending: Arc<Mutex<PendingMap>>,
    next_id: Arc<AtomicU64>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Allocate an id and register a pending operation with its timer
    ///
    /// The timer is started here, before the request is transmitted.
    pub async fn register(&self, method: &str, timeout: Duration) -> (u64, PendingReceiver) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        let mut pending = self.pending.lock().await;
        let timer = tokio::spawn(expire_after(
            Arc::clone(&self.pending),
            id,
            method.to_string(),
            timeout,
        ));
        pending.insert(
            id,
            PendingOperation {
                method: method.to_string(),
                tx,
                timer,
            },
        );

        (id, rx)
    }

    /// Settle the entry matching `response.id`
    ///
    /// Returns `false` when no entry matches (unknown, duplicate or late
    /// response); such responses are dropped.
    pub async fn resolve(&self, response: JsonRpcResponse) -> bool {
        let Some(id) = response.id.as_u64() else {
            return false;
        };
        let Some(operation) = self.pending.lock().await.remove(&id) else {
            return false;
        };

        tracing::trace!(id, method = %operation.method, "Response matched");
        operation.settle(response.into_result());
        true
    }

    /// Settle one entry with an error
    pub async fn fail(&self, id: u64, error: Error) -> bool {
        match self.pending.lock().await.remove(&id) {
            Some(operation) => {
                operation.settle(Err(error));
                true
            }
            None => false,
        }
    }

    /// Reject every pending entry with `error`, returning how many there were
    pub async fn clear(&self, error: Error) -> usize {
        let drained: Vec<PendingOperation> = {
            let mut pending = self.pending.lock().await;
            pending.drain().map(|(_, operation)| operation).collect()
        };
        let count = drained.len();
        for operation in drained {
            operation.settle(Err(error.clone()));
        }
        count
    }

    pub async fn contains(&self, id: u64) -> bool {
        self.pending.lock().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new()
    }
}

async fn expire_after(pending: Arc<Mutex<PendingMap>>, id: u64, method: String, timeout: Duration) {
    tokio::time::sleep(timeout).await;

    let Some(operation) = pending.lock().await.remove(&id) else {
        return;
    };
    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    tracing::warn!(id, method = %method, timeout_ms, "Request timed out");
    let _ = operation.tx.send(Err(Error::Timeout { method, timeout_ms }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpclink_core::{Id, JsonRpcErrorData};
    use serde_json::json;

    const LONG: Duration = Duration::from_secs(30);

    #[tokio::test]
    async fn test_ids_are_monotonic_from_one() {
        let table = CorrelationTable::new();
        let (first, _rx1) = table.register("a", LONG).await;
        let (second, _rx2) = table.register("b", LONG).await;

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(table.len().await, 2);
    }

    #[tokio::test]
    async fn test_resolve_success_removes_entry() {
        let table = CorrelationTable::new();
        let (id, rx) = table.register("tools/list", LONG).await;

        let matched = table
            .resolve(JsonRpcResponse::success(json!({"tools": []}), Id::from(id)))
            .await;

        assert!(matched);
        assert!(!table.contains(id).await);
        assert_eq!(rx.await.unwrap().unwrap(), json!({"tools": []}));
    }

    #[tokio::test]
    async fn test_resolve_error_response() {
        let table = CorrelationTable::new();
        let (id, rx) = table.register("tools/call", LONG).await;

        let error = JsonRpcErrorData::new(-32000, "Tool crashed");
        table.resolve(JsonRpcResponse::error(error.clone(), Id::from(id))).await;

        match rx.await.unwrap() {
            Err(Error::Protocol(data)) => assert_eq!(data, error),
            other => panic!("expected protocol error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_and_duplicate_responses_are_discarded() {
        let table = CorrelationTable::new();
        let (id, _rx) = table.register("x", LONG).await;

        assert!(!table.resolve(JsonRpcResponse::success(json!(1), Id::Number(999))).await);
        assert!(!table.resolve(JsonRpcResponse::success(json!(1), Id::from("1"))).await);
        assert!(table.resolve(JsonRpcResponse::success(json!(1), Id::from(id))).await);
        assert!(!table.resolve(JsonRpcResponse::success(json!(1), Id::from(id))).await);
    }

    #[tokio::test]
    async fn test_timeout_removes_entry_and_late_response_is_dropped() {
        let table = CorrelationTable::new();
        let (id, rx) = table.register("tools/call", Duration::from_millis(50)).await;

        match rx.await.unwrap() {
            Err(Error::Timeout { method, timeout_ms }) => {
                assert_eq!(method, "tools/call");
                assert_eq!(timeout_ms, 50);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(!table.contains(id).await);
        assert!(!table.resolve(JsonRpcResponse::success(json!(1), Id::from(id))).await);
    }

    #[tokio::test]
    async fn test_timer_does_not_fire_after_resolve() {
        let table = CorrelationTable::new();
        let (id, rx) = table.register("x", Duration::from_millis(30)).await;

        table.resolve(JsonRpcResponse::success(json!("ok"), Id::from(id))).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(rx.await.unwrap().unwrap(), json!("ok"));
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn test_out_of_order_resolution() {
        let table = CorrelationTable::new();
        let (first, rx1) = table.register("a", LONG).await;
        let (second, mut rx2) = table.register("b", LONG).await;

        table.resolve(JsonRpcResponse::success(json!("second"), Id::from(second))).await;
        assert_eq!(rx2.try_recv().unwrap().unwrap(), json!("second"));
        assert!(table.contains(first).await);

        table.resolve(JsonRpcResponse::success(json!("first"), Id::from(first))).await;
        assert_eq!(rx1.await.unwrap().unwrap(), json!("first"));
    }

    #[tokio::test]
    async fn test_fail_single_entry() {
        let table = CorrelationTable::new();
        let (id, rx) = table.register("x", LONG).await;

        assert!(table.fail(id, Error::Transport("broken pipe".into())).await);
        assert!(!table.fail(id, Error::ConnectionLost).await);
        assert!(matches!(rx.await.unwrap(), Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn test_clear_rejects_everything() {
        let table = CorrelationTable::new();
        let (_, rx1) = table.register("a", LONG).await;
        let (_, rx2) = table.register("b", LONG).await;

        assert_eq!(table.clear(Error::ConnectionLost).await, 2);
        assert!(table.is_empty().await);
        assert!(matches!(rx1.await.unwrap(), Err(Error::ConnectionLost)));
        assert!(matches!(rx2.await.unwrap(), Err(Error::ConnectionLost)));

        let (next, _rx) = table.register("c", LONG).await;
        assert_eq!(next, 3);
    }
}
