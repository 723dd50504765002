//! Notification dispatch integration tests

mod common;

use common::MockServer;
use rpclink_client::LinkClient;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

async fn recv(rx: &mut mpsc::UnboundedReceiver<Value>) -> Option<Value> {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .ok()
        .flatten()
}

#[tokio::test]
async fn test_notification_delivered() {
    let server = MockServer::start().await;
    let client = LinkClient::start(server.config()).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    client
        .subscribe("notifications/message", move |params| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(params);
            }
        })
        .await;

    server.notify("notifications/message", json!({"level": "info", "data": "hello"}));

    let params = recv(&mut rx).await.unwrap();
    assert_eq!(params, json!({"level": "info", "data": "hello"}));
}

#[tokio::test]
async fn test_notification_without_params() {
    let server = MockServer::start().await;
    let client = LinkClient::start(server.config()).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    client
        .subscribe("notifications/tools/list_changed", move |params| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(params);
            }
        })
        .await;

    server.send(json!({"jsonrpc": "2.0", "method": "notifications/tools/list_changed"}));

    assert_eq!(recv(&mut rx).await.unwrap(), Value::Null);
}

#[tokio::test]
async fn test_subscribers_run_in_registration_order() {
    let server = MockServer::start().await;
    let client = LinkClient::start(server.config()).await.unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();

    let first = Arc::clone(&order);
    client
        .subscribe("resources/listChanged", move |_| {
            let first = Arc::clone(&first);
            async move {
                first.lock().unwrap().push("first");
            }
        })
        .await;

    let second = Arc::clone(&order);
    client
        .subscribe("resources/listChanged", move |params| {
            let second = Arc::clone(&second);
            let done_tx = done_tx.clone();
            async move {
                second.lock().unwrap().push("second");
                let _ = done_tx.send(params);
            }
        })
        .await;

    server.notify("resources/listChanged", json!({"uri": "file:///a"}));

    assert_eq!(recv(&mut done_rx).await.unwrap(), json!({"uri": "file:///a"}));
    assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
}

#[tokio::test]
async fn test_notifications_delivered_in_arrival_order() {
    let server = MockServer::start().await;
    let client = LinkClient::start(server.config()).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    client
        .subscribe("progress", move |params| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(params);
            }
        })
        .await;

    for pct in [10, 20, 30, 40] {
        server.notify("progress", json!({"pct": pct}));
    }

    for pct in [10, 20, 30, 40] {
        assert_eq!(recv(&mut rx).await.unwrap(), json!({"pct": pct}));
    }
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let server = MockServer::start().await;
    let client = LinkClient::start(server.config()).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let id = client
        .subscribe("progress", move |params| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(params);
            }
        })
        .await;

    let (barrier_tx, mut barrier_rx) = mpsc::unbounded_channel();
    client
        .subscribe("barrier", move |params| {
            let barrier_tx = barrier_tx.clone();
            async move {
                let _ = barrier_tx.send(params);
            }
        })
        .await;

    assert!(client.unsubscribe("progress", id).await);
    assert!(!client.unsubscribe("progress", id).await);
    assert_eq!(client.subscribed_events().await, vec!["barrier".to_string()]);

    server.notify("progress", json!({"pct": 99}));
    server.notify("barrier", json!(null));

    // Notifications dispatch in arrival order, so the barrier proves the
    // earlier one was already handled.
    recv(&mut barrier_rx).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_clear_subscriptions() {
    let server = MockServer::start().await;
    let client = LinkClient::start(server.config()).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    for event in ["progress", "log"] {
        let tx = tx.clone();
        client
            .subscribe(event, move |params| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(params);
                }
            })
            .await;
    }
    assert_eq!(client.subscribed_events().await.len(), 2);

    client.clear_subscriptions().await;
    assert!(client.subscribed_events().await.is_empty());

    let (barrier_tx, mut barrier_rx) = mpsc::unbounded_channel();
    client
        .subscribe("barrier", move |params| {
            let barrier_tx = barrier_tx.clone();
            async move {
                let _ = barrier_tx.send(params);
            }
        })
        .await;

    server.notify("progress", json!({"pct": 50}));
    server.notify("log", json!({"line": "x"}));
    server.notify("barrier", json!(null));

    recv(&mut barrier_rx).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_unmatched_notification_ignored() {
    let server = MockServer::start().await;
    let client = LinkClient::start(server.config()).await.unwrap();

    server.notify("nobody/listens", json!({"x": 1}));

    let pending = {
        let client = client.clone();
        tokio::spawn(async move { client.send_request("still/alive", None).await })
    };
    let request = server.next_message().await.unwrap();
    server.respond(&request["id"], json!("yes"));

    assert_eq!(pending.await.unwrap().unwrap(), json!("yes"));
}

#[tokio::test]
async fn test_panicking_subscriber_isolated() {
    let server = MockServer::start().await;
    let client = LinkClient::start(server.config()).await.unwrap();

    client
        .subscribe("progress", |_| async move {
            panic!("subscriber failure");
        })
        .await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    client
        .subscribe("progress", move |params| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(params);
            }
        })
        .await;

    server.notify("progress", json!({"pct": 1}));
    server.notify("progress", json!({"pct": 2}));

    assert_eq!(recv(&mut rx).await.unwrap(), json!({"pct": 1}));
    assert_eq!(recv(&mut rx).await.unwrap(), json!({"pct": 2}));
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_subscriptions_survive_reconnect() {
    let server = MockServer::start().await;
    let client = LinkClient::start(server.config()).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    client
        .subscribe("progress", move |params| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(params);
            }
        })
        .await;

    client.disconnect().await;
    client.connect().await.unwrap();

    server.notify("progress", json!({"pct": 100}));
    assert_eq!(recv(&mut rx).await.unwrap(), json!({"pct": 100}));
}
