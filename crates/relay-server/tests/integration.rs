//! End-to-end integration tests using real WebSocket clients.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use relay_client::{ClientConfig, ClientError, RelayClient};
use relay_server::{MethodError, RelayServer, ServerConfig};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Boot a test server with the fixture methods/events and return its WS URL.
async fn boot_server() -> (String, RelayServer) {
    let server = RelayServer::new(ServerConfig::default());

    server
        .register_fn("/", "double", |params, _conn| async move {
            let n = params
                .first()
                .and_then(Value::as_i64)
                .ok_or_else(|| MethodError::new("expected a number"))?;
            Ok(Some(json!(n * 2)))
        })
        .unwrap();

    server
        .register_fn("/", "boom", |_params, _conn| async move {
            Err(MethodError::new("bad"))
        })
        .unwrap();

    // Sleeps params[0] milliseconds, then returns params[1].
    server
        .register_fn("/", "sleepy", |params, _conn| async move {
            let ms = params.first().and_then(Value::as_u64).unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(params.get(1).cloned())
        })
        .unwrap();

    server
        .register_fn("/", "ping", |_params, _conn| async move { Ok(None) })
        .unwrap();

    server.declare_event("/", "tick").unwrap();
    // Creates the /chat namespace as a side effect
    server.declare_event("/chat", "tick").unwrap();
    server.declare_event("/chat", "chat.message").unwrap();

    let (addr, _handle) = server.listen().await.unwrap();
    (format!("ws://{addr}"), server)
}

/// Poll until `cond` holds, failing the test after [`TIMEOUT`].
async fn wait_until(cond: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {TIMEOUT:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn raw_connect(url: &str) -> WsStream {
    connect_async(url).await.unwrap().0
}

/// Send a raw text frame and return the next text frame, parsed.
async fn raw_roundtrip(ws: &mut WsStream, frame: &str) -> Value {
    ws.send(Message::Text(frame.to_owned().into()))
        .await
        .unwrap();
    loop {
        let msg = timeout(TIMEOUT, ws.next()).await.unwrap().unwrap().unwrap();
        match msg {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            _ => {}
        }
    }
}

// ── Call/response scenarios ─────────────────────────────────────────

#[tokio::test]
async fn registered_method_round_trip() {
    let (url, _server) = boot_server().await;
    let client = RelayClient::connect(&url).await.unwrap();

    let result = client.call("double", vec![json!(21)]).await.unwrap();
    assert_eq!(result, Some(json!(42)));
}

#[tokio::test]
async fn unregistered_method_not_found() {
    let (url, _server) = boot_server().await;
    let client = RelayClient::connect(&url).await.unwrap();

    let err = client.call("foo", vec![]).await.unwrap_err();
    let call_err = err.as_call_error().unwrap();
    assert_eq!(call_err.code, -32601);
    assert_eq!(call_err.message, "Method not found");
}

#[tokio::test]
async fn throwing_handler_becomes_application_error() {
    let (url, _server) = boot_server().await;
    let client = RelayClient::connect(&url).await.unwrap();

    let err = client.call("boom", vec![]).await.unwrap_err();
    let call_err = err.as_call_error().unwrap();
    assert_eq!(call_err.code, -32000);
    assert_eq!(call_err.message, "bad");
}

#[tokio::test]
async fn void_method_returns_absent_result() {
    let (url, _server) = boot_server().await;
    let client = RelayClient::connect(&url).await.unwrap();

    let result = client.call("ping", vec![]).await.unwrap();
    assert_eq!(result, None);
}

#[tokio::test]
async fn concurrent_calls_correlate_by_id() {
    let (url, _server) = boot_server().await;
    let client = RelayClient::connect(&url).await.unwrap();

    // The slow call is issued first but finishes last; each outcome must
    // match the id it was sent with, not arrival order.
    let slow = client.call("sleepy", vec![json!(200), json!("slow")]);
    let fast = client.call("sleepy", vec![json!(10), json!("fast")]);
    let (slow_result, fast_result) = tokio::join!(slow, fast);

    assert_eq!(slow_result.unwrap(), Some(json!("slow")));
    assert_eq!(fast_result.unwrap(), Some(json!("fast")));
}

#[tokio::test]
async fn slow_handler_does_not_block_later_frames() {
    let (url, _server) = boot_server().await;
    let client = RelayClient::connect(&url).await.unwrap();

    let started = tokio::time::Instant::now();
    let slow = client.call("sleepy", vec![json!(500), json!("slow")]);
    let quick = client.call("double", vec![json!(1)]);
    let (slow_result, quick_result) = tokio::join!(slow, quick);

    assert_eq!(quick_result.unwrap(), Some(json!(2)));
    assert_eq!(slow_result.unwrap(), Some(json!("slow")));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn timed_out_call_settles_and_late_response_is_dropped() {
    let (url, _server) = boot_server().await;
    let config = ClientConfig {
        call_timeout_ms: 50,
        ..ClientConfig::default()
    };
    let client = RelayClient::connect_with(&url, config).await.unwrap();

    let err = client
        .call("sleepy", vec![json!(300), json!("late")])
        .await
        .unwrap_err();
    let call_err = err.as_call_error().unwrap();
    assert_eq!(call_err.code, -32700);
    assert!(call_err.message.contains("timed out"));

    // The late response for the first id must not bleed into this call.
    tokio::time::sleep(Duration::from_millis(400)).await;
    let result = client.call("double", vec![json!(21)]).await.unwrap();
    assert_eq!(result, Some(json!(42)));
}

// ── Subscriptions and fan-out ───────────────────────────────────────

#[tokio::test]
async fn subscription_round_trip_delivers_exactly_once() {
    let (url, server) = boot_server().await;
    let client = RelayClient::connect(&url).await.unwrap();

    let seen: Arc<Mutex<Vec<Vec<Value>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    client
        .subscribe("tick", move |params| sink.lock().push(params))
        .await
        .unwrap();

    assert_eq!(server.emit("/", "tick", vec![json!(1)]), 1);
    wait_until(|| !seen.lock().is_empty()).await;
    assert_eq!(seen.lock().as_slice(), &[vec![json!(1)]]);

    client.unsubscribe("tick").await.unwrap();
    assert_eq!(server.emit("/", "tick", vec![json!(2)]), 0);
    tokio::time::sleep(Duration::from_millis(100)).await;
    // Still exactly one delivery
    assert_eq!(seen.lock().len(), 1);
}

#[tokio::test]
async fn fan_out_reaches_all_subscribers_in_namespace_only() {
    let (url, server) = boot_server().await;

    let count_a = Arc::new(AtomicUsize::new(0));
    let count_b = Arc::new(AtomicUsize::new(0));
    let count_chat = Arc::new(AtomicUsize::new(0));

    let client_a = RelayClient::connect(&url).await.unwrap();
    let client_b = RelayClient::connect(&url).await.unwrap();
    let client_chat = RelayClient::connect(&format!("{url}/chat")).await.unwrap();

    let payloads: Arc<Mutex<Vec<Vec<Value>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = payloads.clone();
    let counter = count_a.clone();
    client_a
        .subscribe("tick", move |params| {
            sink.lock().push(params);
            let _ = counter.fetch_add(1, Ordering::Relaxed);
        })
        .await
        .unwrap();

    let counter = count_b.clone();
    client_b
        .subscribe("tick", move |_| {
            let _ = counter.fetch_add(1, Ordering::Relaxed);
        })
        .await
        .unwrap();

    // Same event name, different namespace
    let counter = count_chat.clone();
    client_chat
        .subscribe("tick", move |_| {
            let _ = counter.fetch_add(1, Ordering::Relaxed);
        })
        .await
        .unwrap();

    assert_eq!(server.emit("/", "tick", vec![json!(1)]), 2);

    wait_until(|| {
        count_a.load(Ordering::Relaxed) == 1 && count_b.load(Ordering::Relaxed) == 1
    })
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(payloads.lock().as_slice(), &[vec![json!(1)]]);
    assert_eq!(count_chat.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn method_table_is_namespace_isolated() {
    let (url, _server) = boot_server().await;
    let client_chat = RelayClient::connect(&format!("{url}/chat")).await.unwrap();

    // `double` is registered only on "/"
    let err = client_chat.call("double", vec![json!(21)]).await.unwrap_err();
    assert_eq!(err.as_call_error().unwrap().code, -32601);
}

#[tokio::test]
async fn emit_to_unknown_event_is_noop() {
    let (_url, server) = boot_server().await;
    assert_eq!(server.emit("/", "undeclared", vec![json!(1)]), 0);
    assert_eq!(server.emit("/nowhere", "tick", vec![json!(1)]), 0);
}

#[tokio::test]
async fn disconnect_cleans_up_subscriptions() {
    let (url, server) = boot_server().await;
    let client = RelayClient::connect(&url).await.unwrap();
    client.subscribe("tick", |_| {}).await.unwrap();
    assert_eq!(server.registry().connection_count(), 1);

    client.close().await;
    wait_until(|| server.registry().connection_count() == 0).await;

    // No error, no delivery attempt to the departed connection
    assert_eq!(server.emit("/", "tick", vec![json!(1)]), 0);
}

#[tokio::test]
async fn subscribing_to_foreign_namespace_event_fails() {
    let (url, _server) = boot_server().await;
    // `chat.message` is declared only in /chat
    let client = RelayClient::connect(&url).await.unwrap();
    let err = client.subscribe("chat.message", |_| {}).await.unwrap_err();
    assert_eq!(err.as_call_error().unwrap().code, -32602);
}

// ── Accept-time namespace validation ────────────────────────────────

#[tokio::test]
async fn unknown_namespace_rejected_at_accept() {
    let (url, _server) = boot_server().await;
    assert!(connect_async(format!("{url}/nope")).await.is_err());
}

#[tokio::test]
async fn invalid_namespace_path_rejected_at_accept() {
    let (url, _server) = boot_server().await;
    assert!(connect_async(format!("{url}/bad-path")).await.is_err());
}

#[tokio::test]
async fn declared_namespace_accepts_connections() {
    let (url, _server) = boot_server().await;
    assert!(RelayClient::connect(&format!("{url}/chat")).await.is_ok());
}

// ── Wire-level protocol shape ───────────────────────────────────────

#[tokio::test]
async fn invalid_json_gets_parse_error_with_null_id() {
    let (url, _server) = boot_server().await;
    let mut ws = raw_connect(&url).await;

    let v = raw_roundtrip(&mut ws, "this is not json").await;
    assert!(v["id"].is_null());
    assert_eq!(v["error"]["code"], -32700);
    assert_eq!(v["error"]["message"], "Parse error");
}

#[tokio::test]
async fn subscribe_and_unsubscribe_ack_shapes() {
    let (url, _server) = boot_server().await;
    let mut ws = raw_connect(&url).await;

    let v = raw_roundtrip(
        &mut ws,
        r#"{"jsonrpc":"2.0","id":1,"method":"rpc.on","params":["tick"]}"#,
    )
    .await;
    assert_eq!(v["id"], 1);
    assert_eq!(v["result"]["tick"], true);

    let v = raw_roundtrip(
        &mut ws,
        r#"{"jsonrpc":"2.0","id":2,"method":"rpc.off","params":["tick"]}"#,
    )
    .await;
    assert_eq!(v["id"], 2);
    assert_eq!(v["result"]["tick"], false);
}

#[tokio::test]
async fn control_method_without_params_is_invalid() {
    let (url, _server) = boot_server().await;
    let mut ws = raw_connect(&url).await;

    let v = raw_roundtrip(&mut ws, r#"{"jsonrpc":"2.0","id":3,"method":"rpc.on","params":[]}"#)
        .await;
    assert_eq!(v["error"]["code"], -32602);
}

#[tokio::test]
async fn success_response_carries_jsonrpc_version() {
    let (url, _server) = boot_server().await;
    let mut ws = raw_connect(&url).await;

    let v = raw_roundtrip(
        &mut ws,
        r#"{"jsonrpc":"2.0","id":4,"method":"double","params":[21]}"#,
    )
    .await;
    assert_eq!(v["jsonrpc"], "2.0");
    assert_eq!(v["id"], 4);
    assert_eq!(v["result"], 42);
}

#[tokio::test]
async fn notification_frame_shape() {
    let (url, server) = boot_server().await;
    let mut ws = raw_connect(&url).await;

    let ack = raw_roundtrip(
        &mut ws,
        r#"{"jsonrpc":"2.0","id":5,"method":"rpc.on","params":["tick"]}"#,
    )
    .await;
    assert_eq!(ack["result"]["tick"], true);

    assert_eq!(server.emit("/", "tick", vec![json!(1), json!("x")]), 1);

    let v = loop {
        let msg = timeout(TIMEOUT, ws.next()).await.unwrap().unwrap().unwrap();
        if let Message::Text(text) = msg {
            break serde_json::from_str::<Value>(text.as_str()).unwrap();
        }
    };
    assert_eq!(v["jsonrpc"], "2.0");
    assert_eq!(v["notification"], "tick");
    assert_eq!(v["params"], json!([1, "x"]));
    assert!(v.get("id").is_none());
}

// ── Client-side settling guarantees ─────────────────────────────────

#[tokio::test]
async fn in_flight_call_settles_when_connection_closes() {
    let (url, _server) = boot_server().await;
    let client = RelayClient::connect(&url).await.unwrap();

    let pending = client.call("sleepy", vec![json!(10_000), json!("never")]);
    let close = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.close().await;
    };
    let (result, ()) = tokio::join!(pending, close);

    // Settles with a closed-connection error, not a silent hang
    assert!(matches!(result.unwrap_err(), ClientError::NotConnected));
}
