//! WebSocket transport tests against a local graphql-transport-ws server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use graphql_subscriber_core::{
    ConnectionState, LogCategory, LogSeverity, NoopLogger, SubscribeRequest, SubscriberError,
};
use graphql_subscriber_net::{SubscriberConfig, connect};
use http::HeaderMap;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tracing_subscriber::EnvFilter;

const WAIT: Duration = Duration::from_secs(5);

/// Route `tracing` output of the crates to the test writer. Override the
/// filter with `RUST_LOG`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("graphql_subscriber=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init()
        .ok();
}

/// Accept one connection, echo the requested subprotocol, record the
/// handshake headers and hand the stream to `handler`.
async fn spawn_server<F, Fut>(handler: F) -> (SocketAddr, Arc<Mutex<HeaderMap>>)
where
    F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let headers = Arc::new(Mutex::new(HeaderMap::new()));
    let captured = headers.clone();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = move |request: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
            *captured.lock() = request.headers().clone();
            if let Some(protocol) = request.headers().get(http::header::SEC_WEBSOCKET_PROTOCOL) {
                response
                    .headers_mut()
                    .insert(http::header::SEC_WEBSOCKET_PROTOCOL, protocol.clone());
            }
            Ok(response)
        };
        let ws = tokio_tungstenite::accept_hdr_async(stream, callback).await.unwrap();
        handler(ws).await;
    });

    (addr, headers)
}

/// A minimal graphql-transport-ws server: acknowledges `connection_init`,
/// answers every `subscribe` with one `next`, and reports each text frame it
/// receives on `frames`.
async fn graphql_server(mut ws: WebSocketStream<TcpStream>, frames: mpsc::UnboundedSender<Value>) {
    while let Some(Ok(message)) = ws.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let Ok(frame) = serde_json::from_str::<Value>(text.as_str()) else {
            continue;
        };
        let _ = frames.send(frame.clone());

        let reply = match frame["type"].as_str() {
            Some("connection_init") => Some(json!({"type": "connection_ack"})),
            Some("subscribe") => Some(json!({
                "type": "next",
                "id": frame["id"],
                "payload": {"data": {"a": 1}},
            })),
            _ => None,
        };
        if let Some(reply) = reply
            && ws.send(Message::Text(reply.to_string().into())).await.is_err()
        {
            break;
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_subscription_round_trip() {
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel();
    let (addr, headers) = spawn_server(move |ws| graphql_server(ws, frames_tx)).await;

    let manager = connect(
        SubscriberConfig::new("ws://127.0.0.1/graphql")
            .port(addr.port())
            .header("Authorization", "Bearer token")
            .logger(NoopLogger),
    )
    .unwrap();
    timeout(WAIT, manager.wait_until_ready()).await.unwrap().unwrap();

    let (payload_tx, mut payload_rx) = mpsc::unbounded_channel();
    let request = SubscribeRequest::new("X", "subscription { a }");
    let id = manager.fingerprint(&request);
    assert!(manager.subscribe(request, move |payload| {
        let _ = payload_tx.send(payload.clone());
    }));

    let payload = timeout(WAIT, payload_rx.recv()).await.unwrap().unwrap();
    assert_eq!(payload, json!({"data": {"a": 1}}));

    let init = timeout(WAIT, frames_rx.recv()).await.unwrap().unwrap();
    assert_eq!(init, json!({"type": "connection_init", "payload": {}}));
    let subscribe = timeout(WAIT, frames_rx.recv()).await.unwrap().unwrap();
    assert_eq!(subscribe["type"], "subscribe");
    assert_eq!(subscribe["id"], id.as_str());
    assert_eq!(subscribe["payload"]["query"], "subscription { a }");

    {
        let headers = headers.lock();
        assert_eq!(headers.get("sec-websocket-protocol").unwrap(), "graphql-transport-ws");
        assert_eq!(headers.get("authorization").unwrap(), "Bearer token");
    }

    manager.close();
    let terminate = timeout(WAIT, frames_rx.recv()).await.unwrap().unwrap();
    assert_eq!(terminate, json!({"type": "connection_terminate"}));
    assert_eq!(manager.connection_state(), ConnectionState::Terminated);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_subscribe_before_ack_is_flushed() {
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel();
    let (addr, _) = spawn_server(move |ws| graphql_server(ws, frames_tx)).await;

    let manager =
        connect(SubscriberConfig::new(format!("ws://{addr}")).logger(NoopLogger)).unwrap();

    let (payload_tx, mut payload_rx) = mpsc::unbounded_channel();
    let accepted = manager.subscribe(SubscribeRequest::new("X", "subscription { a }"), move |payload| {
        let _ = payload_tx.send(payload.clone());
    });
    assert!(!accepted);

    let payload = timeout(WAIT, payload_rx.recv()).await.unwrap().unwrap();
    assert_eq!(payload, json!({"data": {"a": 1}}));
    assert_eq!(manager.queued_count(), 0);

    let mut subscribes = 0;
    while let Ok(frame) = frames_rx.try_recv() {
        if frame["type"] == "subscribe" {
            subscribes += 1;
        }
    }
    assert_eq!(subscribes, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_custom_init_payload() {
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel();
    let (addr, _) = spawn_server(move |ws| graphql_server(ws, frames_tx)).await;

    let manager = connect(
        SubscriberConfig::new(format!("ws://{addr}"))
            .init_payload(json!({"token": "secret"}))
            .logger(NoopLogger),
    )
    .unwrap();
    timeout(WAIT, manager.wait_until_ready()).await.unwrap().unwrap();

    let init = timeout(WAIT, frames_rx.recv()).await.unwrap().unwrap();
    assert_eq!(init["payload"], json!({"token": "secret"}));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_keep_alive_pings() {
    let (pings_tx, mut pings_rx) = mpsc::unbounded_channel();
    let (addr, _) = spawn_server(move |mut ws| async move {
        while let Some(Ok(message)) = ws.next().await {
            if let Message::Ping(_) = message {
                let _ = pings_tx.send(());
            }
        }
    })
    .await;

    let _manager = connect(
        SubscriberConfig::new(format!("ws://{addr}"))
            .keep_alive_interval(Duration::from_millis(50))
            .logger(NoopLogger),
    )
    .unwrap();

    timeout(WAIT, pings_rx.recv()).await.unwrap().unwrap();
    timeout(WAIT, pings_rx.recv()).await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_server_close_is_logged() {
    let (addr, _) = spawn_server(|mut ws| async move {
        let _ = ws.close(None).await;
    })
    .await;

    let records = Arc::new(Mutex::new(Vec::new()));
    let sink = records.clone();
    let manager = connect(SubscriberConfig::new(format!("ws://{addr}")).logger(
        move |severity: LogSeverity, _: LogCategory, message: &str, _: Option<&Value>| {
            sink.lock().push((severity, message.to_string()));
        },
    ))
    .unwrap();

    assert_eq!(
        timeout(WAIT, manager.wait_until_ready()).await.unwrap(),
        Err(SubscriberError::ConnectionClosed)
    );
    assert_eq!(manager.connection_state(), ConnectionState::Closed);
    assert!(
        records
            .lock()
            .contains(&(LogSeverity::Info, "Socket connection closed".to_string()))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_refused_connection_is_reported() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let records = Arc::new(Mutex::new(Vec::new()));
    let sink = records.clone();
    let manager = connect(SubscriberConfig::new(format!("ws://{addr}")).logger(
        move |severity: LogSeverity, _: LogCategory, message: &str, _: Option<&Value>| {
            sink.lock().push((severity, message.to_string()));
        },
    ))
    .unwrap();

    assert_eq!(
        timeout(WAIT, manager.wait_until_ready()).await.unwrap(),
        Err(SubscriberError::ConnectionClosed)
    );
    let records = records.lock();
    assert!(records.contains(&(
        LogSeverity::Emergency,
        "Error occurs during socket connection".to_string()
    )));
    assert!(!manager.subscribe(SubscribeRequest::new("X", "subscription { a }"), |_| {}));
}

#[test]
fn test_invalid_url_is_rejected() {
    init_tracing();
    assert!(connect(SubscriberConfig::new("not a url")).is_err());
}
