//! End-to-end tests for the relay over a real listener.
//!
//! Browsers are played by a tokio-tungstenite client (WebSocket backend),
//! reqwest (polling backend) and the crate's own `RelayClient`.

use axum::Router;
use fob_relay::client::{ClientAction, RelayClient};
use fob_relay::config::{OverlaySetting, ReconnectBudget};
use fob_relay::{BuildSummary, Diagnostic, RelayConfig, RelayHandle, RelayServer, TransportKind};
use futures_util::StreamExt;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn start(config: RelayConfig) -> (SocketAddr, RelayHandle) {
    let (app, relay) = RelayServer::attach(&config, Router::new()).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    (addr, relay)
}

async fn connect(addr: SocketAddr, origin: &str) -> Socket {
    let mut request = format!("ws://{}/ws", addr).into_client_request().unwrap();
    request
        .headers_mut()
        .insert("origin", HeaderValue::from_str(origin).unwrap());
    let (socket, _) = tokio_tungstenite::connect_async(request).await.unwrap();
    socket
}

async fn connect_local(addr: SocketAddr) -> Socket {
    connect(addr, &format!("http://{}", addr)).await
}

/// Next text frame; pings are answered by tungstenite while reading.
async fn next_text(socket: &mut Socket) -> String {
    loop {
        let message = timeout(WAIT, socket.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket ended")
            .expect("socket error");
        match message {
            Message::Text(text) => return text.to_string(),
            Message::Close(frame) => panic!("socket closed: {:?}", frame),
            _ => continue,
        }
    }
}

async fn wait_for_connections(relay: &RelayHandle, expected: usize) {
    timeout(WAIT, async {
        while relay.status().await.unwrap().connections != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connection count never settled");
}

#[tokio::test]
async fn test_ws_burst_and_build_diffing() {
    let (addr, relay) = start(RelayConfig::default()).await;
    let mut socket = connect_local(addr).await;

    // No build yet: the burst is just the announced options.
    assert_eq!(next_text(&mut socket).await, r#"{"type":"liveReload"}"#);

    relay.build_done(BuildSummary::new("abc")).unwrap();
    assert_eq!(next_text(&mut socket).await, r#"{"type":"hash","data":"abc"}"#);
    assert_eq!(next_text(&mut socket).await, r#"{"type":"ok"}"#);

    relay.build_done(BuildSummary::new("abc")).unwrap();
    assert_eq!(next_text(&mut socket).await, r#"{"type":"still-ok"}"#);

    relay
        .build_done(
            BuildSummary::new("def")
                .with_warnings(vec![Diagnostic::new("unused import").with_file("app.js")])
                .with_errors(vec![Diagnostic::new("unexpected token")]),
        )
        .unwrap();
    assert_eq!(next_text(&mut socket).await, r#"{"type":"hash","data":"def"}"#);
    assert_eq!(
        next_text(&mut socket).await,
        r#"{"type":"warnings","data":[{"message":"unused import","file":"app.js"}],"params":{"preventReloading":true}}"#
    );
    assert_eq!(
        next_text(&mut socket).await,
        r#"{"type":"errors","data":[{"message":"unexpected token"}]}"#
    );

    let status = relay.status().await.unwrap();
    assert_eq!(status.connections, 1);
    assert_eq!(status.current_hash.as_deref(), Some("def"));
}

#[tokio::test]
async fn test_ws_late_joiner_gets_configured_burst_and_current_build() {
    let mut config = RelayConfig {
        hot: true,
        ..RelayConfig::default()
    };
    config.client.reconnect = Some(ReconnectBudget::Limited(3));
    config.client.overlay = Some(OverlaySetting::Enabled(true));
    let (addr, relay) = start(config).await;

    relay.build_done(BuildSummary::new("abc")).unwrap();
    let mut socket = connect_local(addr).await;

    let mut frames = Vec::new();
    for _ in 0..6 {
        frames.push(next_text(&mut socket).await);
    }
    assert_eq!(
        frames,
        [
            r#"{"type":"hot"}"#,
            r#"{"type":"liveReload"}"#,
            r#"{"type":"reconnect","data":3}"#,
            r#"{"type":"overlay","data":true}"#,
            r#"{"type":"hash","data":"abc"}"#,
            r#"{"type":"ok"}"#,
        ]
    );
}

#[tokio::test]
async fn test_ws_side_channel_broadcasts() {
    let (addr, relay) = start(RelayConfig::default()).await;
    let mut first = connect_local(addr).await;
    let mut second = connect_local(addr).await;
    next_text(&mut first).await;
    next_text(&mut second).await;

    relay.invalid().unwrap();
    relay.static_changed("/srv/static/logo.svg").unwrap();

    for socket in [&mut first, &mut second] {
        assert_eq!(next_text(socket).await, r#"{"type":"invalid"}"#);
        assert_eq!(
            next_text(socket).await,
            r#"{"type":"static-changed","data":"/srv/static/logo.svg"}"#
        );
    }
    assert_eq!(relay.status().await.unwrap().current_hash, None);
}

#[tokio::test]
async fn test_ws_foreign_origin_is_rejected() {
    let (addr, relay) = start(RelayConfig::default()).await;
    let mut socket = connect(addr, "http://evil.example.com").await;

    assert_eq!(
        next_text(&mut socket).await,
        r#"{"type":"error","data":"Invalid Host/Origin header"}"#
    );
    let rest = timeout(WAIT, socket.next()).await.unwrap();
    assert!(matches!(rest, None | Some(Ok(Message::Close(_))) | Some(Err(_))));

    assert_eq!(relay.status().await.unwrap().connections, 0);
}

#[tokio::test]
async fn test_ws_disconnect_is_unregistered() {
    let (addr, relay) = start(RelayConfig::default()).await;
    let mut socket = connect_local(addr).await;
    next_text(&mut socket).await;
    wait_for_connections(&relay, 1).await;

    socket.close(None).await.unwrap();
    wait_for_connections(&relay, 0).await;
}

#[tokio::test]
async fn test_shutdown_closes_clients_and_rejects_commands() {
    let (addr, relay) = start(RelayConfig::default()).await;
    let mut socket = connect_local(addr).await;
    next_text(&mut socket).await;

    relay.shutdown().await.unwrap();
    let rest = timeout(WAIT, socket.next()).await.unwrap();
    assert!(matches!(rest, None | Some(Ok(Message::Close(_))) | Some(Err(_))));

    assert!(relay.build_done(BuildSummary::new("late")).is_err());
    // A second shutdown is a no-op.
    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_control_routes_are_gated() {
    let (addr, _relay) = start(RelayConfig::default()).await;
    let http = reqwest::Client::new();

    let status: serde_json::Value = http
        .get(format!("http://{}/__fob_relay__/status", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["transport"], "ws");
    assert_eq!(status["connections"], 0);

    let script = http
        .get(format!("http://{}/__fob_relay__/client.js", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(script.status(), 200);
    let body = script.text().await.unwrap();
    assert!(body.starts_with(r#"window.__FOB_RELAY__ = {"transport":"ws","path":"/ws"};"#));

    let forbidden = http
        .get(format!("http://{}/__fob_relay__/status", addr))
        .header("host", "evil.example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status(), 403);
    assert_eq!(forbidden.text().await.unwrap(), "Invalid Host/Origin header");
}

/// Minimal XHR-polling browser.
struct Poller {
    http: reqwest::Client,
    base: String,
    origin: String,
}

impl Poller {
    fn new(addr: SocketAddr, session: &str, origin: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: format!("http://{}/ws/{}", addr, session),
            origin: origin.to_string(),
        }
    }

    async fn poll(&self) -> String {
        let response = timeout(
            WAIT,
            self.http
                .post(format!("{}/xhr", self.base))
                .header("origin", &self.origin)
                .send(),
        )
        .await
        .expect("poll timed out")
        .unwrap();
        response.text().await.unwrap()
    }

    /// Poll until `count` envelopes have arrived.
    async fn messages(&self, count: usize) -> Vec<String> {
        let mut messages = Vec::new();
        while messages.len() < count {
            let frame = self.poll().await;
            let array = frame
                .trim_end()
                .strip_prefix('a')
                .unwrap_or_else(|| panic!("expected an array frame, got {:?}", frame));
            messages.extend(serde_json::from_str::<Vec<String>>(array).unwrap());
        }
        messages
    }
}

#[tokio::test]
async fn test_polling_session_receives_burst_and_builds() {
    let config = RelayConfig {
        transport: TransportKind::Polling,
        ..RelayConfig::default()
    };
    let (addr, relay) = start(config).await;
    let poller = Poller::new(addr, "s1", &format!("http://{}", addr));

    assert_eq!(poller.poll().await, "o\n");
    assert_eq!(poller.messages(1).await, [r#"{"type":"liveReload"}"#]);

    relay.build_done(BuildSummary::new("abc")).unwrap();
    assert_eq!(
        poller.messages(2).await,
        [r#"{"type":"hash","data":"abc"}"#, r#"{"type":"ok"}"#]
    );
    assert_eq!(relay.status().await.unwrap().transport, TransportKind::Polling);
}

#[tokio::test]
async fn test_polling_foreign_origin_gets_error_then_close() {
    let config = RelayConfig {
        transport: TransportKind::Polling,
        ..RelayConfig::default()
    };
    let (addr, relay) = start(config).await;
    let poller = Poller::new(addr, "s2", "http://evil.example.com");

    assert_eq!(poller.poll().await, "o\n");
    assert_eq!(
        poller.messages(1).await,
        [r#"{"type":"error","data":"Invalid Host/Origin header"}"#]
    );
    assert_eq!(poller.poll().await, "c[3000,\"Go away!\"]\n");
    assert_eq!(relay.status().await.unwrap().connections, 0);
}

#[tokio::test]
async fn test_relay_client_follows_builds_until_relay_closes() {
    let (addr, relay) = start(RelayConfig::default()).await;
    relay.build_done(BuildSummary::new("abc")).unwrap();

    let (tx, mut actions) = mpsc::unbounded_channel();
    let mut client = RelayClient::new(&format!("ws://{}/ws", addr), tx)
        .unwrap()
        .with_budget(ReconnectBudget::Limited(0));
    let driver = tokio::spawn(async move { client.run().await });

    wait_for_connections(&relay, 1).await;
    relay.build_done(BuildSummary::new("def")).unwrap();

    // The initial hash is a sync, not an update; only "def" reloads.
    let reload = timeout(WAIT, async {
        while let Some(action) = actions.recv().await {
            if action == ClientAction::Reload {
                return true;
            }
        }
        false
    })
    .await
    .unwrap();
    assert!(reload);

    relay.shutdown().await.unwrap();
    timeout(WAIT, driver).await.unwrap().unwrap().unwrap();

    let rest: Vec<ClientAction> = std::iter::from_fn(|| actions.try_recv().ok()).collect();
    assert_eq!(rest.last(), Some(&ClientAction::Disconnected));
}
