//! Native WebSocket backend.

use super::connection::{IdGenerator, Outbound};
use super::{Connection, EventSender, TransportBackend, TransportEvent, TransportKind};
use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Upgrades `GET {path}` to a WebSocket; heartbeats via ping/pong.
pub struct WebSocketBackend {
    inner: Arc<WsInner>,
}

struct WsInner {
    path: String,
    heartbeat: Duration,
    accepting: AtomicBool,
    ids: IdGenerator,
    events: EventSender,
    shutdown: watch::Sender<bool>,
}

impl WebSocketBackend {
    pub fn new(path: &str, heartbeat: Duration, events: EventSender) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(WsInner {
                path: path.to_string(),
                heartbeat,
                accepting: AtomicBool::new(true),
                ids: IdGenerator::default(),
                events,
                shutdown,
            }),
        }
    }
}

impl TransportBackend for WebSocketBackend {
    fn kind(&self) -> TransportKind {
        TransportKind::Ws
    }

    fn attach(&self, router: Router) -> Router {
        let routes = Router::new()
            .route(&self.inner.path, get(upgrade))
            .with_state(Arc::clone(&self.inner));
        router.merge(routes)
    }

    fn heartbeat_interval(&self) -> Option<Duration> {
        Some(self.inner.heartbeat)
    }

    fn close(&self) {
        if self.inner.accepting.swap(false, Ordering::AcqRel) {
            debug!("Closing WebSocket transport on {}", self.inner.path);
        }
        self.inner.shutdown.send_replace(true);
    }
}

async fn upgrade(
    State(inner): State<Arc<WsInner>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if !inner.accepting.load(Ordering::Acquire) {
        return (StatusCode::SERVICE_UNAVAILABLE, "Relay is shutting down").into_response();
    }
    ws.on_upgrade(move |socket| run_socket(inner, socket, headers))
}

/// Own one socket until either side closes it.
async fn run_socket(inner: Arc<WsInner>, socket: WebSocket, headers: HeaderMap) {
    let id = inner.ids.next();
    let (connection, mut outbound) = Connection::new(id, TransportKind::Ws);
    let mut shutdown = inner.shutdown.subscribe();
    if *shutdown.borrow() {
        return;
    }

    if inner
        .events
        .send(TransportEvent::Connected {
            connection: connection.clone(),
            headers,
        })
        .is_err()
    {
        return;
    }

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            queued = outbound.recv() => {
                let message = match queued {
                    Some(Outbound::Text(text)) => Message::Text(text.into()),
                    Some(Outbound::Ping) => Message::Ping(Bytes::new()),
                    Some(Outbound::Close) | None => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                };
                if let Err(e) = sink.send(message).await {
                    warn!("WebSocket {} send failed: {}", id, e);
                    break;
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Pong(_))) => connection.mark_alive(),
                Some(Ok(Message::Text(text))) => {
                    debug!("Ignoring client frame on {}: {}", id, text.as_str());
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket {} error: {}", id, e);
                    break;
                }
            },
            _ = shutdown.changed() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }

    // Dropping the receiver marks the connection closed before the event lands.
    drop(outbound);
    let _ = inner.events.send(TransportEvent::Closed { id });
}
