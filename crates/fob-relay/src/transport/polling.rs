//! XHR long-polling backend.
//!
//! Session protocol under the handshake path, one response frame per poll:
//!
//! | Request | Response |
//! |---|---|
//! | first `POST {path}/{session}/xhr` | `o` (session open) |
//! | later `POST {path}/{session}/xhr` | `a["<envelope>",...]`, `h` after 25s idle, `c[code,"reason"]` on close |
//! | `POST {path}/{session}/xhr_send` | `204`, body ignored |
//!
//! A session that has not polled for [`SESSION_TIMEOUT`] is expired and
//! reported closed. There is no ping/pong layer.

use super::connection::{IdGenerator, Outbound};
use super::{Connection, EventSender, TransportBackend, TransportEvent, TransportKind};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

/// How long a poll waits for frames before answering `h`.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(25);

/// Idle time after which a session is expired.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(5);

const SWEEP_INTERVAL: Duration = Duration::from_secs(1);
const CONTENT_TYPE: &str = "application/javascript; charset=UTF-8";

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Outbound>>>;

/// Long-polling fallback for networks that block WebSocket upgrades.
pub struct PollingBackend {
    inner: Arc<PollingInner>,
}

struct PollingInner {
    prefix: String,
    accepting: AtomicBool,
    ids: IdGenerator,
    events: EventSender,
    sessions: Mutex<HashMap<String, Session>>,
}

struct Session {
    connection: Connection,
    outbound: SharedReceiver,
    last_seen: Instant,
    /// Frames were flushed together with a queued close; send `c` next.
    closing: bool,
}

/// What the next poll answers for an existing session.
enum PollState {
    Open(SharedReceiver),
    Closing,
}

impl PollingBackend {
    pub fn new(path: &str, events: EventSender) -> Self {
        Self {
            inner: Arc::new(PollingInner {
                prefix: path.to_string(),
                accepting: AtomicBool::new(true),
                ids: IdGenerator::default(),
                events,
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.inner.sessions.lock().len()
    }
}

impl TransportBackend for PollingBackend {
    fn kind(&self) -> TransportKind {
        TransportKind::Polling
    }

    fn attach(&self, router: Router) -> Router {
        tokio::spawn(sweep(Arc::downgrade(&self.inner)));

        let prefix = &self.inner.prefix;
        let routes = Router::new()
            .route(&format!("{}/{{session}}/xhr", prefix), post(poll))
            .route(&format!("{}/{{session}}/xhr_send", prefix), post(xhr_send))
            .with_state(Arc::clone(&self.inner));
        router.merge(routes)
    }

    fn close(&self) {
        self.inner.accepting.store(false, Ordering::Release);

        let drained: Vec<Session> = self.inner.sessions.lock().drain().map(|(_, s)| s).collect();
        if !drained.is_empty() {
            debug!("Closing {} polling session(s)", drained.len());
        }
        for session in drained {
            // Wakes a poll in flight, which answers with a close frame.
            session.connection.terminate();
            let _ = self.inner.events.send(TransportEvent::Closed {
                id: session.connection.id(),
            });
        }
    }
}

impl PollingInner {
    fn open_session(&self, session_id: &str, headers: HeaderMap) -> Option<Response> {
        let connection = {
            let mut sessions = self.sessions.lock();
            if sessions.contains_key(session_id) {
                return None;
            }
            let (connection, outbound) = Connection::new(self.ids.next(), TransportKind::Polling);
            sessions.insert(
                session_id.to_string(),
                Session {
                    connection: connection.clone(),
                    outbound: Arc::new(tokio::sync::Mutex::new(outbound)),
                    last_seen: Instant::now(),
                    closing: false,
                },
            );
            connection
        };

        debug!("Polling session {} opened as {}", session_id, connection.id());
        let _ = self.events.send(TransportEvent::Connected {
            connection,
            headers,
        });
        Some(frame("o"))
    }

    fn poll_state(&self, session_id: &str) -> Option<PollState> {
        let mut sessions = self.sessions.lock();
        let session = sessions.get_mut(session_id)?;
        session.last_seen = Instant::now();
        Some(if session.closing {
            PollState::Closing
        } else {
            PollState::Open(Arc::clone(&session.outbound))
        })
    }

    fn touch(&self, session_id: &str, closing: bool) {
        if let Some(session) = self.sessions.lock().get_mut(session_id) {
            session.last_seen = Instant::now();
            session.closing |= closing;
        }
    }

    fn remove_session(&self, session_id: &str) {
        let removed = self.sessions.lock().remove(session_id);
        if let Some(session) = removed {
            debug!("Polling session {} closed", session_id);
            let _ = self.events.send(TransportEvent::Closed {
                id: session.connection.id(),
            });
        }
    }

    /// Drop sessions idle for longer than `timeout` with no poll in flight.
    fn expire_idle(&self, timeout: Duration) -> usize {
        let expired: Vec<Session> = {
            let mut sessions = self.sessions.lock();
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, s)| {
                    s.last_seen.elapsed() > timeout && Arc::strong_count(&s.outbound) == 1
                })
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        for session in &expired {
            info!("Polling session {} expired", session.connection.id());
            let _ = self.events.send(TransportEvent::Closed {
                id: session.connection.id(),
            });
        }
        expired.len()
    }
}

async fn sweep(inner: Weak<PollingInner>) {
    let mut tick = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        tick.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if !inner.accepting.load(Ordering::Acquire) {
            break;
        }
        inner.expire_idle(SESSION_TIMEOUT);
    }
}

async fn poll(
    State(inner): State<Arc<PollingInner>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !is_valid_session_id(&session_id) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let receiver = match inner.poll_state(&session_id) {
        Some(PollState::Open(receiver)) => receiver,
        Some(PollState::Closing) => {
            inner.remove_session(&session_id);
            return close_frame(3000, "Go away!");
        }
        None => {
            if !inner.accepting.load(Ordering::Acquire) {
                return StatusCode::SERVICE_UNAVAILABLE.into_response();
            }
            return match inner.open_session(&session_id, headers) {
                Some(response) => response,
                // Lost a race with a concurrent first poll.
                None => close_frame(2010, "Another connection still open"),
            };
        }
    };

    let Ok(mut outbound) = receiver.try_lock_owned() else {
        return close_frame(2010, "Another connection still open");
    };

    let first = match tokio::time::timeout(POLL_TIMEOUT, outbound.recv()).await {
        Err(_) => {
            inner.touch(&session_id, false);
            drop(outbound);
            return frame("h");
        }
        Ok(first) => first,
    };

    let mut texts = Vec::new();
    let mut closing = false;
    let mut next = first;
    loop {
        match next {
            Some(Outbound::Text(text)) => texts.push(text),
            Some(Outbound::Ping) => {}
            Some(Outbound::Close) | None => {
                closing = true;
                break;
            }
        }
        next = match outbound.try_recv() {
            Ok(queued) => Some(queued),
            Err(mpsc::error::TryRecvError::Empty) => break,
            Err(mpsc::error::TryRecvError::Disconnected) => None,
        };
    }
    if texts.is_empty() {
        drop(outbound);
        inner.remove_session(&session_id);
        return close_frame(3000, "Go away!");
    }

    // The sweeper skips a session only while this guard is alive.
    inner.touch(&session_id, closing);
    drop(outbound);
    match serde_json::to_string(&texts) {
        Ok(array) => frame(&format!("a{}", array)),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn xhr_send(
    State(inner): State<Arc<PollingInner>>,
    Path(session_id): Path<String>,
    body: String,
) -> Response {
    if !inner.sessions.lock().contains_key(&session_id) {
        return StatusCode::NOT_FOUND.into_response();
    }
    inner.touch(&session_id, false);
    debug!("Ignoring client frame on session {}: {}", session_id, body);
    StatusCode::NO_CONTENT.into_response()
}

fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn frame(body: &str) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, CONTENT_TYPE)],
        Body::from(format!("{}\n", body)),
    )
        .into_response()
}

fn close_frame(code: u16, reason: &str) -> Response {
    frame(&format!("c[{},{}]", code, serde_json::Value::from(reason)))
}
