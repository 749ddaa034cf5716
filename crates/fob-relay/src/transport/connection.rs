use super::TransportKind;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Identifier of one logical connection, unique per backend instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic id source owned by one backend.
#[derive(Debug, Default)]
pub(crate) struct IdGenerator(AtomicU64);

impl IdGenerator {
    pub(crate) fn next(&self) -> ConnectionId {
        ConnectionId(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Work queued for the task that owns the socket or polling session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outbound {
    Text(String),
    Ping,
    Close,
}

/// Handle to one logical connection, identical for both backends.
///
/// Sending never blocks: frames are queued for the backend task that owns
/// the underlying socket or polling session, so they go out in send order.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    kind: TransportKind,
    tx: mpsc::UnboundedSender<Outbound>,
    alive: Arc<AtomicBool>,
}

impl Connection {
    pub(crate) fn new(
        id: ConnectionId,
        kind: TransportKind,
    ) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Self {
            id,
            kind,
            tx,
            alive: Arc::new(AtomicBool::new(true)),
        };
        (connection, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Queue a text frame. Returns `false` once the transport side is gone.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.tx.send(Outbound::Text(text.into())).is_ok()
    }

    /// Queue a liveness ping.
    pub fn ping(&self) -> bool {
        self.tx.send(Outbound::Ping).is_ok()
    }

    /// Close the connection after already queued frames are flushed.
    pub fn terminate(&self) {
        let _ = self.tx.send(Outbound::Close);
    }

    /// Whether the owning transport task is still running.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Record a pong.
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Release);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub(crate) fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Release);
    }
}
