//! Pluggable real-time transports.
//!
//! Two backends sit behind [`TransportBackend`]:
//!
//! - [`WebSocketBackend`] upgrades the handshake route to a native WebSocket
//!   and supports ping/pong heartbeats.
//! - [`PollingBackend`] serves an XHR long-polling session protocol for
//!   networks that block upgrades. It has no heartbeat; idle sessions expire.
//!
//! Both hand the relay the same [`Connection`] handle and report lifecycle
//! changes as [`TransportEvent`]s on one channel.

pub mod connection;
pub mod polling;
pub mod websocket;

use crate::config::validation::validate_path;
use crate::error::{ConfigError, RelayError, Result, TransportError};
use axum::http::HeaderMap;
use axum::Router;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc;

pub use connection::{Connection, ConnectionId};
pub use polling::PollingBackend;
pub use websocket::WebSocketBackend;

/// Which backend carries relay traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Native WebSocket upgrade
    Ws,
    /// XHR long-polling fallback
    Polling,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Ws => f.write_str("ws"),
            TransportKind::Polling => f.write_str("polling"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ws" | "websocket" => Ok(TransportKind::Ws),
            "polling" => Ok(TransportKind::Polling),
            other => Err(ConfigError::UnknownTransport(other.to_string()).into()),
        }
    }
}

/// Lifecycle notifications from a backend to the relay.
#[derive(Debug)]
pub enum TransportEvent {
    /// A handshake completed. `headers` are the raw handshake request headers.
    Connected {
        connection: Connection,
        headers: HeaderMap,
    },
    /// The transport side of a connection is gone.
    Closed { id: ConnectionId },
}

pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Common surface of both backends.
pub trait TransportBackend: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Mount the handshake routes onto an application router.
    ///
    /// Must be called from within a Tokio runtime.
    fn attach(&self, router: Router) -> Router;

    /// Period of the registry heartbeat, for backends that answer pings.
    fn heartbeat_interval(&self) -> Option<Duration> {
        None
    }

    /// Stop accepting handshakes and close every connection this backend owns.
    ///
    /// Safe to call more than once and with no connections.
    fn close(&self);
}

/// Construct the backend named by `kind`, mounted under `path`.
pub fn create_backend(
    kind: TransportKind,
    path: &str,
    heartbeat: Duration,
    events: EventSender,
) -> Result<Box<dyn TransportBackend>> {
    validate_path(path).map_err(|_| TransportError::InvalidPath(path.to_string()))?;

    let backend: Box<dyn TransportBackend> = match kind {
        TransportKind::Ws => Box::new(WebSocketBackend::new(path, heartbeat, events)),
        TransportKind::Polling => Box::new(PollingBackend::new(path, events)),
    };
    tracing::debug!("Created {} transport on {}", kind, path);
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_kind_from_str() {
        assert_eq!("ws".parse::<TransportKind>().unwrap(), TransportKind::Ws);
        assert_eq!("WebSocket".parse::<TransportKind>().unwrap(), TransportKind::Ws);
        assert_eq!(
            "polling".parse::<TransportKind>().unwrap(),
            TransportKind::Polling
        );

        let err = "sockjs".parse::<TransportKind>().unwrap_err();
        assert!(matches!(
            err,
            RelayError::Config(ConfigError::UnknownTransport(ref name)) if name == "sockjs"
        ));
    }

    #[test]
    fn test_transport_kind_serde() {
        assert_eq!(serde_json::to_string(&TransportKind::Polling).unwrap(), "\"polling\"");
        assert!(serde_json::from_str::<TransportKind>("\"sockjs\"").is_err());
    }

    #[test]
    fn test_create_backend() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let ws = create_backend(TransportKind::Ws, "/ws", Duration::from_secs(1), tx.clone())
            .unwrap();
        assert_eq!(ws.kind(), TransportKind::Ws);
        assert_eq!(ws.heartbeat_interval(), Some(Duration::from_secs(1)));

        let polling =
            create_backend(TransportKind::Polling, "/relay", Duration::from_secs(1), tx.clone())
                .unwrap();
        assert_eq!(polling.heartbeat_interval(), None);

        let err = create_backend(TransportKind::Ws, "ws/", Duration::from_secs(1), tx).err();
        assert!(matches!(
            err,
            Some(RelayError::Transport(TransportError::InvalidPath(_)))
        ));
    }
}
