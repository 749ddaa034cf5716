//! Fob relay - live reload and build status push for development servers.
//!
//! The relay sits next to a dev server and keeps connected browsers in sync
//! with the build. It validates Host/Origin headers, accepts clients over
//! WebSocket or HTTP long-polling, diffs build results and pushes only what
//! changed.
//!
//! # Architecture
//!
//! - [`host_check`] - Host/Origin validation and the HTTP 403 gate
//! - [`transport`] - Connection handles and the two transport backends
//! - [`registry`] - Live connections and the heartbeat sweep
//! - [`broadcast`] - Build summaries and the still-ok/hash/ok/errors diff
//! - [`relay`] - The relay event loop and its cloneable handle
//! - [`client`] - Reconnect state machine, envelope dispatch and a Tokio client
//! - [`protocol`] - The JSON message envelope
//! - `config`, `error`, `logger`, `ui` - Ambient configuration, errors and output
//! - `cli`, `commands`, `dev` - The `fob-relay` binary
//!
//! # Example
//!
//! ```rust,no_run
//! use axum::Router;
//! use fob_relay::{BuildSummary, RelayConfig, RelayServer};
//!
//! # async fn run() -> fob_relay::Result<()> {
//! let config = RelayConfig::default();
//! let (app, relay) = RelayServer::attach(&config, Router::new())?;
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! tokio::spawn(async move { axum::serve(listener, app).await });
//!
//! relay.build_done(BuildSummary::new("3f2a9c1b"))?;
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod dev;
pub mod error;
pub mod host_check;
pub mod logger;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod transport;
pub mod ui;

pub use broadcast::{BroadcastEngine, BuildSummary};
pub use config::RelayConfig;
pub use error::{ConfigError, RelayError, Result, ResultExt, TransportError};
pub use host_check::HostValidator;
pub use protocol::{Diagnostic, Envelope, ProgressUpdate};
pub use relay::{RelayHandle, RelayServer, RelayStatus};
pub use transport::TransportKind;
