//! Client side of the relay.
//!
//! - [`reconnect`]: sans-IO reconnection state machine with bounded backoff
//! - [`dispatch`]: envelope handling and per-page build status
//! - [`socket`]: tokio/tungstenite driver tying both to a real connection
//!
//! The browser client served at `/__fob_relay__/client.js` implements the
//! same machine in JavaScript and is embedded from `assets/client`.

pub mod dispatch;
pub mod reconnect;
pub mod socket;

use rust_embed::RustEmbed;

pub use dispatch::{ClientAction, ClientOptions, ClientStatus, Dispatcher, LogLevel, OverlayKind};
pub use reconnect::{FixedJitter, Jitter, Phase, RandomJitter, ReconnectAction, ReconnectMachine};
pub use socket::{ClientApp, RelayClient};

/// Browser client assets.
#[derive(RustEmbed)]
#[folder = "assets/client"]
pub struct ClientAssets;
