use clap::ValueEnum;

use crate::transport::TransportKind;

/// Real-time transport selectable on the command line
#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub enum TransportArg {
    /// WebSocket with server-side heartbeat
    ///
    /// One upgraded socket per client. Dead peers are detected by ping/pong
    /// and dropped within two heartbeat periods.
    #[value(name = "ws")]
    Ws,

    /// HTTP long-polling fallback
    ///
    /// For proxies that refuse WebSocket upgrades. Frames are delivered on
    /// POST requests under the handshake path.
    #[value(name = "polling")]
    Polling,
}

impl From<TransportArg> for TransportKind {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Ws => TransportKind::Ws,
            TransportArg::Polling => TransportKind::Polling,
        }
    }
}

/// Output format for `fob-relay config`
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, ValueEnum)]
pub enum ConfigFormat {
    /// Pretty-printed JSON (fob-relay.json)
    #[default]
    #[value(name = "json")]
    Json,

    /// TOML (fob-relay.toml)
    #[value(name = "toml")]
    Toml,
}
