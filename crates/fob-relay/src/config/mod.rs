//! Configuration system for the Fob dev relay with multi-source loading.
//!
//! Merges settings from CLI args, environment variables, and config files.
//! Priority: CLI > Environment > File > Defaults

mod defaults;
mod loading;
mod tests;
mod types;
pub(crate) mod validation;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

pub use defaults::*;
pub use loading::{ConfigOverrides, CONFIG_FILE_NAMES, ENV_PREFIX};
pub use types::*;

use crate::transport::TransportKind;

/// Relay configuration - loaded from fob-relay.json / fob-relay.toml, env and CLI args.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RelayConfig {
    /// Address the dev server binds to
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port the dev server binds to
    #[serde(default = "default_port")]
    pub port: u16,

    /// Static directory that is served, snapshotted and watched
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Hosts trusted by the Host/Origin gate
    #[serde(default)]
    pub allowed_hosts: AllowedHosts,

    /// Announce hot module replacement to clients
    #[serde(default)]
    pub hot: bool,

    /// Announce live reload to clients
    #[serde(default = "default_live_reload")]
    pub live_reload: bool,

    /// Real-time transport backend
    #[serde(default = "default_transport")]
    pub transport: TransportKind,

    /// Route the transport handshake is mounted on
    #[serde(default = "default_path")]
    pub path: String,

    /// Heartbeat period for the WebSocket backend
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Settings pushed to browser clients on connect
    #[serde(default)]
    pub client: ClientConfig,

    /// File watching for the `serve` command
    #[serde(default)]
    pub watch: WatchConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            root: default_root(),
            allowed_hosts: AllowedHosts::default(),
            hot: false,
            live_reload: default_live_reload(),
            transport: default_transport(),
            path: default_path(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            client: ClientConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Heartbeat period as a `Duration`.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Public URL of the dev server.
    pub fn server_url(&self) -> String {
        match self.host {
            IpAddr::V6(ip) => format!("http://[{}]:{}", ip, self.port),
            IpAddr::V4(ip) => format!("http://{}:{}", ip, self.port),
        }
    }

    /// Generate JSON Schema for fob-relay.json.
    pub fn json_schema() -> serde_json::Value {
        let schema = schemars::schema_for!(RelayConfig);
        serde_json::to_value(schema).unwrap_or(serde_json::Value::Null)
    }
}
