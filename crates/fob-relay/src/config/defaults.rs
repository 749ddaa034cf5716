use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::transport::TransportKind;

/// Client retry budget when the server does not announce one.
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 10;

/// Backend A heartbeat period.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 1000;

pub fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

pub fn default_port() -> u16 {
    8080
}

pub fn default_root() -> PathBuf {
    PathBuf::from("public")
}

pub fn default_live_reload() -> bool {
    true
}

pub fn default_transport() -> TransportKind {
    TransportKind::Ws
}

pub fn default_path() -> String {
    "/ws".to_string()
}

pub fn default_heartbeat_interval_ms() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_MS
}

pub fn default_watch_ignore() -> Vec<String> {
    vec![
        "node_modules".to_string(),
        ".git".to_string(),
        "dist".to_string(),
        "build".to_string(),
        "*.log".to_string(),
        ".DS_Store".to_string(),
    ]
}

pub fn default_debounce_ms() -> u64 {
    100
}

pub fn default_true() -> bool {
    true
}
