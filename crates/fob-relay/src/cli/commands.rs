use clap::{Args, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::cli::enums::*;
use crate::cli::validation::parse_allowed_hosts;
use crate::config::{AllowedHosts, ConfigOverrides};

/// Available fob-relay subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve a static directory with live reload
    ///
    /// Serves ROOT over HTTP, injects the relay client into HTML pages and
    /// pushes a new snapshot to every connected browser whenever a file
    /// under ROOT changes.
    Serve(ServeArgs),

    /// Print the resolved configuration
    ///
    /// Merges defaults, the config file, FOB_RELAY_* environment variables
    /// and command-line flags, and prints the result.
    Config(ConfigArgs),

    /// Connect to a running relay and print what it sends
    ///
    /// Uses the same reconnect and backoff rules as the browser client.
    Watch(WatchArgs),
}

/// Arguments for the serve command
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Directory to serve and watch
    ///
    /// Overrides `root` from the config file. Defaults to ./public.
    #[arg(value_name = "ROOT")]
    pub root: Option<PathBuf>,

    /// Address to bind the server to
    #[arg(long, value_name = "ADDR")]
    pub host: Option<IpAddr>,

    /// Port to bind the server to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to a config file (fob-relay.json or fob-relay.toml)
    ///
    /// Without this flag the first of fob-relay.json, fob-relay.toml in the
    /// working directory is used if present.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Real-time transport offered to browsers
    #[arg(short, long, value_enum)]
    pub transport: Option<TransportArg>,

    /// Hosts allowed to connect
    ///
    /// - all: disable Host/Origin checking
    /// - auto: local hosts and IP addresses only
    /// - a comma-separated list, where `.example.com` also allows subdomains
    ///
    /// Examples:
    ///   --allowed-hosts all
    ///   --allowed-hosts dev.example.com,.tunnel.test
    #[arg(long, value_name = "HOSTS", value_parser = parse_allowed_hosts)]
    pub allowed_hosts: Option<AllowedHosts>,

    /// Announce hot module replacement to clients
    #[arg(long)]
    pub hot: bool,

    /// Do not announce live reload
    ///
    /// Clients then apply neither full reloads nor static-file reloads on a
    /// successful snapshot.
    #[arg(long)]
    pub no_live_reload: bool,
}

impl ServeArgs {
    /// Flags that override config file and environment values.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host,
            port: self.port,
            root: self.root.clone(),
            allowed_hosts: self.allowed_hosts.clone(),
            hot: self.hot.then_some(true),
            live_reload: self.no_live_reload.then_some(false),
            transport: self.transport.map(Into::into),
        }
    }
}

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Path to a config file (fob-relay.json or fob-relay.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the JSON schema of the config file instead
    #[arg(long)]
    pub schema: bool,

    /// Output format for the resolved configuration
    #[arg(short, long, value_enum, default_value = "json", conflicts_with = "schema")]
    pub format: ConfigFormat,
}

/// Arguments for the watch command
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Relay URL, e.g. ws://localhost:8080/ws
    #[arg(value_name = "URL")]
    pub url: String,

    /// Origin header to send (defaults to the URL's http(s) origin)
    #[arg(long, value_name = "ORIGIN")]
    pub origin: Option<String>,

    /// Maximum reconnect attempts before giving up
    ///
    /// A value announced by the relay on connect takes precedence.
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,
}
