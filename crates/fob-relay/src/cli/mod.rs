//! Command-line interface definition for the Fob dev relay.
//!
//! Defined with clap v4's derive macros.
//!
//! # Command Structure
//!
//! - `fob-relay serve` - Static dev server with live reload
//! - `fob-relay config` - Print resolved configuration or its JSON schema
//! - `fob-relay watch` - Terminal client for a running relay

mod commands;
pub mod enums;
mod validation;

use clap::Parser;

pub use commands::{Command, ConfigArgs, ServeArgs, WatchArgs};
pub use enums::*;
pub use validation::parse_allowed_hosts;

/// Fob relay - live reload and build status for connected browsers
#[derive(Parser, Debug)]
#[command(
    name = "fob-relay",
    version,
    about = "Live reload and build status push for connected browsers",
    long_about = "fob-relay keeps browsers in sync with a development build.\n\
                  It validates Host/Origin headers, accepts clients over WebSocket or\n\
                  HTTP long-polling, and pushes build hashes, warnings and errors."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    ///
    /// Shows connection, heartbeat and frame details.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}
