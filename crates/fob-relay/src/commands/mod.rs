//! Command implementations for the fob-relay CLI.
//!
//! - [`serve`] - Static dev server with live reload
//! - [`config`] - Resolved configuration and JSON schema
//! - [`watch`] - Terminal client for a running relay
//!
//! Each command provides an `execute` function that takes the parsed
//! arguments and returns a Result.

pub mod config;
pub mod serve;
pub(crate) mod utils;
pub mod watch;

pub use config::execute as config_execute;
pub use serve::execute as serve_execute;
pub use watch::execute as watch_execute;
