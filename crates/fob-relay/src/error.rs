//! Error handling for the Fob dev relay.
//!
//! This module provides a hierarchical error type system using `thiserror` for
//! structured error handling with actionable messages.
//!
//! # Architecture
//!
//! - **Top-level errors** (`RelayError`) represent broad categories of failures
//! - **Domain-specific errors** (`ConfigError`, `TransportError`) provide detailed context
//! - **Error conversion** is automatic via `#[from]` attributes
//! - **Context helpers** allow attaching additional information to errors
//!
//! Host/Origin validation failures are deliberately absent from this module:
//! they are answered with a 403 or an `error` envelope and never surface as
//! an `Err`.
//!
//! # Example
//!
//! ```rust,no_run
//! use fob_relay::error::{Result, ResultExt};
//! use std::path::Path;
//!
//! fn read_config(path: &Path) -> Result<String> {
//!     std::fs::read_to_string(path)
//!         .with_path(path)
//!         .with_hint("Create a fob-relay.json file or pass --config <path>")
//! }
//! ```

pub mod miette;

use std::path::PathBuf;
use thiserror::Error;

pub use self::miette::relay_error_to_miette;

/// Top-level relay error type.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration-related errors (file not found, invalid values, etc.)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Transport setup or client connection errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Invalid command-line arguments or options
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// File or directory not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// I/O errors from file system or socket operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(String),

    /// File watching errors
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A frame received from the relay was not a well-formed envelope
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The relay event loop has stopped and no longer accepts commands
    #[error("Relay is closed")]
    RelayClosed,

    /// Generic errors with custom messages
    #[error("{0}")]
    Custom(String),
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file doesn't exist at the expected location
    #[error("Config file not found: {}\n\nHint: Create a fob-relay.json file or specify --config <path>", .0.display())]
    NotFound(PathBuf),

    /// Config sources could not be merged into a `RelayConfig`
    #[error("Failed to load configuration: {0}\n\nHint: Check fob-relay.json syntax, field names and FOB_RELAY_* variables")]
    Extract(String),

    /// Requested transport backend doesn't exist
    #[error("Unknown transport '{0}'\n\nHint: Supported transports are 'ws' and 'polling'")]
    UnknownTransport(String),

    /// Invalid value for a configuration option
    #[error("Invalid value for '{field}': {value}\n\nHint: {hint}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The invalid value
        value: String,
        /// Helpful hint for correct values
        hint: String,
    },

    /// I/O error while reading config
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
}

/// Transport backend and client connection errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The handshake route is not mountable
    #[error("Invalid handshake path '{0}'\n\nHint: Paths must start with '/' and must not end with '/'")]
    InvalidPath(String),

    /// The relay URL handed to the client is unusable
    #[error("Invalid relay URL '{url}': {reason}")]
    InvalidUrl {
        /// URL as given
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Socket-level failure on the client side
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Result type alias using `RelayError` as the default error type.
pub type Result<T, E = RelayError> = std::result::Result<T, E>;

/// Extension trait for adding context to `Result` types.
pub trait ResultExt<T> {
    /// Add a file path to the error context.
    ///
    /// Turns `NotFound` I/O errors into [`RelayError::FileNotFound`].
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;

    /// Add a helpful hint to the error context.
    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T>;

    /// Prefix the error with a custom message.
    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<RelayError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| {
            let err: RelayError = e.into();
            match err {
                RelayError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                    RelayError::FileNotFound(path.as_ref().to_path_buf())
                }
                other => other,
            }
        })
    }

    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: RelayError = e.into();
            RelayError::Custom(format!("{}\n\nHint: {}", err, hint))
        })
    }

    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: RelayError = e.into();
            RelayError::Custom(format!("{}: {}", msg, err))
        })
    }
}
