//! Miette diagnostic conversion for relay errors.
//!
//! Used at the binary edge so startup failures print as rich diagnostics.

use crate::error::{ConfigError, RelayError};
use miette::Report;

/// Convert RelayError to miette Report
pub fn relay_error_to_miette(err: RelayError) -> Report {
    match err {
        RelayError::Config(e) => config_error_to_miette(e),
        RelayError::Transport(e) => miette::miette!("Transport error: {}", e),
        _ => miette::miette!("{}", err),
    }
}

/// Convert ConfigError to miette Report
pub fn config_error_to_miette(err: ConfigError) -> Report {
    match err {
        ConfigError::InvalidValue { field, value, hint } => miette::miette!(
            help = hint,
            "Invalid value for '{}': {}",
            field,
            value
        ),
        ConfigError::UnknownTransport(kind) => miette::miette!(
            help = "Supported transports are 'ws' and 'polling'",
            "Unknown transport '{}'",
            kind
        ),
        _ => miette::miette!("Configuration error: {}", err),
    }
}
