//! Terminal UI utilities for status lines and formatted output.
//!
//! Everything here writes to stderr so stdout stays free for machine-readable
//! output such as `fob-relay config`.

mod format;

use owo_colors::OwoColorize;

pub use format::{format_duration, format_size, format_summary, print_summary};

/// Check if color output should be enabled.
///
/// Respects NO_COLOR and FORCE_COLOR environment variables, falls back to
/// terminal capability detection on stderr. Shared by status lines and the
/// tracing formatter.
pub fn should_use_color() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    console::Term::stderr().features().colors_supported()
}

/// Initialize color support based on environment.
///
/// `--no-color` is recorded as `NO_COLOR=1` so later [`should_use_color`]
/// checks agree with the flag.
pub fn init_colors(no_color: bool) {
    if no_color || !should_use_color() {
        std::env::set_var("NO_COLOR", "1");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Success,
    Info,
    Warning,
    Error,
}

impl Status {
    fn glyph(self) -> &'static str {
        match self {
            Status::Success => "✓",
            Status::Info => "ℹ",
            Status::Warning => "⚠",
            Status::Error => "✗",
        }
    }
}

/// Render one status line. Warnings and errors color the message too.
fn status_line(status: Status, message: &str) -> String {
    if !should_use_color() {
        return format!("{} {}", status.glyph(), message);
    }
    let glyph = status.glyph();
    match status {
        Status::Success => format!("{} {}", glyph.green().bold(), message),
        Status::Info => format!("{} {}", glyph.blue().bold(), message),
        Status::Warning => format!("{} {}", glyph.yellow().bold(), message.yellow()),
        Status::Error => format!("{} {}", glyph.red().bold(), message.red()),
    }
}

/// Relay lifecycle milestones: listening, stopped, reloads seen by `watch`.
///
/// ```no_run
/// use fob_relay::ui::success;
///
/// success("Serving ./public at http://127.0.0.1:8080");
/// ```
pub fn success(message: &str) {
    eprintln!("{}", status_line(Status::Success, message));
}

/// File changes and other routine events.
pub fn info(message: &str) {
    eprintln!("{}", status_line(Status::Info, message));
}

pub fn warning(message: &str) {
    eprintln!("{}", status_line(Status::Warning, message));
}

/// Snapshot and server failures that do not stop the relay.
pub fn error(message: &str) {
    eprintln!("{}", status_line(Status::Error, message));
}
