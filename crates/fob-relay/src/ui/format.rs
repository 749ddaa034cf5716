//! Formatting utilities for sizes, durations, and snapshot summaries.

use owo_colors::OwoColorize;
use std::time::Duration;

use crate::broadcast::BuildSummary;

/// Format file size in human-readable format.
///
/// ```
/// use fob_relay::ui::format_size;
///
/// assert_eq!(format_size(0), "0 B");
/// assert_eq!(format_size(500), "500 B");
/// assert_eq!(format_size(1024), "1.00 KB");
/// assert_eq!(format_size(10 * 1024 * 1024), "10.00 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Format duration in human-readable format.
///
/// ```
/// use std::time::Duration;
/// use fob_relay::ui::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();

    if total_ms < 1000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// One-line description of a snapshot, e.g. `3f2a9c1b (1 warning, 0 errors)`.
pub fn format_summary(summary: &BuildSummary) -> String {
    let short_hash: String = summary.hash.chars().take(8).collect();
    let warnings = plural(summary.warnings.len(), "warning");
    let errors = plural(summary.errors.len(), "error");
    format!("{} ({}, {})", short_hash, warnings, errors)
}

/// Print a snapshot summary with its diagnostics to stderr.
pub fn print_summary(summary: &BuildSummary, elapsed: Duration) {
    let line = format!(
        "Snapshot {} in {}",
        format_summary(summary),
        format_duration(elapsed)
    );
    if summary.errors.is_empty() {
        eprintln!("{} {}", "✓".green().bold(), line);
    } else {
        eprintln!("{} {}", "✗".red().bold(), line.red());
    }

    for warning in &summary.warnings {
        eprintln!("  {} {}", "warning:".yellow(), warning);
    }
    for error in &summary.errors {
        eprintln!("  {} {}", "error:".red(), error);
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", count, noun)
    }
}
