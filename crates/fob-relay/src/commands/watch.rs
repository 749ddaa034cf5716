//! `fob-relay watch` - follow a running relay from the terminal.

use crate::cli::WatchArgs;
use crate::client::{ClientAction, LogLevel, OverlayKind, RelayClient};
use crate::config::ReconnectBudget;
use crate::error::{RelayError, Result};
use crate::ui;
use tokio::signal;
use tokio::sync::mpsc;

/// Execute the watch command.
///
/// Runs until the reconnect budget is spent or Ctrl+C is pressed.
pub async fn execute(args: WatchArgs) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut client = RelayClient::new(&args.url, tx)?;
    if let Some(origin) = args.origin {
        client = client.with_origin(parse_origin(&origin)?);
    }
    if let Some(max_retries) = args.max_retries {
        client = client.with_budget(ReconnectBudget::Limited(max_retries));
    }

    let printer = tokio::spawn(async move {
        while let Some(action) = rx.recv().await {
            report(&action);
        }
    });

    ui::info(&format!("Watching relay at {}", args.url));
    let result = tokio::select! {
        result = client.run() => result,
        _ = signal::ctrl_c() => Ok(()),
    };

    // Closing the channel lets the printer drain and exit.
    drop(client);
    let _ = printer.await;
    result
}

/// Normalize `--origin` to the `scheme://host[:port]` form browsers send.
fn parse_origin(origin: &str) -> Result<String> {
    let url = url::Url::parse(origin)
        .map_err(|e| RelayError::InvalidArgument(format!("--origin '{}': {}", origin, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url.origin().ascii_serialization()),
        scheme => Err(RelayError::InvalidArgument(format!(
            "--origin '{}' has scheme '{}', expected http or https",
            origin, scheme
        ))),
    }
}

fn report(action: &ClientAction) {
    match action {
        ClientAction::Log { level, message } => match level {
            LogLevel::Info => ui::info(message),
            LogLevel::Warn => ui::warning(message),
            LogLevel::Error => ui::error(message),
        },
        ClientAction::ShowOverlay { kind, diagnostics } => {
            for diagnostic in diagnostics {
                let line = diagnostic.to_string();
                match kind {
                    OverlayKind::Errors => ui::error(&line),
                    OverlayKind::Warnings => ui::warning(&line),
                }
            }
        }
        ClientAction::HotUpdate(hash) => ui::success(&format!("Hot update to {}", hash)),
        ClientAction::Reload => ui::success("Reload"),
        ClientAction::Disconnected => ui::warning("Disconnected from relay"),
        ClientAction::DismissOverlay | ClientAction::SetReconnect(_) => {
            tracing::debug!("{:?}", action);
        }
    }
}
