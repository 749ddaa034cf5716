//! Static dev server command implementation.
//!
//! Orchestrates the serve lifecycle:
//! - Layered config loading and root validation
//! - Relay attach plus static site router on one listener
//! - Initial snapshot pushed as the first build
//! - File watching with debounced re-snapshots
//! - Graceful shutdown on Ctrl+C

use crate::cli::ServeArgs;
use crate::commands::utils::{is_under_any, resolve_path, snapshot_site};
use crate::config::RelayConfig;
use crate::dev::{site, FileChange, FileWatcher};
use crate::error::{RelayError, Result, ResultExt};
use crate::protocol::ProgressUpdate;
use crate::relay::{RelayHandle, RelayServer};
use crate::ui;
use axum::Router;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::{mpsc, oneshot};

/// Execute the serve command.
///
/// # Errors
///
/// Returns errors for invalid configuration, a missing root directory, a
/// port that cannot be bound and watcher setup failures.
pub async fn execute(args: ServeArgs) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    let mut config = RelayConfig::load(&cwd, args.config.as_deref(), &args.overrides())?;
    config.root = resolve_path(&config.root, &cwd);
    config.validate_root()?;
    // Watcher events carry canonical paths.
    config.root = std::fs::canonicalize(&config.root).with_path(&config.root)?;

    let static_paths = config
        .watch
        .static_paths
        .iter()
        .map(|p| {
            let path = resolve_path(p, &cwd);
            std::fs::canonicalize(&path)
                .with_path(&path)
                .with_hint("Every watch.staticPaths entry must exist")
        })
        .collect::<Result<Vec<PathBuf>>>()?;

    let (app, relay) = RelayServer::attach(&config, Router::new())?;
    let app = app.merge(site::router(&config.root, relay.validator()));

    let addr = SocketAddr::new(config.host, config.port);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| RelayError::Server(format!("Failed to bind to {}: {}", addr, e)))?;

    let started = Instant::now();
    let summary = snapshot_site(config.root.clone(), config.watch.ignore.clone()).await?;
    ui::print_summary(&summary, started.elapsed());
    relay.build_done(summary)?;

    let mut roots = vec![config.root.clone()];
    roots.extend(
        static_paths
            .iter()
            .filter(|p| !p.starts_with(&config.root))
            .cloned(),
    );
    let (_watcher, mut changes) = FileWatcher::new(
        roots,
        config.watch.ignore.clone(),
        config.watch.debounce_ms,
    )?;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    ui::success(&format!(
        "Serving {} at {}",
        config.root.display(),
        config.server_url()
    ));
    ui::info("Press Ctrl+C to stop");

    let debounce = Duration::from_millis(config.watch.debounce_ms);
    let mut server_done = false;
    loop {
        tokio::select! {
            Some(change) = changes.recv() => {
                let batch = collect_batch(change, &mut changes, debounce).await;
                if let Err(e) = on_changes(batch, &config, &static_paths, &relay).await {
                    ui::error(&format!("Snapshot failed: {}", e));
                }
            }

            _ = signal::ctrl_c() => {
                ui::info("Shutting down...");
                break;
            }

            result = &mut server => {
                server_done = true;
                match result {
                    Ok(Ok(())) => ui::warning("Server stopped unexpectedly"),
                    Ok(Err(e)) => ui::error(&format!("Server error: {}", e)),
                    Err(e) => ui::error(&format!("Server task failed: {}", e)),
                }
                break;
            }
        }
    }

    relay.shutdown().await?;
    let _ = stop_tx.send(());
    if !server_done {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(RelayError::Server(e.to_string())),
            Err(e) => return Err(RelayError::Server(e.to_string())),
        }
    }

    ui::success("Relay stopped");
    Ok(())
}

/// Gather changes that arrive within one debounce window of `first`.
async fn collect_batch(
    first: FileChange,
    changes: &mut mpsc::Receiver<FileChange>,
    debounce: Duration,
) -> Vec<FileChange> {
    let mut batch = vec![first];
    let deadline = tokio::time::Instant::now() + debounce;
    while let Ok(Some(change)) = tokio::time::timeout_at(deadline, changes.recv()).await {
        batch.push(change);
    }
    batch
}

/// Turn a batch of file changes into relay broadcasts.
///
/// Changes under a static path reload clients directly; any other change
/// triggers a fresh snapshot announced as a new build.
async fn on_changes(
    batch: Vec<FileChange>,
    config: &RelayConfig,
    static_paths: &[PathBuf],
    relay: &RelayHandle,
) -> Result<()> {
    let (static_changes, site_changes): (Vec<_>, Vec<_>) = batch
        .into_iter()
        .partition(|change| is_under_any(change.path(), static_paths));

    for change in &static_changes {
        ui::info(&format!("Static file changed: {}", change.path().display()));
        relay.static_changed(change.path().display().to_string())?;
    }

    let Some(first) = site_changes.first() else {
        return Ok(());
    };
    if site_changes.len() == 1 {
        ui::info(&format!("File changed: {}", first.path().display()));
    } else {
        ui::info(&format!("{} files changed", site_changes.len()));
    }

    relay.invalid()?;
    relay.progress(ProgressUpdate::new(0, "snapshotting"))?;

    let started = Instant::now();
    let summary = snapshot_site(config.root.clone(), config.watch.ignore.clone()).await?;

    relay.progress(ProgressUpdate::new(100, "done"))?;
    ui::print_summary(&summary, started.elapsed());
    relay.build_done(summary)
}
