//! Envelope dispatch for a connected client.

use crate::config::{OverlaySetting, ReconnectBudget};
use crate::protocol::{Diagnostic, Envelope};
use std::fmt;

/// Per-page build tracking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientStatus {
    pub is_unloading: bool,
    pub current_hash: String,
    pub previous_hash: Option<String>,
}

impl ClientStatus {
    /// The latest `ok` only confirms the hash this page was already on.
    fn is_initial_sync(&self) -> bool {
        match &self.previous_hash {
            None => true,
            Some(previous) => self.current_hash.contains(previous.as_str()),
        }
    }
}

/// Options the server announces in the initial burst.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientOptions {
    pub hot: bool,
    pub live_reload: bool,
    pub progress: bool,
    pub overlay: Option<OverlaySetting>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    Warnings,
    Errors,
}

impl fmt::Display for OverlayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlayKind::Warnings => f.write_str("warnings"),
            OverlayKind::Errors => f.write_str("errors"),
        }
    }
}

/// What the application should do in response to an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    Log { level: LogLevel, message: String },
    ShowOverlay {
        kind: OverlayKind,
        diagnostics: Vec<Diagnostic>,
    },
    DismissOverlay,
    /// Apply a hot update to the given hash.
    HotUpdate(String),
    /// Full page reload.
    Reload,
    /// Reconnect budget announced by the server.
    SetReconnect(ReconnectBudget),
    /// The relay connection was lost.
    Disconnected,
}

impl ClientAction {
    fn info(message: impl Into<String>) -> Self {
        ClientAction::Log {
            level: LogLevel::Info,
            message: message.into(),
        }
    }

    fn log(level: LogLevel, message: impl Into<String>) -> Self {
        ClientAction::Log {
            level,
            message: message.into(),
        }
    }
}

/// Turns envelopes into [`ClientAction`]s and tracks [`ClientStatus`].
#[derive(Debug, Default)]
pub struct Dispatcher {
    options: ClientOptions,
    status: ClientStatus,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn status(&self) -> &ClientStatus {
        &self.status
    }

    /// The page is navigating away; suppress reloads.
    pub fn on_unload(&mut self) {
        self.status.is_unloading = true;
    }

    pub fn on_close(&mut self) -> Vec<ClientAction> {
        let mut actions = vec![ClientAction::log(LogLevel::Info, "Disconnected!")];
        if self.overlay_enabled() {
            actions.push(ClientAction::DismissOverlay);
        }
        actions.push(ClientAction::Disconnected);
        actions
    }

    pub fn handle(&mut self, envelope: Envelope) -> Vec<ClientAction> {
        match envelope {
            Envelope::Hot => {
                self.options.hot = true;
                Vec::new()
            }
            Envelope::LiveReload => {
                self.options.live_reload = true;
                Vec::new()
            }
            Envelope::Progress(progress) => {
                self.options.progress = progress.is_enabled();
                Vec::new()
            }
            Envelope::Reconnect(budget) => vec![ClientAction::SetReconnect(budget)],
            Envelope::Overlay(overlay) => {
                self.options.overlay = Some(overlay);
                Vec::new()
            }
            Envelope::Invalid => {
                let mut actions = vec![ClientAction::info("App updated. Recompiling...")];
                if self.overlay_enabled() {
                    actions.push(ClientAction::DismissOverlay);
                }
                actions
            }
            Envelope::Hash(hash) => {
                self.status.previous_hash = Some(std::mem::replace(
                    &mut self.status.current_hash,
                    hash,
                ))
                .filter(|previous| !previous.is_empty());
                Vec::new()
            }
            Envelope::ProgressUpdate(update) => {
                if self.options.progress {
                    vec![ClientAction::info(format!("{}% - {}", update.percent, update.msg))]
                } else {
                    Vec::new()
                }
            }
            Envelope::StillOk => vec![ClientAction::info("Nothing changed.")],
            Envelope::Ok => {
                let mut actions = Vec::new();
                if self.overlay_enabled() {
                    actions.push(ClientAction::DismissOverlay);
                }
                actions.extend(self.reload_app());
                actions
            }
            Envelope::StaticChanged(path) => vec![
                ClientAction::info(format!("{} from static directory was changed. Reloading...", path)),
                ClientAction::Reload,
            ],
            Envelope::Warnings {
                warnings,
                prevent_reloading,
            } => {
                let mut actions = vec![ClientAction::log(
                    LogLevel::Warn,
                    "Warnings while compiling.",
                )];
                actions.extend(
                    warnings
                        .iter()
                        .map(|w| ClientAction::log(LogLevel::Warn, w.to_string())),
                );
                if self.overlay_shows(OverlayKind::Warnings) {
                    actions.push(ClientAction::ShowOverlay {
                        kind: OverlayKind::Warnings,
                        diagnostics: warnings,
                    });
                }
                if !prevent_reloading {
                    actions.extend(self.reload_app());
                }
                actions
            }
            Envelope::Errors(errors) => {
                let mut actions = vec![ClientAction::log(
                    LogLevel::Error,
                    "Errors while compiling. Reload prevented.",
                )];
                actions.extend(
                    errors
                        .iter()
                        .map(|e| ClientAction::log(LogLevel::Error, e.to_string())),
                );
                if self.overlay_shows(OverlayKind::Errors) {
                    actions.push(ClientAction::ShowOverlay {
                        kind: OverlayKind::Errors,
                        diagnostics: errors,
                    });
                }
                actions
            }
            Envelope::Error(reason) => vec![ClientAction::log(LogLevel::Error, reason)],
        }
    }

    fn reload_app(&self) -> Vec<ClientAction> {
        if self.status.is_unloading || self.status.is_initial_sync() {
            return Vec::new();
        }

        if self.options.hot {
            vec![
                ClientAction::info("App hot update..."),
                ClientAction::HotUpdate(self.status.current_hash.clone()),
            ]
        } else if self.options.live_reload {
            vec![ClientAction::info("App updated. Reloading..."), ClientAction::Reload]
        } else {
            Vec::new()
        }
    }

    fn overlay_enabled(&self) -> bool {
        self.options
            .overlay
            .as_ref()
            .is_some_and(OverlaySetting::is_enabled)
    }

    fn overlay_shows(&self, kind: OverlayKind) -> bool {
        self.options.overlay.as_ref().is_some_and(|overlay| match kind {
            OverlayKind::Warnings => overlay.shows_warnings(),
            OverlayKind::Errors => overlay.shows_errors(),
        })
    }
}
