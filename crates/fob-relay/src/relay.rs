//! Relay server.
//!
//! One event-loop task owns the transport backend, the connection registry,
//! the broadcast engine and the last build result. Transport events,
//! heartbeat ticks and [`RelayHandle`] commands are handled one at a time on
//! that task, so none of that state is shared or locked.
//!
//! ```text
//!   handshake ──► TransportEvent::Connected ──► HostValidator ──┬─► error envelope + close
//!                                                               └─► registry + initial burst
//!   build pipeline ──► RelayHandle ──► Command ──► BroadcastEngine ──► registry snapshot
//! ```

use crate::broadcast::{send_all, BroadcastEngine, BuildSummary};
use crate::client::ClientAssets;
use crate::config::{OverlaySetting, ProgressSetting, ReconnectBudget, RelayConfig};
use crate::error::{RelayError, Result};
use crate::host_check::{host_gate, HostValidator, INVALID_HOST_MESSAGE};
use crate::protocol::{Envelope, ProgressUpdate};
use crate::registry::ConnectionRegistry;
use crate::transport::{create_backend, TransportBackend, TransportEvent, TransportKind};
use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Prefix of the relay's own HTTP endpoints.
pub const CONTROL_PREFIX: &str = "/__fob_relay__";

/// Client options announced in the initial burst.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSettings {
    pub hot: bool,
    pub live_reload: bool,
    pub progress: Option<ProgressSetting>,
    pub reconnect: Option<ReconnectBudget>,
    pub overlay: Option<OverlaySetting>,
}

impl ClientSettings {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            hot: config.hot,
            live_reload: config.live_reload,
            progress: config.client.progress.clone(),
            reconnect: config.client.reconnect,
            overlay: config.client.overlay.clone(),
        }
    }

    /// Envelopes every trusted connection receives first, in this order.
    pub fn initial_burst(&self) -> Vec<Envelope> {
        let mut burst = Vec::new();
        if self.hot {
            burst.push(Envelope::Hot);
        }
        if self.live_reload {
            burst.push(Envelope::LiveReload);
        }
        if let Some(progress) = self.progress.as_ref().filter(|p| p.is_enabled()) {
            burst.push(Envelope::Progress(progress.clone()));
        }
        if let Some(reconnect) = self.reconnect {
            burst.push(Envelope::Reconnect(reconnect));
        }
        if let Some(overlay) = self.overlay.as_ref().filter(|o| o.is_enabled()) {
            burst.push(Envelope::Overlay(overlay.clone()));
        }
        burst
    }
}

/// Snapshot of relay state, also served on `/__fob_relay__/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStatus {
    pub transport: TransportKind,
    pub connections: usize,
    pub current_hash: Option<String>,
}

#[derive(Debug)]
enum Command {
    BuildInvalidated,
    BuildDone(BuildSummary),
    StaticChanged(String),
    Progress(ProgressUpdate),
    Status(oneshot::Sender<RelayStatus>),
    Shutdown(oneshot::Sender<()>),
}

/// Where browser clients find the transport.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientEndpoint {
    transport: TransportKind,
    path: String,
}

/// Cloneable handle the build pipeline uses to drive the relay.
///
/// Dropping every handle shuts the relay down. The mounted control routes
/// hold only a weak reference and do not count.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    commands: mpsc::UnboundedSender<Command>,
    validator: Arc<HostValidator>,
    endpoint: Arc<ClientEndpoint>,
}

impl RelayHandle {
    /// A rebuild started: clients get `invalid`.
    pub fn invalid(&self) -> Result<()> {
        self.send(Command::BuildInvalidated)
    }

    /// A build finished: diff it against the last one and broadcast.
    pub fn build_done(&self, summary: BuildSummary) -> Result<()> {
        self.send(Command::BuildDone(summary))
    }

    /// A file outside the build changed: clients get `static-changed`.
    pub fn static_changed(&self, path: impl Into<String>) -> Result<()> {
        self.send(Command::StaticChanged(path.into()))
    }

    pub fn progress(&self, update: ProgressUpdate) -> Result<()> {
        self.send(Command::Progress(update))
    }

    pub async fn status(&self) -> Result<RelayStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Status(tx))?;
        rx.await.map_err(|_| RelayError::RelayClosed)
    }

    /// Close every connection and the backend, then stop the event loop.
    ///
    /// Returns once the loop has finished; a relay that is already closed is
    /// not an error.
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown(tx)).is_err() {
            return Ok(());
        }
        let _ = rx.await;
        Ok(())
    }

    /// The Host/Origin policy this relay enforces, for gating other routes.
    pub fn validator(&self) -> Arc<HostValidator> {
        Arc::clone(&self.validator)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| RelayError::RelayClosed)
    }
}

/// Entry point for attaching a relay to an application router.
pub struct RelayServer;

impl RelayServer {
    /// Mount the transport and control routes onto `router` and start the
    /// relay event loop.
    ///
    /// Fails before anything is mounted if the transport cannot be built.
    /// Must be called from within a Tokio runtime.
    pub fn attach(config: &RelayConfig, router: Router) -> Result<(Router, RelayHandle)> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let backend = create_backend(
            config.transport,
            &config.path,
            config.heartbeat_interval(),
            events_tx,
        )?;

        let router = backend.attach(router);
        let handle = spawn(
            ClientSettings::from_config(config),
            HostValidator::from_config(config),
            backend,
            events_rx,
            config.path.clone(),
        );

        let control = control_routes(&handle).layer(middleware::from_fn_with_state(
            handle.validator(),
            host_gate,
        ));
        info!(
            "Relay listening for {} clients on {}",
            config.transport, config.path
        );
        Ok((router.merge(control), handle))
    }
}

pub(crate) fn spawn(
    settings: ClientSettings,
    validator: HostValidator,
    backend: Box<dyn TransportBackend>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    path: String,
) -> RelayHandle {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let validator = Arc::new(validator);
    let endpoint = Arc::new(ClientEndpoint {
        transport: backend.kind(),
        path,
    });

    let relay = RelayLoop {
        settings,
        validator: Arc::clone(&validator),
        backend,
        registry: ConnectionRegistry::new(),
        engine: BroadcastEngine::new(),
        last_build: None,
    };
    tokio::spawn(relay.run(events, commands_rx));

    RelayHandle {
        commands: commands_tx,
        validator,
        endpoint,
    }
}

struct RelayLoop {
    settings: ClientSettings,
    validator: Arc<HostValidator>,
    backend: Box<dyn TransportBackend>,
    registry: ConnectionRegistry,
    engine: BroadcastEngine,
    last_build: Option<BuildSummary>,
}

impl RelayLoop {
    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        let mut heartbeat = self.backend.heartbeat_interval().map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            // Transport events first: a handshake that landed before a
            // command is registered before that command is handled.
            tokio::select! {
                biased;

                Some(event) = events.recv() => self.on_transport_event(event),
                command = commands.recv() => match command {
                    Some(Command::Shutdown(done)) => {
                        commands.close();
                        self.shutdown();
                        let _ = done.send(());
                        break;
                    }
                    Some(command) => self.on_command(command),
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                _ = next_tick(&mut heartbeat) => self.on_heartbeat(),
            }
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected {
                connection,
                headers,
            } => {
                if !self.validator.check_handshake(&headers) {
                    warn!(
                        host = ?headers.get(header::HOST),
                        origin = ?headers.get(header::ORIGIN),
                        "Rejected {} connection {}",
                        connection.kind(),
                        connection.id()
                    );
                    if let Err(e) = send_all(
                        std::slice::from_ref(&connection),
                        &[Envelope::Error(INVALID_HOST_MESSAGE.to_string())],
                    ) {
                        warn!("Failed to encode rejection: {}", e);
                    }
                    connection.terminate();
                    return;
                }

                info!("Client {} connected via {}", connection.id(), connection.kind());
                self.registry.insert(connection.clone());

                let mut burst = self.settings.initial_burst();
                if let Some(summary) = &self.last_build {
                    burst.extend(self.engine.plan(summary, true));
                }
                if let Err(e) = send_all(std::slice::from_ref(&connection), &burst) {
                    warn!("Failed to send initial burst to {}: {}", connection.id(), e);
                }
            }
            TransportEvent::Closed { id } => {
                if self.registry.remove(id).is_some() {
                    info!("Client {} disconnected", id);
                }
            }
        }
    }

    fn on_command(&mut self, command: Command) {
        let result = match command {
            Command::BuildInvalidated => send_all(&self.registry.snapshot(), &[Envelope::Invalid]),
            Command::BuildDone(summary) => {
                let sent = self
                    .engine
                    .broadcast(&self.registry.snapshot(), &summary, false);
                self.last_build = Some(summary);
                sent
            }
            Command::StaticChanged(path) => send_all(
                &self.registry.snapshot(),
                &[Envelope::StaticChanged(path)],
            ),
            Command::Progress(update) => send_all(
                &self.registry.snapshot(),
                &[Envelope::ProgressUpdate(update)],
            ),
            Command::Status(reply) => {
                let _ = reply.send(RelayStatus {
                    transport: self.backend.kind(),
                    connections: self.registry.len(),
                    current_hash: self.engine.current_hash().map(str::to_string),
                });
                return;
            }
            // handled by the loop
            Command::Shutdown(_) => return,
        };

        match result {
            Ok(delivered) => debug!("Broadcast reached {} client(s)", delivered),
            Err(e) => warn!("Broadcast failed: {}", e),
        }
    }

    fn on_heartbeat(&mut self) {
        let removed = self.registry.heartbeat();
        if !removed.is_empty() {
            info!("Heartbeat dropped {} unresponsive client(s)", removed.len());
        }
    }

    fn shutdown(&mut self) {
        let open = self.registry.len();
        self.registry.terminate_all();
        self.backend.close();
        info!("Relay closed ({} client(s) disconnected)", open);
    }
}

async fn next_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Router state for the control routes.
#[derive(Clone)]
struct ControlState {
    commands: mpsc::WeakUnboundedSender<Command>,
    validator: Arc<HostValidator>,
    endpoint: Arc<ClientEndpoint>,
}

impl ControlState {
    fn new(handle: &RelayHandle) -> Self {
        Self {
            commands: handle.commands.downgrade(),
            validator: Arc::clone(&handle.validator),
            endpoint: Arc::clone(&handle.endpoint),
        }
    }

    /// A request-scoped handle, or `None` once every real handle is gone.
    fn upgrade(&self) -> Option<RelayHandle> {
        Some(RelayHandle {
            commands: self.commands.upgrade()?,
            validator: Arc::clone(&self.validator),
            endpoint: Arc::clone(&self.endpoint),
        })
    }
}

fn control_routes(handle: &RelayHandle) -> Router {
    Router::new()
        .route(&format!("{}/status", CONTROL_PREFIX), get(status))
        .route(&format!("{}/client.js", CONTROL_PREFIX), get(client_script))
        .with_state(ControlState::new(handle))
}

async fn status(State(state): State<ControlState>) -> Response {
    let result = match state.upgrade() {
        Some(handle) => handle.status().await,
        None => Err(RelayError::RelayClosed),
    };
    match result {
        Ok(status) => Json(status).into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

async fn client_script(State(state): State<ControlState>) -> Response {
    let Some(script) = ClientAssets::get("relay-client.js") else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Missing embedded relay client",
        )
            .into_response();
    };

    let endpoint = serde_json::to_string(state.endpoint.as_ref()).unwrap_or_else(|_| "{}".into());
    let body = format!(
        "window.__FOB_RELAY__ = {};\n{}",
        endpoint,
        String::from_utf8_lossy(script.data.as_ref())
    );

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from(body),
    )
        .into_response()
}
