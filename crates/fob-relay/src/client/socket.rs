//! Tokio driver for the client side of the relay.
//!
//! [`RelayClient`] connects over WebSocket, feeds frames through the
//! [`Dispatcher`] and drives the [`ReconnectMachine`] with real timers.

use super::dispatch::{ClientAction, Dispatcher};
use super::reconnect::{Jitter, RandomJitter, ReconnectAction, ReconnectMachine};
use crate::config::ReconnectBudget;
use crate::error::{Result, TransportError};
use crate::protocol::Envelope;
use futures_util::StreamExt;
use std::collections::VecDeque;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Receives the actions a relay client produces.
pub trait ClientApp: Send {
    fn on_action(&mut self, action: ClientAction);
}

impl ClientApp for mpsc::UnboundedSender<ClientAction> {
    fn on_action(&mut self, action: ClientAction) {
        let _ = self.send(action);
    }
}

/// WebSocket relay client with reconnect and backoff.
pub struct RelayClient<A: ClientApp, J: Jitter = RandomJitter> {
    url: Url,
    origin: String,
    machine: ReconnectMachine<J>,
    dispatcher: Dispatcher,
    app: A,
}

impl<A: ClientApp> RelayClient<A> {
    /// Client for a `ws://` or `wss://` relay URL.
    ///
    /// The Origin header defaults to the matching `http(s)://host:port`.
    pub fn new(url: &str, app: A) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| TransportError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let scheme = match url.scheme() {
            "ws" => "http",
            "wss" => "https",
            other => {
                return Err(TransportError::InvalidUrl {
                    url: url.to_string(),
                    reason: format!("unsupported scheme '{}'", other),
                }
                .into())
            }
        };
        let origin = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}://{}:{}", scheme, host, port),
            (Some(host), None) => format!("{}://{}", scheme, host),
            (None, _) => {
                return Err(TransportError::InvalidUrl {
                    url: url.to_string(),
                    reason: "missing host".to_string(),
                }
                .into())
            }
        };

        Ok(Self {
            url,
            origin,
            machine: ReconnectMachine::new(ReconnectBudget::default()),
            dispatcher: Dispatcher::new(),
            app,
        })
    }
}

impl<A: ClientApp, J: Jitter> RelayClient<A, J> {
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn with_budget(mut self, budget: ReconnectBudget) -> Self {
        self.machine.set_budget(budget);
        self
    }

    pub fn with_jitter<J2: Jitter>(self, jitter: J2) -> RelayClient<A, J2> {
        let mut machine = ReconnectMachine::with_jitter(ReconnectBudget::default(), jitter);
        machine.set_budget(self.machine_budget());
        RelayClient {
            url: self.url,
            origin: self.origin,
            machine,
            dispatcher: self.dispatcher,
            app: self.app,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn into_app(self) -> A {
        self.app
    }

    /// Connect and process envelopes until the reconnect budget runs out.
    ///
    /// A malformed frame is a protocol error and ends the client with `Err`.
    pub async fn run(&mut self) -> Result<()> {
        let mut queue: VecDeque<ReconnectAction> = self.machine.start().into();

        while let Some(action) = queue.pop_front() {
            match action {
                ReconnectAction::Connect => match self.connect().await {
                    Ok(socket) => {
                        info!("Connected to relay at {}", self.url);
                        queue.extend(self.machine.on_open());
                        self.session(socket).await?;
                        queue.extend(self.machine.on_close());
                    }
                    Err(e) => {
                        debug!("Relay connection to {} failed: {}", self.url, e);
                        queue.extend(self.machine.on_close());
                    }
                },
                ReconnectAction::ScheduleReconnect { delay, attempt } => {
                    info!("Reconnecting in {:?} (attempt {})", delay, attempt);
                    tokio::time::sleep(delay).await;
                    queue.extend(self.machine.on_timer());
                }
                ReconnectAction::NotifyClosed => {
                    for action in self.dispatcher.on_close() {
                        self.app.on_action(action);
                    }
                }
                // The driver sleeps inline, so no timer can be pending on open.
                ReconnectAction::CancelReconnect => {}
                ReconnectAction::GiveUp => {
                    warn!("Giving up on relay at {}", self.url);
                    break;
                }
            }
        }
        Ok(())
    }

    async fn connect(&self) -> Result<Socket> {
        let mut request = self.url.as_str().into_client_request().map_err(TransportError::from)?;
        let origin = HeaderValue::from_str(&self.origin).map_err(|e| TransportError::InvalidUrl {
            url: self.origin.clone(),
            reason: e.to_string(),
        })?;
        request.headers_mut().insert(header::ORIGIN, origin);

        let (socket, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(TransportError::from)?;
        Ok(socket)
    }

    async fn session(&mut self, mut socket: Socket) -> Result<()> {
        while let Some(message) = socket.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    let Some(envelope) = Envelope::decode(&text)? else {
                        continue;
                    };
                    for action in self.dispatcher.handle(envelope) {
                        if let ClientAction::SetReconnect(budget) = action {
                            self.machine.set_budget(budget);
                        }
                        self.app.on_action(action);
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("Relay connection error: {}", e);
                    break;
                }
            }
        }
        Ok(())
    }

    fn machine_budget(&self) -> ReconnectBudget {
        self.machine.budget()
    }
}
