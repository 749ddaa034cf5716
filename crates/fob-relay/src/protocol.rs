//! Message envelope protocol.
//!
//! Every server → client frame is one JSON object `{ type, data?, params? }`.
//! The vocabulary is closed: [`Envelope`] has one variant per `type`, and
//! decoding an unknown `type` yields `Ok(None)` so newer servers can talk to
//! older clients.

use crate::config::{OverlaySetting, ProgressSetting, ReconnectBudget};
use crate::error::{RelayError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One build warning or error as shown to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}: {}", file, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Payload of a `progress-update` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub percent: u8,
    pub msg: String,
}

impl ProgressUpdate {
    pub fn new(percent: u8, msg: impl Into<String>) -> Self {
        Self {
            percent: percent.min(100),
            msg: msg.into(),
        }
    }
}

/// A server → client message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    Hot,
    LiveReload,
    Progress(ProgressSetting),
    Reconnect(ReconnectBudget),
    Overlay(OverlaySetting),
    StillOk,
    Hash(String),
    Ok,
    Warnings {
        warnings: Vec<Diagnostic>,
        prevent_reloading: bool,
    },
    Errors(Vec<Diagnostic>),
    Error(String),
    Invalid,
    StaticChanged(String),
    ProgressUpdate(ProgressUpdate),
}

#[derive(Debug, Serialize, Deserialize)]
struct WireEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WarningsParams {
    #[serde(default)]
    prevent_reloading: bool,
}

impl Envelope {
    /// The wire `type` string.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Hot => "hot",
            Envelope::LiveReload => "liveReload",
            Envelope::Progress(_) => "progress",
            Envelope::Reconnect(_) => "reconnect",
            Envelope::Overlay(_) => "overlay",
            Envelope::StillOk => "still-ok",
            Envelope::Hash(_) => "hash",
            Envelope::Ok => "ok",
            Envelope::Warnings { .. } => "warnings",
            Envelope::Errors(_) => "errors",
            Envelope::Error(_) => "error",
            Envelope::Invalid => "invalid",
            Envelope::StaticChanged(_) => "static-changed",
            Envelope::ProgressUpdate(_) => "progress-update",
        }
    }

    /// Encode as a JSON text frame.
    pub fn encode(&self) -> Result<String> {
        let (data, params) = match self {
            Envelope::Hot
            | Envelope::LiveReload
            | Envelope::StillOk
            | Envelope::Ok
            | Envelope::Invalid => (None, None),
            Envelope::Progress(progress) => (Some(serde_json::to_value(progress)?), None),
            Envelope::Reconnect(budget) => (Some(serde_json::to_value(budget)?), None),
            Envelope::Overlay(overlay) => (Some(serde_json::to_value(overlay)?), None),
            Envelope::Hash(hash) => (Some(Value::from(hash.as_str())), None),
            Envelope::Warnings {
                warnings,
                prevent_reloading,
            } => {
                let params = if *prevent_reloading {
                    Some(serde_json::to_value(WarningsParams {
                        prevent_reloading: true,
                    })?)
                } else {
                    None
                };
                (Some(serde_json::to_value(warnings)?), params)
            }
            Envelope::Errors(errors) => (Some(serde_json::to_value(errors)?), None),
            Envelope::Error(reason) => (Some(Value::from(reason.as_str())), None),
            Envelope::StaticChanged(path) => (Some(Value::from(path.as_str())), None),
            Envelope::ProgressUpdate(update) => (Some(serde_json::to_value(update)?), None),
        };

        let wire = WireEnvelope {
            kind: self.kind().to_string(),
            data,
            params,
        };
        Ok(serde_json::to_string(&wire)?)
    }

    /// Decode a text frame.
    ///
    /// Malformed JSON or a known `type` with an unusable payload is an error;
    /// an unknown `type` is `Ok(None)`.
    pub fn decode(text: &str) -> Result<Option<Envelope>> {
        let wire: WireEnvelope = serde_json::from_str(text)
            .map_err(|e| RelayError::Protocol(format!("malformed envelope: {}", e)))?;
        let WireEnvelope { kind, data, params } = wire;

        let envelope = match kind.as_str() {
            "hot" => Envelope::Hot,
            "liveReload" => Envelope::LiveReload,
            "progress" => Envelope::Progress(payload(&kind, data)?),
            "reconnect" => Envelope::Reconnect(payload(&kind, data)?),
            "overlay" => Envelope::Overlay(payload(&kind, data)?),
            "still-ok" => Envelope::StillOk,
            "hash" => Envelope::Hash(payload(&kind, data)?),
            "ok" => Envelope::Ok,
            "warnings" => {
                let params: WarningsParams = match params {
                    Some(params) => serde_json::from_value(params).map_err(|e| {
                        RelayError::Protocol(format!("bad 'warnings' params: {}", e))
                    })?,
                    None => WarningsParams::default(),
                };
                Envelope::Warnings {
                    warnings: payload(&kind, data)?,
                    prevent_reloading: params.prevent_reloading,
                }
            }
            "errors" => Envelope::Errors(payload(&kind, data)?),
            "error" => Envelope::Error(payload(&kind, data)?),
            "invalid" => Envelope::Invalid,
            "static-changed" => Envelope::StaticChanged(payload(&kind, data)?),
            "progress-update" => Envelope::ProgressUpdate(payload(&kind, data)?),
            other => {
                tracing::debug!("Ignoring unknown envelope type '{}'", other);
                return Ok(None);
            }
        };
        Ok(Some(envelope))
    }
}

fn payload<T: DeserializeOwned>(kind: &str, data: Option<Value>) -> Result<T> {
    let data =
        data.ok_or_else(|| RelayError::Protocol(format!("'{}' envelope without data", kind)))?;
    serde_json::from_value(data)
        .map_err(|e| RelayError::Protocol(format!("bad '{}' payload: {}", kind, e)))
}
