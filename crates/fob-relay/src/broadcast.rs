//! Build-result diffing and fan-out.

use crate::error::Result;
use crate::protocol::{Diagnostic, Envelope};
use crate::transport::Connection;
use serde::{Deserialize, Serialize};

/// What the build pipeline reports for one completed build.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildSummary {
    pub hash: String,
    #[serde(default)]
    pub warnings: Vec<Diagnostic>,
    #[serde(default)]
    pub errors: Vec<Diagnostic>,
}

impl BuildSummary {
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<Diagnostic>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn with_errors(mut self, errors: Vec<Diagnostic>) -> Self {
        self.errors = errors;
        self
    }

    /// No warnings and no errors.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.errors.is_empty()
    }
}

/// Decides what a new build result is worth telling clients.
///
/// Holds only the most recently broadcast hash.
#[derive(Debug, Default)]
pub struct BroadcastEngine {
    current_hash: Option<String>,
}

impl BroadcastEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_hash(&self) -> Option<&str> {
        self.current_hash.as_deref()
    }

    /// Envelopes for `summary`, in send order.
    ///
    /// An unchanged clean build collapses to `still-ok` unless `force` is set.
    pub fn plan(&mut self, summary: &BuildSummary, force: bool) -> Vec<Envelope> {
        if !force
            && summary.is_clean()
            && self.current_hash.as_deref() == Some(summary.hash.as_str())
        {
            return vec![Envelope::StillOk];
        }

        self.current_hash = Some(summary.hash.clone());

        let mut envelopes = vec![Envelope::Hash(summary.hash.clone())];
        if summary.is_clean() {
            envelopes.push(Envelope::Ok);
            return envelopes;
        }

        if !summary.warnings.is_empty() {
            envelopes.push(Envelope::Warnings {
                warnings: summary.warnings.clone(),
                prevent_reloading: !summary.errors.is_empty(),
            });
        }
        if !summary.errors.is_empty() {
            envelopes.push(Envelope::Errors(summary.errors.clone()));
        }
        envelopes
    }

    /// Plan `summary` and send it to every connection. Returns how many
    /// connections accepted the frames.
    pub fn broadcast(
        &mut self,
        connections: &[Connection],
        summary: &BuildSummary,
        force: bool,
    ) -> Result<usize> {
        let envelopes = self.plan(summary, force);
        send_all(connections, &envelopes)
    }
}

/// Encode each envelope once and queue it on every connection.
pub fn send_all(connections: &[Connection], envelopes: &[Envelope]) -> Result<usize> {
    let frames = envelopes
        .iter()
        .map(Envelope::encode)
        .collect::<Result<Vec<_>>>()?;

    let delivered = connections
        .iter()
        .filter(|connection| {
            frames
                .iter()
                .all(|frame| connection.send_text(frame.as_str()))
        })
        .count();
    Ok(delivered)
}
