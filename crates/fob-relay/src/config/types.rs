use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::defaults::*;

/// Hosts the relay trusts in addition to the built-in local addresses.
///
/// Accepts `"all"`, `"auto"` or a list such as `["app.test", ".example.com"]`
/// where a leading dot matches the domain itself and every subdomain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum AllowedHosts {
    Keyword(HostsKeyword),
    List(Vec<String>),
}

/// Keyword forms of [`AllowedHosts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum HostsKeyword {
    /// Disable host checking entirely
    All,
    /// Only local addresses and the public client hostname
    Auto,
}

impl AllowedHosts {
    /// The wildcard that switches every host/origin check off.
    pub fn all() -> Self {
        AllowedHosts::Keyword(HostsKeyword::All)
    }

    /// Explicit allow-list.
    pub fn list<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AllowedHosts::List(hosts.into_iter().map(Into::into).collect())
    }

    /// Whether the wildcard is active.
    pub fn is_all(&self) -> bool {
        matches!(self, AllowedHosts::Keyword(HostsKeyword::All))
    }

    /// Allow-list entries; empty for the keyword forms.
    pub fn entries(&self) -> &[String] {
        match self {
            AllowedHosts::List(hosts) => hosts,
            AllowedHosts::Keyword(_) => &[],
        }
    }
}

impl Default for AllowedHosts {
    fn default() -> Self {
        AllowedHosts::Keyword(HostsKeyword::Auto)
    }
}

/// Progress reporting in the browser console (`true`, `false` or a mode string).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ProgressSetting {
    Enabled(bool),
    Mode(String),
}

impl ProgressSetting {
    pub fn is_enabled(&self) -> bool {
        match self {
            ProgressSetting::Enabled(enabled) => *enabled,
            ProgressSetting::Mode(mode) => !mode.is_empty(),
        }
    }
}

/// How many times a disconnected client retries before giving up.
///
/// On the wire and in config files: `true` is unbounded, `false` is zero,
/// a number is a fixed budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ReconnectRepr", into = "ReconnectRepr")]
pub enum ReconnectBudget {
    Limited(u32),
    Unbounded,
}

impl ReconnectBudget {
    /// Whether another attempt is allowed after `retries` failed ones.
    pub fn allows(&self, retries: u32) -> bool {
        match self {
            ReconnectBudget::Limited(max) => retries < *max,
            ReconnectBudget::Unbounded => true,
        }
    }
}

impl Default for ReconnectBudget {
    fn default() -> Self {
        ReconnectBudget::Limited(DEFAULT_RECONNECT_ATTEMPTS)
    }
}

/// Serialized shape of [`ReconnectBudget`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ReconnectRepr {
    Flag(bool),
    Count(u32),
}

impl From<ReconnectRepr> for ReconnectBudget {
    fn from(repr: ReconnectRepr) -> Self {
        match repr {
            ReconnectRepr::Flag(true) => ReconnectBudget::Unbounded,
            ReconnectRepr::Flag(false) => ReconnectBudget::Limited(0),
            ReconnectRepr::Count(count) => ReconnectBudget::Limited(count),
        }
    }
}

impl From<ReconnectBudget> for ReconnectRepr {
    fn from(budget: ReconnectBudget) -> Self {
        match budget {
            ReconnectBudget::Limited(count) => ReconnectRepr::Count(count),
            ReconnectBudget::Unbounded => ReconnectRepr::Flag(true),
        }
    }
}

/// In-browser overlay for build diagnostics (`true`, `false` or per-kind options).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum OverlaySetting {
    Enabled(bool),
    Options(OverlayOptions),
}

/// Per-kind overlay switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OverlayOptions {
    #[serde(default = "default_true")]
    pub errors: bool,
    #[serde(default = "default_true")]
    pub warnings: bool,
    #[serde(default = "default_true")]
    pub runtime_errors: bool,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            errors: true,
            warnings: true,
            runtime_errors: true,
        }
    }
}

impl OverlaySetting {
    pub fn is_enabled(&self) -> bool {
        match self {
            OverlaySetting::Enabled(enabled) => *enabled,
            OverlaySetting::Options(options) => {
                options.errors || options.warnings || options.runtime_errors
            }
        }
    }

    pub fn shows_errors(&self) -> bool {
        match self {
            OverlaySetting::Enabled(enabled) => *enabled,
            OverlaySetting::Options(options) => options.errors,
        }
    }

    pub fn shows_warnings(&self) -> bool {
        match self {
            OverlaySetting::Enabled(enabled) => *enabled,
            OverlaySetting::Options(options) => options.warnings,
        }
    }
}

/// Settings announced to browser clients when they connect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClientConfig {
    /// Public hostname clients use to reach the relay (e.g. behind a tunnel)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_hostname: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressSetting>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<ReconnectRepr>")]
    pub reconnect: Option<ReconnectBudget>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<OverlaySetting>,
}

/// File watching settings for the `serve` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WatchConfig {
    /// Patterns to ignore (directory names or `*.ext`)
    #[serde(default = "default_watch_ignore")]
    pub ignore: Vec<String>,

    /// Debounce delay in milliseconds for file changes
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Extra paths whose changes trigger a `static-changed` reload
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_paths: Vec<PathBuf>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            ignore: default_watch_ignore(),
            debounce_ms: default_debounce_ms(),
            static_paths: Vec::new(),
        }
    }
}
