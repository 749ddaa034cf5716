use crate::config::{AllowedHosts, RelayConfig};
use crate::error::{ConfigError, Result};
use crate::transport::TransportKind;
use figment::{
    providers::{Env, Format as _, Json, Serialized, Toml},
    value::Uncased,
    Figment,
};
use serde::Serialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// Config files picked up from the working directory, in lookup order.
pub const CONFIG_FILE_NAMES: &[&str] = &["fob-relay.json", "fob-relay.toml"];

/// Prefix for environment overrides (`FOB_RELAY_PORT`, `FOB_RELAY_CLIENT__PUBLIC_HOSTNAME`).
pub const ENV_PREFIX: &str = "FOB_RELAY_";

/// Values given on the command line. Only `Some` fields override lower layers.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_hosts: Option<AllowedHosts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hot: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_reload: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportKind>,
}

impl RelayConfig {
    /// Load configuration from multiple sources.
    ///
    /// Priority: CLI overrides > environment variables > config file > defaults.
    /// Without an explicit `config_path`, the first of [`CONFIG_FILE_NAMES`]
    /// found in `cwd` is used.
    pub fn load(
        cwd: &Path,
        config_path: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Result<Self> {
        let config: Self = Self::figment(cwd, config_path, overrides)?
            .extract()
            .map_err(|e| ConfigError::Extract(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Build the layered figment without extracting it.
    pub fn figment(
        cwd: &Path,
        config_path: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Result<Figment> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        let config_file = match config_path {
            Some(path) => {
                let path = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    cwd.join(path)
                };
                if !path.exists() {
                    return Err(ConfigError::NotFound(path).into());
                }
                Some(path)
            }
            None => CONFIG_FILE_NAMES
                .iter()
                .map(|name| cwd.join(name))
                .find(|path| path.exists()),
        };

        if let Some(path) = config_file {
            tracing::debug!("Loading config from {}", path.display());
            figment = match path.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file(path)),
                _ => figment.merge(Json::file(path)),
            };
        }

        figment = figment.merge(
            Env::prefixed(ENV_PREFIX)
                .split("__")
                .map(|key| Uncased::from(env_key_to_field(key.as_str()))),
        );

        Ok(figment.merge(Serialized::defaults(overrides)))
    }
}

/// Map a lowercased, dot-split env key to the camelCase config path
/// (`client.public_hostname` -> `client.publicHostname`).
pub(crate) fn env_key_to_field(key: &str) -> String {
    key.split('.')
        .map(|segment| {
            let mut out = String::with_capacity(segment.len());
            let mut upper_next = false;
            for ch in segment.chars() {
                if ch == '_' {
                    upper_next = true;
                } else if upper_next {
                    out.extend(ch.to_uppercase());
                    upper_next = false;
                } else {
                    out.push(ch);
                }
            }
            out
        })
        .collect::<Vec<_>>()
        .join(".")
}
