use crate::config::RelayConfig;
use crate::error::{ConfigError, Result};

/// Validate the handshake route a transport is mounted on.
pub fn validate_path(path: &str) -> Result<()> {
    if !path.starts_with('/') || path.len() < 2 || path.ends_with('/') {
        return Err(ConfigError::InvalidValue {
            field: "path".to_string(),
            value: path.to_string(),
            hint: "Use an absolute route without a trailing slash, e.g. \"/ws\"".to_string(),
        }
        .into());
    }

    if path.contains('{') || path.contains('}') || path.contains('*') {
        return Err(ConfigError::InvalidValue {
            field: "path".to_string(),
            value: path.to_string(),
            hint: "Route parameters and wildcards are not allowed".to_string(),
        }
        .into());
    }

    Ok(())
}

impl RelayConfig {
    /// Validate configuration for logical consistency.
    pub fn validate(&self) -> Result<()> {
        validate_path(&self.path)?;

        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "heartbeatIntervalMs".to_string(),
                value: "0".to_string(),
                hint: "Heartbeat interval must be at least 1ms".to_string(),
            }
            .into());
        }

        if let Some(empty) = self
            .allowed_hosts
            .entries()
            .iter()
            .find(|host| host.trim().is_empty() || host.as_str() == ".")
        {
            return Err(ConfigError::InvalidValue {
                field: "allowedHosts".to_string(),
                value: format!("{:?}", empty),
                hint: "Entries must be hostnames or \".domain\" wildcards".to_string(),
            }
            .into());
        }

        if let Some(hostname) = &self.client.public_hostname {
            if hostname.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "client.publicHostname".to_string(),
                    value: String::new(),
                    hint: "Remove the field or set a hostname".to_string(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Validate that the static root exists (needed by `serve` only).
    pub fn validate_root(&self) -> Result<()> {
        if !self.root.is_dir() {
            return Err(ConfigError::InvalidValue {
                field: "root".to_string(),
                value: self.root.display().to_string(),
                hint: "Static root must be an existing directory".to_string(),
            }
            .into());
        }
        Ok(())
    }
}
