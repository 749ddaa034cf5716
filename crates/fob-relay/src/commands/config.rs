//! `fob-relay config` - print the resolved configuration.

use crate::cli::{ConfigArgs, ConfigFormat};
use crate::config::{ConfigOverrides, RelayConfig};
use crate::error::{RelayError, Result};

/// Execute the config command.
///
/// Output goes to stdout so it can be redirected into a config file.
pub async fn execute(args: ConfigArgs) -> Result<()> {
    println!("{}", render(&args)?);
    Ok(())
}

fn render(args: &ConfigArgs) -> Result<String> {
    if args.schema {
        return Ok(serde_json::to_string_pretty(&RelayConfig::json_schema())?);
    }

    let cwd = std::env::current_dir()?;
    let config = RelayConfig::load(&cwd, args.config.as_deref(), &ConfigOverrides::default())?;

    match args.format {
        ConfigFormat::Json => Ok(serde_json::to_string_pretty(&config)?),
        ConfigFormat::Toml => toml::to_string_pretty(&config)
            .map_err(|e| RelayError::Custom(format!("Failed to render TOML: {}", e))),
    }
}
