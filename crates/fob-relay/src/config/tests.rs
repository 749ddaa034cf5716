#[cfg(test)]
mod tests {
    use crate::config::loading::env_key_to_field;
    use crate::config::*;
    use crate::error::{ConfigError, RelayError};
    use crate::transport::TransportKind;
    use serial_test::serial;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn test_serialization() {
        let config = RelayConfig {
            allowed_hosts: AllowedHosts::list(["app.test", ".example.com"]),
            client: ClientConfig {
                reconnect: Some(ReconnectBudget::Unbounded),
                overlay: Some(OverlaySetting::Enabled(true)),
                ..ClientConfig::default()
            },
            ..RelayConfig::default()
        };
        let json_val = serde_json::to_value(&config).unwrap();

        // camelCase field names
        assert!(json_val.get("allowedHosts").is_some());
        assert!(json_val.get("liveReload").is_some());
        assert!(json_val.get("heartbeatIntervalMs").is_some());
        assert!(json_val.get("live_reload").is_none());

        // reconnect: true means unbounded
        assert_eq!(json_val["client"]["reconnect"], serde_json::json!(true));

        // skip_serializing_if
        assert!(json_val["client"].get("publicHostname").is_none());
        assert!(json_val["watch"].get("staticPaths").is_none());

        let back: RelayConfig = serde_json::from_value(json_val).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_allowed_hosts_forms() {
        let all: AllowedHosts = serde_json::from_str("\"all\"").unwrap();
        assert!(all.is_all());
        assert!(all.entries().is_empty());

        let auto: AllowedHosts = serde_json::from_str("\"auto\"").unwrap();
        assert_eq!(auto, AllowedHosts::default());
        assert!(!auto.is_all());

        let list: AllowedHosts = serde_json::from_str(r#"["a.test", ".b.test"]"#).unwrap();
        assert_eq!(list.entries(), ["a.test", ".b.test"]);
    }

    #[test]
    fn test_reconnect_budget_forms() {
        let parse = |s: &str| serde_json::from_str::<ReconnectBudget>(s).unwrap();
        assert_eq!(parse("true"), ReconnectBudget::Unbounded);
        assert_eq!(parse("false"), ReconnectBudget::Limited(0));
        assert_eq!(parse("3"), ReconnectBudget::Limited(3));

        assert!(ReconnectBudget::Unbounded.allows(u32::MAX - 1));
        assert!(ReconnectBudget::Limited(2).allows(1));
        assert!(!ReconnectBudget::Limited(2).allows(2));
        assert_eq!(ReconnectBudget::default(), ReconnectBudget::Limited(10));
    }

    #[test]
    fn test_overlay_setting_forms() {
        let partial: OverlaySetting = serde_json::from_str(r#"{"warnings": false}"#).unwrap();
        assert!(partial.is_enabled());
        assert!(partial.shows_errors());
        assert!(!partial.shows_warnings());

        let off: OverlaySetting = serde_json::from_str("false").unwrap();
        assert!(!off.is_enabled());
        assert!(!off.shows_errors());
    }

    #[test]
    fn test_progress_setting_forms() {
        assert!(ProgressSetting::Enabled(true).is_enabled());
        assert!(!ProgressSetting::Enabled(false).is_enabled());
        assert!(ProgressSetting::Mode("force".to_string()).is_enabled());
    }

    #[test]
    fn test_validation() {
        assert!(RelayConfig::default().validate().is_ok());

        for bad in ["ws", "/", "/ws/", "/ws/{id}", ""] {
            let config = RelayConfig {
                path: bad.to_string(),
                ..RelayConfig::default()
            };
            assert!(config.validate().is_err(), "path {:?} should be rejected", bad);
        }

        assert!(RelayConfig {
            heartbeat_interval_ms: 0,
            ..RelayConfig::default()
        }
        .validate()
        .is_err());

        assert!(RelayConfig {
            allowed_hosts: AllowedHosts::list(["ok.test", " "]),
            ..RelayConfig::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_validate_root() {
        let temp = TempDir::new().unwrap();
        let config = RelayConfig {
            root: temp.path().to_path_buf(),
            ..RelayConfig::default()
        };
        assert!(config.validate_root().is_ok());

        let missing = RelayConfig {
            root: temp.path().join("missing"),
            ..RelayConfig::default()
        };
        assert!(missing.validate_root().is_err());
    }

    #[test]
    fn test_env_key_to_field() {
        assert_eq!(env_key_to_field("port"), "port");
        assert_eq!(env_key_to_field("live_reload"), "liveReload");
        assert_eq!(
            env_key_to_field("client.public_hostname"),
            "client.publicHostname"
        );
        assert_eq!(env_key_to_field("watch.debounce_ms"), "watch.debounceMs");
    }

    #[test]
    #[serial]
    fn test_load_defaults_without_file() {
        let temp = TempDir::new().unwrap();
        let config = RelayConfig::load(temp.path(), None, &ConfigOverrides::default()).unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    #[serial]
    fn test_load_json_file_then_cli_overrides() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("fob-relay.json"),
            r#"{
                "port": 9000,
                "transport": "polling",
                "allowedHosts": [".example.com"],
                "client": { "reconnect": 3, "publicHostname": "dev.example.com" }
            }"#,
        )
        .unwrap();

        let overrides = ConfigOverrides {
            port: Some(9100),
            ..ConfigOverrides::default()
        };
        let config = RelayConfig::load(temp.path(), None, &overrides).unwrap();

        assert_eq!(config.port, 9100);
        assert_eq!(config.transport, TransportKind::Polling);
        assert_eq!(config.allowed_hosts.entries(), [".example.com"]);
        assert_eq!(config.client.reconnect, Some(ReconnectBudget::Limited(3)));
        assert_eq!(
            config.client.public_hostname.as_deref(),
            Some("dev.example.com")
        );
    }

    #[test]
    #[serial]
    fn test_load_toml_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("relay.toml");
        fs::write(
            &path,
            "hot = true\nliveReload = false\n\n[client]\noverlay = { warnings = false }\n",
        )
        .unwrap();

        let config =
            RelayConfig::load(temp.path(), Some(Path::new("relay.toml")), &ConfigOverrides::default())
                .unwrap();
        assert!(config.hot);
        assert!(!config.live_reload);
        assert!(!config.client.overlay.unwrap().shows_warnings());
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("fob-relay.json"), r#"{ "port": 9000 }"#).unwrap();

        std::env::set_var("FOB_RELAY_PORT", "9200");
        std::env::set_var("FOB_RELAY_CLIENT__PUBLIC_HOSTNAME", "tunnel.test");
        let result = RelayConfig::load(temp.path(), None, &ConfigOverrides::default());
        std::env::remove_var("FOB_RELAY_PORT");
        std::env::remove_var("FOB_RELAY_CLIENT__PUBLIC_HOSTNAME");

        let config = result.unwrap();
        assert_eq!(config.port, 9200);
        assert_eq!(config.client.public_hostname.as_deref(), Some("tunnel.test"));
    }

    #[test]
    #[serial]
    fn test_unknown_transport_is_fatal() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("fob-relay.json"), r#"{ "transport": "sockjs" }"#).unwrap();

        let err = RelayConfig::load(temp.path(), None, &ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, RelayError::Config(ConfigError::Extract(_))));
    }

    #[test]
    #[serial]
    fn test_missing_explicit_config_file() {
        let temp = TempDir::new().unwrap();
        let err = RelayConfig::load(
            temp.path(),
            Some(Path::new("nope.json")),
            &ConfigOverrides::default(),
        )
        .unwrap_err();
        assert!(matches!(err, RelayError::Config(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_json_schema_mentions_fields() {
        let schema = RelayConfig::json_schema().to_string();
        assert!(schema.contains("allowedHosts"));
        assert!(schema.contains("heartbeatIntervalMs"));
    }

    #[test]
    fn test_server_url() {
        let config = RelayConfig {
            port: 3000,
            ..RelayConfig::default()
        };
        assert_eq!(config.server_url(), "http://127.0.0.1:3000");

        let v6 = RelayConfig {
            host: "::1".parse().unwrap(),
            port: 3000,
            ..RelayConfig::default()
        };
        assert_eq!(v6.server_url(), "http://[::1]:3000");
    }
}
