use std::collections::HashMap;

use catnip_core::config::LogFormat;
use catnip_core::prelude::*;

fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn test_defaults_when_nothing_is_set() {
    let config = Config::from_lookup(|_| None);

    assert_eq!(config.server_host, "0.0.0.0");
    assert_eq!(config.server_port, 8000);
    assert_eq!(config.environment, "development");
    assert_eq!(config.max_body_size, 2 * 1024 * 1024);
    assert_eq!(config.log_format, LogFormat::Text);
    assert!(config.is_dev());
    assert_eq!(config.server_addr(), "0.0.0.0:8000");
}

#[test]
fn test_values_are_read_from_lookup() {
    let config = Config::from_lookup(lookup_from(&[
        ("SERVER_HOST", "127.0.0.1"),
        ("SERVER_PORT", "3000"),
        ("ENVIRONMENT", "production"),
        ("MAX_BODY_SIZE", "1024"),
        ("LOG_FORMAT", "json"),
    ]));

    assert_eq!(config.server_addr(), "127.0.0.1:3000");
    assert!(!config.is_dev());
    assert_eq!(config.max_body_size, 1024);
    assert_eq!(config.log_format, LogFormat::Json);
}

#[test]
fn test_unparseable_values_fall_back() {
    let config = Config::from_lookup(lookup_from(&[
        ("SERVER_PORT", "eighty"),
        ("MAX_BODY_SIZE", "-1"),
        ("LOG_FORMAT", "xml"),
    ]));

    assert_eq!(config.server_port, 8000);
    assert_eq!(config.max_body_size, 2 * 1024 * 1024);
    assert_eq!(config.log_format, LogFormat::Text);
}

#[test]
fn test_log_format_parsing() {
    assert_eq!("text".parse::<LogFormat>(), Ok(LogFormat::Text));
    assert_eq!("plain".parse::<LogFormat>(), Ok(LogFormat::Text));
    assert_eq!(" Pretty ".parse::<LogFormat>(), Ok(LogFormat::Pretty));
    assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
    assert!("yaml".parse::<LogFormat>().is_err());
}

#[test]
fn test_config_deserializes_with_defaults() {
    let config: Config =
        serde_json::from_str(r#"{"server_port": 9000, "log_format": "pretty"}"#).unwrap();

    assert_eq!(config.server_port, 9000);
    assert_eq!(config.log_format, LogFormat::Pretty);
    assert_eq!(config.server_host, "0.0.0.0");
}

#[test]
fn test_app_keeps_its_config() {
    let config = Config {
        environment: "test".to_string(),
        ..Config::default()
    };
    let app = App::with_config(config);

    assert_eq!(app.config().environment, "test");
    assert!(!app.config().is_dev());
}
