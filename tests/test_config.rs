use std::collections::HashMap;
use std::io::Write;

use portcullis::config::{Config, ConfigError};

fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::load_from(|key| vars.get(key).cloned())
}

#[test]
fn test_config_defaults() {
    let cfg = load(&[]).unwrap();

    assert_eq!(cfg.listen_addr(), "0.0.0.0:3000");
    assert_eq!(cfg.auth.username, "admin");
    assert_eq!(cfg.auth.password, "admin");
    assert!(cfg.auth.is_default());
    assert!(cfg.upstream.default_origin.is_none());
    assert_eq!(cfg.upstream.connect_timeout_secs, 10);
    assert_eq!(cfg.upstream.response_timeout_secs, 30);
}

#[test]
fn test_config_env_overrides() {
    let cfg = load(&[
        ("PORT", "8081"),
        ("PROXY_USERNAME", "alice"),
        ("PROXY_PASSWORD", "s3cret"),
        ("PROXY_ORIGIN", "http://10.0.0.5:9000"),
        ("PROXY_RESPONSE_TIMEOUT_SECS", "5"),
    ])
    .unwrap();

    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.auth.username, "alice");
    assert_eq!(cfg.auth.password, "s3cret");
    assert!(!cfg.auth.is_default());
    assert_eq!(cfg.upstream.default_origin.as_deref(), Some("http://10.0.0.5:9000"));
    assert_eq!(cfg.upstream.response_timeout().as_secs(), 5);
}

#[test]
fn test_config_empty_env_values_keep_defaults() {
    let cfg = load(&[
        ("PORT", ""),
        ("PROXY_USERNAME", ""),
        ("PROXY_PASSWORD", ""),
        ("PROXY_ORIGIN", ""),
        ("PROXY_CONFIG", ""),
    ])
    .unwrap();

    assert_eq!(cfg.server.port, 3000);
    assert_eq!(cfg.auth.username, "admin");
    assert_eq!(cfg.auth.password, "admin");
    assert!(cfg.upstream.default_origin.is_none());
}

#[test]
fn test_config_invalid_port() {
    let err = load(&[("PORT", "not-a-port")]).unwrap_err();

    assert!(matches!(err, ConfigError::InvalidValue { key: "PORT", .. }));
}

#[test]
fn test_config_from_yaml_partial() {
    let cfg = Config::from_yaml(
        "server:\n  port: 4000\nupstream:\n  default_origin: http://backend:8080\n",
    )
    .unwrap();

    assert_eq!(cfg.server.port, 4000);
    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.auth.username, "admin");
    assert_eq!(cfg.upstream.default_origin.as_deref(), Some("http://backend:8080"));
}

#[test]
fn test_config_file_then_env() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "auth:\n  username: fromfile\n  password: filepass\nserver:\n  port: 5000").unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let cfg = load(&[("PROXY_CONFIG", &path), ("PROXY_PASSWORD", "envpass")]).unwrap();

    assert_eq!(cfg.auth.username, "fromfile");
    assert_eq!(cfg.auth.password, "envpass");
    assert_eq!(cfg.server.port, 5000);
}

#[test]
fn test_config_missing_file() {
    let err = load(&[("PROXY_CONFIG", "/nonexistent/portcullis.yaml")]).unwrap_err();

    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_config_debug_redacts_password() {
    let cfg = load(&[("PROXY_PASSWORD", "topsecret")]).unwrap();

    assert!(!format!("{:?}", cfg).contains("topsecret"));
}
