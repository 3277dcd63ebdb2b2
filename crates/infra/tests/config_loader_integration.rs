//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::path::PathBuf;

use homechef_domain::HomeChefError;
use homechef_infra::config;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_config_from_json_file() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "homechef.json",
        r#"{
            "identity": {
                "api_key": "json-key",
                "refresh_threshold_seconds": 120
            },
            "backend": {
                "base_url": "https://api.homechef.test",
                "timeout_seconds": 10,
                "max_attempts": 2
            },
            "session": {
                "login_path": "/signin",
                "principal_store_path": "/var/lib/homechef/session.json"
            }
        }"#,
    );

    let config = config::load_from_file(Some(path)).unwrap();

    assert_eq!(config.identity.api_key, "json-key");
    assert_eq!(config.identity.refresh_threshold_seconds, 120);
    assert_eq!(config.identity.token_url, "https://securetoken.googleapis.com");
    assert_eq!(config.backend.base_url, "https://api.homechef.test");
    assert_eq!(config.backend.max_attempts, 2);
    assert_eq!(config.session.login_path, "/signin");
    assert_eq!(config.session.fallback_path, "/dashboard/profile");
    assert_eq!(
        config.session.principal_store_path.as_deref(),
        Some("/var/lib/homechef/session.json")
    );
}

#[test]
fn test_load_config_from_toml_file() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "config.toml",
        r#"
[identity]
api_key = "toml-key"
identity_url = "http://localhost:9099/identitytoolkit.googleapis.com"
token_url = "http://localhost:9099/securetoken.googleapis.com"

[backend]
base_url = "http://localhost:3000"
"#,
    );

    let config = config::load_from_file(Some(path)).unwrap();

    assert_eq!(config.identity.api_key, "toml-key");
    assert!(config.identity.identity_url.starts_with("http://localhost:9099"));
    assert_eq!(config.backend.timeout_seconds, 30);
    assert_eq!(config.backend.max_attempts, 1);
    assert!(config.session.principal_store_path.is_none());
}

#[test]
fn test_api_key_is_not_written_back() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "config.json",
        r#"{"identity":{"api_key":"secret"},"backend":{"base_url":"http://localhost:3000"}}"#,
    );

    let config = config::load_from_file(Some(path)).unwrap();
    let rendered = serde_json::to_string(&config).unwrap();

    assert!(!rendered.contains("secret"));
    assert!(!format!("{config:?}").contains("secret"));
}

#[test]
fn test_missing_backend_section_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "config.json", r#"{"identity":{"api_key":"k"}}"#);

    let err = config::load_from_file(Some(path)).unwrap_err();
    assert!(matches!(err, HomeChefError::Config(_)));
}

#[test]
fn test_invalid_toml_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "config.toml", "[identity\napi_key = ");

    let err = config::load_from_file(Some(path)).unwrap_err();
    assert!(matches!(err, HomeChefError::Config(ref msg) if msg.contains("TOML")));
}

#[test]
fn test_missing_file_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let err = config::load_from_file(Some(dir.path().join("absent.json"))).unwrap_err();
    assert!(matches!(err, HomeChefError::Config(ref msg) if msg.contains("not found")));
}
