//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Read a `.env` file if one exists (values already in the environment win)
//! 2. Build the configuration from `HOMECHEF_*` environment variables
//! 3. If the required variables are missing, probe for a config file
//!    (JSON or TOML, detected by extension)
//!
//! ## Environment Variables
//! - `HOMECHEF_IDENTITY_API_KEY` (required): identity project API key
//! - `HOMECHEF_IDENTITY_URL`: account endpoint base URL
//! - `HOMECHEF_TOKEN_URL`: token refresh endpoint base URL
//! - `HOMECHEF_REFRESH_THRESHOLD`: refresh this many seconds before expiry
//! - `HOMECHEF_BACKEND_URL` (required): backend base URL
//! - `HOMECHEF_BACKEND_TIMEOUT`: request timeout in seconds
//! - `HOMECHEF_BACKEND_MAX_ATTEMPTS`: attempts per backend request
//! - `HOMECHEF_LOGIN_PATH`: where anonymous visitors are sent
//! - `HOMECHEF_FALLBACK_PATH`: where role-check failures are sent
//! - `HOMECHEF_PRINCIPAL_STORE`: file that persists the signed-in principal
//!
//! ## File Locations
//! `config.{json,toml}` and `homechef.{json,toml}` in the working directory,
//! then `config.{json,toml}` up to two parent directories, then the same set
//! next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use homechef_domain::{
    BackendConfig, Config, HomeChefError, IdentityConfig, Result, SessionConfig,
};
use tracing::{debug, info};
use url::Url;

/// Upper bound for the refresh window (one day)
const MAX_REFRESH_THRESHOLD: i64 = 86_400;

/// Load configuration, environment first and config file second
///
/// # Errors
/// `HomeChefError::Config` if neither source yields a valid configuration.
pub fn load() -> Result<Config> {
    match dotenvy::dotenv() {
        Ok(path) => debug!(path = %path.display(), "loaded .env file"),
        Err(err) if err.not_found() => {}
        Err(err) => debug!(error = %err, "ignoring unreadable .env file"),
    }

    match load_from_env() {
        Ok(config) => {
            info!("configuration loaded from environment variables");
            Ok(config)
        }
        Err(err) => {
            debug!(error = %err, "environment incomplete, trying config file");
            load_from_file(None)
        }
    }
}

/// Build the configuration from `HOMECHEF_*` variables
///
/// Optional variables fall back to the `Config::default()` values.
///
/// # Errors
/// `HomeChefError::Config` if a required variable is missing or a numeric
/// value does not parse.
pub fn load_from_env() -> Result<Config> {
    let identity_defaults = IdentityConfig::default();
    let backend_defaults = BackendConfig::default();
    let session_defaults = SessionConfig::default();

    let identity = IdentityConfig {
        api_key: env_var("HOMECHEF_IDENTITY_API_KEY")?,
        identity_url: env_or("HOMECHEF_IDENTITY_URL", identity_defaults.identity_url),
        token_url: env_or("HOMECHEF_TOKEN_URL", identity_defaults.token_url),
        refresh_threshold_seconds: env_parse(
            "HOMECHEF_REFRESH_THRESHOLD",
            identity_defaults.refresh_threshold_seconds,
        )?,
    };

    let backend = BackendConfig {
        base_url: env_var("HOMECHEF_BACKEND_URL")?,
        timeout_seconds: env_parse("HOMECHEF_BACKEND_TIMEOUT", backend_defaults.timeout_seconds)?,
        max_attempts: env_parse("HOMECHEF_BACKEND_MAX_ATTEMPTS", backend_defaults.max_attempts)?,
    };

    let session = SessionConfig {
        login_path: env_or("HOMECHEF_LOGIN_PATH", session_defaults.login_path),
        fallback_path: env_or("HOMECHEF_FALLBACK_PATH", session_defaults.fallback_path),
        principal_store_path: std::env::var("HOMECHEF_PRINCIPAL_STORE").ok(),
    };

    validate(Config { identity, backend, session })
}

/// Load configuration from a file, probing standard locations when `path`
/// is `None`
///
/// # Errors
/// `HomeChefError::Config` if no file is found, it cannot be read, or its
/// contents are invalid.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(path) if path.exists() => path,
        Some(path) => {
            return Err(HomeChefError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        None => probe_config_paths().ok_or_else(|| {
            HomeChefError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    info!(path = %config_path.display(), "loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| HomeChefError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse by extension (`.json` or `.toml`)
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    let config: Config = match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| HomeChefError::Config(format!("Invalid TOML format: {e}")))?,
        "json" => serde_json::from_str(contents)
            .map_err(|e| HomeChefError::Config(format!("Invalid JSON format: {e}")))?,
        other => {
            return Err(HomeChefError::Config(format!("Unsupported config format: {other}")));
        }
    };

    validate(config)
}

/// Reject configurations that cannot reach either service
fn validate(config: Config) -> Result<Config> {
    if config.identity.api_key.trim().is_empty() {
        return Err(HomeChefError::Config("identity.api_key must not be empty".into()));
    }
    if !(0..=MAX_REFRESH_THRESHOLD).contains(&config.identity.refresh_threshold_seconds) {
        return Err(HomeChefError::Config(format!(
            "identity.refresh_threshold_seconds must be within 0..={MAX_REFRESH_THRESHOLD}"
        )));
    }
    for (field, value) in [
        ("identity.identity_url", &config.identity.identity_url),
        ("identity.token_url", &config.identity.token_url),
        ("backend.base_url", &config.backend.base_url),
    ] {
        let parsed = Url::parse(value)
            .map_err(|e| HomeChefError::Config(format!("{field} is not a valid URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(HomeChefError::Config(format!("{field} must use http or https")));
        }
    }
    Ok(config)
}

/// First existing config file among the standard locations
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidates_in(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidates_in(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidates_in(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("config.json"),
        dir.join("config.toml"),
        dir.join("homechef.json"),
        dir.join("homechef.toml"),
        dir.join("../config.json"),
        dir.join("../config.toml"),
        dir.join("../../config.json"),
        dir.join("../../config.toml"),
    ]
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| {
            HomeChefError::Config(format!("Missing required environment variable: {key}"))
        })
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty()).unwrap_or(default)
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| HomeChefError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(default),
    }
}
