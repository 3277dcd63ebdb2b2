//! Configuration management

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_REFRESH_THRESHOLD_SECS, LOGIN_ROUTE, PROFILE_ROUTE};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub identity: IdentityConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Identity provider configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Public web API key of the identity project
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Base URL of the account endpoints (`/v1/accounts:*`)
    #[serde(default = "default_identity_url")]
    pub identity_url: String,
    /// Base URL of the token refresh endpoint (`/v1/token`)
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// Refresh the bearer token this many seconds before it expires
    #[serde(default = "default_refresh_threshold")]
    pub refresh_threshold_seconds: i64,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("api_key", &"<redacted>")
            .field("identity_url", &self.identity_url)
            .field("token_url", &self.token_url)
            .field("refresh_threshold_seconds", &self.refresh_threshold_seconds)
            .finish()
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            identity_url: default_identity_url(),
            token_url: default_token_url(),
            refresh_threshold_seconds: default_refresh_threshold(),
        }
    }
}

/// Backend REST API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Total attempts per request (initial try + retries)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_seconds: default_timeout(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Session and navigation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Entry point anonymous visitors are sent to
    #[serde(default = "default_login_path")]
    pub login_path: String,
    /// Neutral authenticated page used when a role check fails
    #[serde(default = "default_fallback_path")]
    pub fallback_path: String,
    /// Where the signed-in principal is persisted between runs
    #[serde(default)]
    pub principal_store_path: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            fallback_path: default_fallback_path(),
            principal_store_path: None,
        }
    }
}

fn default_identity_url() -> String {
    "https://identitytoolkit.googleapis.com".to_string()
}

fn default_token_url() -> String {
    "https://securetoken.googleapis.com".to_string()
}

const fn default_refresh_threshold() -> i64 {
    DEFAULT_REFRESH_THRESHOLD_SECS
}

const fn default_timeout() -> u64 {
    30
}

const fn default_max_attempts() -> usize {
    1
}

fn default_login_path() -> String {
    LOGIN_ROUTE.to_string()
}

fn default_fallback_path() -> String {
    PROFILE_ROUTE.to_string()
}
