//! Errors for authorized backend calls
//!
//! Classifies failures so callers can decide whether to retry, re-authenticate
//! or show the backend's message.

use homechef_core::IdentityError;
use homechef_domain::HomeChefError;
use reqwest::StatusCode;
use thiserror::Error;

/// Categories of API errors for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// 401/403; retry after re-authenticating
    Authentication,
    /// 429
    RateLimit,
    /// 5xx
    Server,
    /// Other 4xx and undecodable responses
    Client,
    Network,
    Config,
}

/// Authorized API call failures
///
/// Status-derived variants carry the backend's `error` message (or
/// `"Request failed"` when it sent none), ready to show to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Request rejected: {0}")]
    Client(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// Map a non-2xx status and its user-facing message
    #[must_use]
    pub fn from_status(status: StatusCode, message: String) -> Self {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Self::Auth(message)
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            Self::RateLimit(message)
        } else if status.is_server_error() {
            Self::Server(message)
        } else if status.is_client_error() {
            Self::Client(message)
        } else {
            Self::Network(message)
        }
    }

    #[must_use]
    pub const fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Auth(_) => ApiErrorCategory::Authentication,
            Self::RateLimit(_) => ApiErrorCategory::RateLimit,
            Self::Server(_) => ApiErrorCategory::Server,
            Self::Client(_) => ApiErrorCategory::Client,
            Self::Network(_) => ApiErrorCategory::Network,
            Self::Config(_) => ApiErrorCategory::Config,
        }
    }

    #[must_use]
    pub const fn should_retry(&self) -> bool {
        matches!(
            self.category(),
            ApiErrorCategory::RateLimit | ApiErrorCategory::Server | ApiErrorCategory::Network
        )
    }

    /// Message without the category prefix
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Auth(message)
            | Self::RateLimit(message)
            | Self::Server(message)
            | Self::Client(message)
            | Self::Network(message)
            | Self::Config(message) => message,
        }
    }
}

impl From<HomeChefError> for ApiError {
    fn from(err: HomeChefError) -> Self {
        match err {
            HomeChefError::Network(message) => Self::Network(message),
            HomeChefError::Config(message) => Self::Config(message),
            HomeChefError::NotFound(message) | HomeChefError::InvalidInput(message) => {
                Self::Client(message)
            }
            HomeChefError::Storage(message) | HomeChefError::Internal(message) => {
                Self::Server(message)
            }
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Network(message) => Self::Network(message),
            other => Self::Auth(other.to_string()),
        }
    }
}
