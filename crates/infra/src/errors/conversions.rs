//! Conversions from external infrastructure errors into domain errors.

use std::io::Error as IoError;

use homechef_core::{BridgeError, IdentityError};
use homechef_domain::HomeChefError;
use reqwest::Error as HttpError;
use serde_json::Error as JsonError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub HomeChefError);

impl From<InfraError> for HomeChefError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<HomeChefError> for InfraError {
    fn from(value: HomeChefError) -> Self {
        Self(value)
    }
}

trait IntoHomeChefError {
    fn into_homechef(self) -> HomeChefError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → HomeChefError */
/* -------------------------------------------------------------------------- */

impl IntoHomeChefError for HttpError {
    fn into_homechef(self) -> HomeChefError {
        if self.is_timeout() {
            return HomeChefError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return HomeChefError::Network("HTTP connection failure".into());
        }

        if self.is_builder() {
            return HomeChefError::InvalidInput(format!("invalid HTTP request: {self}"));
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                404 => HomeChefError::NotFound(message),
                400..=499 => HomeChefError::InvalidInput(message),
                _ => HomeChefError::Network(message),
            };
        }

        HomeChefError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        Self(value.into_homechef())
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error / serde_json::Error → HomeChefError */
/* -------------------------------------------------------------------------- */

impl IntoHomeChefError for IoError {
    fn into_homechef(self) -> HomeChefError {
        match self.kind() {
            std::io::ErrorKind::NotFound => HomeChefError::NotFound(self.to_string()),
            _ => HomeChefError::Storage(self.to_string()),
        }
    }
}

impl From<IoError> for InfraError {
    fn from(value: IoError) -> Self {
        Self(value.into_homechef())
    }
}

impl From<JsonError> for InfraError {
    fn from(value: JsonError) -> Self {
        Self(HomeChefError::Storage(format!("invalid JSON: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* HomeChefError → port errors */
/* -------------------------------------------------------------------------- */

impl From<InfraError> for BridgeError {
    fn from(value: InfraError) -> Self {
        match value.0 {
            HomeChefError::Network(message) => Self::Network(message),
            other => Self::Decode(other.to_string()),
        }
    }
}

impl From<InfraError> for IdentityError {
    fn from(value: InfraError) -> Self {
        match value.0 {
            HomeChefError::Network(message) => Self::Network(message),
            other => Self::Provider(other.to_string()),
        }
    }
}
