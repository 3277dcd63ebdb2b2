//! Identity provider types
//!
//! The identity provider owns these values; the application only reads them
//! and asks the provider to refresh the token.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::profile::Role;

/// Short-lived bearer token issued by the identity provider
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdToken {
    /// Encoded JWT
    pub value: String,
    /// Absolute expiration timestamp (UTC)
    pub expires_at: DateTime<Utc>,
}

impl IdToken {
    /// Create a token that expires `expires_in` seconds from now
    ///
    /// Out-of-range lifetimes saturate instead of overflowing.
    #[must_use]
    pub fn new(value: String, expires_in: i64) -> Self {
        Self { value, expires_at: seconds_from_now(expires_in) }
    }

    /// Check if the token is expired or will expire within the given threshold
    #[must_use]
    pub fn is_expired(&self, threshold_seconds: i64) -> bool {
        seconds_from_now(threshold_seconds) >= self.expires_at
    }

    /// Seconds until expiry (negative once expired)
    #[must_use]
    pub fn seconds_until_expiry(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds()
    }
}

fn seconds_from_now(seconds: i64) -> DateTime<Utc> {
    let now = Utc::now();
    chrono::Duration::try_seconds(seconds)
        .and_then(|offset| now.checked_add_signed(offset))
        .unwrap_or(if seconds < 0 { DateTime::<Utc>::MIN_UTC } else { DateTime::<Utc>::MAX_UTC })
}

impl fmt::Debug for IdToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// The identity provider's representation of a signed-in actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityPrincipal {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub token: IdToken,
}

/// Claims decoded from the identity token payload
///
/// Only the fields the session logic needs are typed; everything else is
/// kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(rename = "sub", default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(rename = "exp", default)]
    pub expires_at: Option<i64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl TokenClaims {
    /// Application role carried by the token, defaulting to [`Role::User`]
    #[must_use]
    pub fn role(&self) -> Role {
        Role::resolve(self.role.as_deref())
    }
}

/// Principal change notification published by the identity provider
///
/// `revision` increases by one on every change (sign-in, sign-out, token
/// refresh) so observers can tell stale notifications from fresh ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthNotification {
    pub revision: u64,
    pub principal: Option<IdentityPrincipal>,
}
