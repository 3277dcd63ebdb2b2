//! Backend-owned user profile types
//!
//! The backend is the canonical store for role, status and address; these
//! types mirror its JSON shape.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Application role
///
/// Closed set. Raw claim or backend strings are resolved once, at the
/// boundary, via [`Role::parse`] / [`Role::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Standard customer account
    #[default]
    User,
    Chef,
    Admin,
}

impl Role {
    /// Parse a wire value; `None` for anything outside the closed set
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "chef" => Some(Self::Chef),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Resolve an optional raw role, defaulting to [`Role::User`]
    #[must_use]
    pub fn resolve(raw: Option<&str>) -> Self {
        raw.and_then(Self::parse).unwrap_or_default()
    }

    /// Wire representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Chef => "chef",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown role: {s}"))
    }
}

/// Account status flag maintained by admins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    /// Flagged by an admin; the backend restricts ordering for these accounts
    Fraud,
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "fraud" => Ok(Self::Fraud),
            other => Err(format!("unknown account status: {other}")),
        }
    }
}

/// Canonical application user record returned by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendProfile {
    /// Backend record id
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Identity provider id (foreign key to the principal)
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub role: Option<Role>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<AccountStatus>,
}

/// Optional registration fields sent alongside the identity token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationFields {
    pub name: Option<String>,
    pub address: Option<String>,
    pub profile_image: Option<String>,
    pub role_hint: Option<Role>,
}

/// Deserialize a `FromStr` value, mapping unknown strings (and nulls) to `None`
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| value.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_resolution() {
        assert_eq!(Role::resolve(Some("chef")), Role::Chef);
        assert_eq!(Role::resolve(Some(" ADMIN ")), Role::Admin);
        assert_eq!(Role::resolve(Some("superuser")), Role::User);
        assert_eq!(Role::resolve(None), Role::User);
        assert_eq!(Role::Chef.to_string(), "chef");
    }

    #[test]
    fn test_profile_deserializes_backend_shape() {
        let profile: BackendProfile = serde_json::from_str(
            r#"{
                "_id": "66f0",
                "uid": "abc",
                "email": "a@x.com",
                "name": "Ada",
                "profileImage": "https://img/ada.png",
                "address": "12 Oak St",
                "role": "chef",
                "status": "fraud",
                "createdAt": "2024-01-01"
            }"#,
        )
        .unwrap();

        assert_eq!(profile.id.as_deref(), Some("66f0"));
        assert_eq!(profile.profile_image.as_deref(), Some("https://img/ada.png"));
        assert_eq!(profile.role, Some(Role::Chef));
        assert_eq!(profile.status, Some(AccountStatus::Fraud));
    }

    #[test]
    fn test_profile_tolerates_unknown_role_and_missing_fields() {
        let profile: BackendProfile =
            serde_json::from_str(r#"{"email":"a@x.com","role":"owner","status":null}"#).unwrap();
        assert_eq!(profile.role, None);
        assert_eq!(profile.status, None);
        assert!(profile.address.is_none());
    }
}
