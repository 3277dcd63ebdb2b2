//! Unified session view
//!
//! `UnifiedSession` is what guards and UI read. It is written only by the
//! session synchronizer.

use serde::{Deserialize, Serialize};

use super::identity::IdentityPrincipal;
use super::profile::{AccountStatus, BackendProfile, Role};

/// Merged user record: identity fields overlaid with backend fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Identity provider id; never taken from the backend
    pub uid: String,
    pub email: String,
    pub name: Option<String>,
    pub photo_url: Option<String>,
    pub address: Option<String>,
    /// Role recorded in the backend profile, if any
    pub profile_role: Option<Role>,
    pub status: AccountStatus,
    /// Whether a backend profile contributed to this record
    pub has_backend_profile: bool,
}

impl SessionUser {
    /// Merge an identity principal with an optional backend profile.
    ///
    /// Precedence rules:
    /// - `uid` always comes from the principal
    /// - `email`, `name`, `photo_url` take the backend value when the backend
    ///   supplies one, else the principal's
    /// - `address`, `profile_role`, `status` exist only on the backend side;
    ///   `status` defaults to active
    #[must_use]
    pub fn merge(principal: &IdentityPrincipal, profile: Option<&BackendProfile>) -> Self {
        let Some(profile) = profile else {
            return Self::from_principal(principal);
        };

        Self {
            uid: principal.uid.clone(),
            email: profile.email.clone().unwrap_or_else(|| principal.email.clone()),
            name: profile.name.clone().or_else(|| principal.display_name.clone()),
            photo_url: profile.profile_image.clone().or_else(|| principal.photo_url.clone()),
            address: profile.address.clone(),
            profile_role: profile.role,
            status: profile.status.unwrap_or_default(),
            has_backend_profile: true,
        }
    }

    /// Identity-only record used when the backend profile is unavailable
    #[must_use]
    pub fn from_principal(principal: &IdentityPrincipal) -> Self {
        Self {
            uid: principal.uid.clone(),
            email: principal.email.clone(),
            name: principal.display_name.clone(),
            photo_url: principal.photo_url.clone(),
            address: None,
            profile_role: None,
            status: AccountStatus::Active,
            has_backend_profile: false,
        }
    }
}

/// Synchronizer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "phase", content = "role", rename_all = "snake_case")]
pub enum AuthPhase {
    /// Nothing is known yet (before the first provider notification)
    #[default]
    Uninitialized,
    /// A session is being resolved; navigation decisions are suspended
    Hydrating,
    Authenticated(Role),
    Anonymous,
}

/// Application-facing session view
///
/// Constructed only through the phase constructors so that an authenticated
/// session always carries both a user and a role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiedSession {
    phase: AuthPhase,
    user: Option<SessionUser>,
}

impl UnifiedSession {
    /// Initial state before the identity provider has reported anything
    #[must_use]
    pub fn uninitialized() -> Self {
        Self::default()
    }

    /// Hydrating, keeping whatever user was shown before (possibly stale)
    #[must_use]
    pub fn hydrating(previous_user: Option<SessionUser>) -> Self {
        Self { phase: AuthPhase::Hydrating, user: previous_user }
    }

    #[must_use]
    pub const fn authenticated(user: SessionUser, role: Role) -> Self {
        Self { phase: AuthPhase::Authenticated(role), user: Some(user) }
    }

    #[must_use]
    pub const fn anonymous() -> Self {
        Self { phase: AuthPhase::Anonymous, user: None }
    }

    #[must_use]
    pub const fn phase(&self) -> AuthPhase {
        self.phase
    }

    #[must_use]
    pub const fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    /// Resolved role; `Some` exactly when authenticated
    #[must_use]
    pub const fn role(&self) -> Option<Role> {
        match self.phase {
            AuthPhase::Authenticated(role) => Some(role),
            _ => None,
        }
    }

    /// Whether guards should suspend their decision
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self.phase, AuthPhase::Uninitialized | AuthPhase::Hydrating)
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.phase, AuthPhase::Authenticated(_))
    }
}
