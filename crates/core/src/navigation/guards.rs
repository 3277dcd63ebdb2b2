//! Route guards
//!
//! Pure predicates over [`UnifiedSession`]. Both guards suspend with
//! [`GuardDecision::Loading`] until the session settles so a protected page
//! never flashes for an unauthenticated visitor.

use homechef_domain::constants::{DASHBOARD_ROUTE, LOGIN_ROUTE, PROFILE_ROUTE, REGISTER_ROUTE};
use homechef_domain::{Role, SessionConfig, UnifiedSession};
use serde::{Deserialize, Serialize};

/// Navigation target produced by a guard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub to: String,
    /// Originally requested location, for returning after login
    pub from: Option<String>,
    /// Replace the current history entry instead of pushing
    pub replace: bool,
}

/// Outcome of evaluating a guard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "redirect", rename_all = "snake_case")]
pub enum GuardDecision {
    /// Session still resolving; show a placeholder
    Loading,
    Redirect(Redirect),
    Render,
}

impl GuardDecision {
    #[must_use]
    pub const fn is_render(&self) -> bool {
        matches!(self, Self::Render)
    }

    #[must_use]
    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            Self::Redirect(redirect) => Some(&redirect.to),
            _ => None,
        }
    }
}

/// Authentication and role guards with their redirect targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuards {
    login_path: String,
    fallback_path: String,
}

impl Default for RouteGuards {
    fn default() -> Self {
        Self { login_path: LOGIN_ROUTE.to_string(), fallback_path: PROFILE_ROUTE.to_string() }
    }
}

impl From<&SessionConfig> for RouteGuards {
    fn from(config: &SessionConfig) -> Self {
        Self::new(config.login_path.clone(), config.fallback_path.clone())
    }
}

impl RouteGuards {
    #[must_use]
    pub const fn new(login_path: String, fallback_path: String) -> Self {
        Self { login_path, fallback_path }
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn fallback_path(&self) -> &str {
        &self.fallback_path
    }

    /// Authentication guard
    ///
    /// Anonymous visitors go to the login entry point, carrying `requested`
    /// so login can send them back.
    #[must_use]
    pub fn require_authenticated(
        &self,
        session: &UnifiedSession,
        requested: &str,
    ) -> GuardDecision {
        if session.is_loading() {
            return GuardDecision::Loading;
        }
        if !session.is_authenticated() {
            return GuardDecision::Redirect(Redirect {
                to: self.login_path.clone(),
                from: Some(requested.to_string()),
                replace: true,
            });
        }
        GuardDecision::Render
    }

    /// Role guard
    ///
    /// Any role other than `required`, including no role at all, is sent to
    /// the neutral fallback page.
    #[must_use]
    pub fn require_role(&self, session: &UnifiedSession, required: Role) -> GuardDecision {
        if session.is_loading() {
            return GuardDecision::Loading;
        }
        if session.role() != Some(required) {
            return GuardDecision::Redirect(Redirect {
                to: self.fallback_path.clone(),
                from: None,
                replace: true,
            });
        }
        GuardDecision::Render
    }
}

/// Where to go after a successful login
///
/// Returns the preserved location when there is one, never bouncing back to
/// the auth pages themselves.
#[must_use]
pub fn post_login_destination(from: Option<&str>) -> String {
    match from.map(str::trim) {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !is_auth_page(path) =>
        {
            path.to_string()
        }
        _ => DASHBOARD_ROUTE.to_string(),
    }
}

fn is_auth_page(path: &str) -> bool {
    let bare = path.split(['?', '#']).next().unwrap_or(path).trim_end_matches('/');
    bare == LOGIN_ROUTE || bare == REGISTER_ROUTE
}

#[cfg(test)]
mod tests {
    use super::*;
    use homechef_domain::{AccountStatus, SessionUser};

    fn user() -> SessionUser {
        SessionUser {
            uid: "uid-1".to_string(),
            email: "a@x.com".to_string(),
            name: Some("A".to_string()),
            photo_url: None,
            address: None,
            profile_role: None,
            status: AccountStatus::Active,
            has_backend_profile: false,
        }
    }

    #[test]
    fn test_loading_suspends_both_guards() {
        let guards = RouteGuards::default();
        for session in [UnifiedSession::uninitialized(), UnifiedSession::hydrating(Some(user()))] {
            assert_eq!(
                guards.require_authenticated(&session, "/dashboard"),
                GuardDecision::Loading
            );
            assert_eq!(guards.require_role(&session, Role::Admin), GuardDecision::Loading);
        }
    }

    #[test]
    fn test_anonymous_redirects_to_login_preserving_location() {
        let guards = RouteGuards::default();
        let decision = guards.require_authenticated(&UnifiedSession::anonymous(), "/meals/42");

        assert_eq!(
            decision,
            GuardDecision::Redirect(Redirect {
                to: "/login".to_string(),
                from: Some("/meals/42".to_string()),
                replace: true,
            })
        );
    }

    #[test]
    fn test_role_mismatch_redirects_to_profile() {
        let guards = RouteGuards::default();
        let session = UnifiedSession::authenticated(user(), Role::User);

        assert!(guards.require_authenticated(&session, "/dashboard").is_render());
        assert_eq!(
            guards.require_role(&session, Role::Admin).redirect_target(),
            Some("/dashboard/profile")
        );
        assert_eq!(
            guards.require_role(&UnifiedSession::anonymous(), Role::Chef).redirect_target(),
            Some("/dashboard/profile")
        );
    }

    #[test]
    fn test_matching_role_renders() {
        let guards = RouteGuards::default();
        let session = UnifiedSession::authenticated(user(), Role::Chef);
        assert_eq!(guards.require_role(&session, Role::Chef), GuardDecision::Render);
    }

    #[test]
    fn test_configured_paths() {
        let config = SessionConfig {
            login_path: "/sign-in".to_string(),
            fallback_path: "/home".to_string(),
            principal_store_path: None,
        };
        let guards = RouteGuards::from(&config);

        assert_eq!(
            guards.require_authenticated(&UnifiedSession::anonymous(), "/x").redirect_target(),
            Some("/sign-in")
        );
        assert_eq!(guards.fallback_path(), "/home");
    }

    #[test]
    fn test_post_login_destination() {
        assert_eq!(post_login_destination(None), "/dashboard");
        assert_eq!(post_login_destination(Some("/meals/7")), "/meals/7");
        assert_eq!(post_login_destination(Some("/login")), "/dashboard");
        assert_eq!(post_login_destination(Some("/register?ref=x")), "/dashboard");
        assert_eq!(post_login_destination(Some("https://evil.example")), "/dashboard");
        assert_eq!(post_login_destination(Some("//evil.example")), "/dashboard");
    }
}
