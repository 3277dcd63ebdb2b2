//! Dashboard landing page selection

use homechef_domain::{Role, UnifiedSession};

/// Which dashboard the `/dashboard` index renders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardView {
    Loading,
    SignInPrompt,
    Admin,
    Chef,
    User,
}

impl DashboardView {
    #[must_use]
    pub const fn for_session(session: &UnifiedSession) -> Self {
        if session.is_loading() {
            return Self::Loading;
        }
        match session.role() {
            None => Self::SignInPrompt,
            Some(Role::Admin) => Self::Admin,
            Some(Role::Chef) => Self::Chef,
            Some(Role::User) => Self::User,
        }
    }
}
