//! Application route table
//!
//! Access level per route pattern. Patterns use `:name` for a single dynamic
//! segment. Paths that match no pattern are public (they render the 404 page).

use homechef_domain::{Role, UnifiedSession};

use super::guards::{GuardDecision, RouteGuards};

/// Who may render a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    /// Authenticated with exactly this role
    Role(Role),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub pattern: &'static str,
    pub access: Access,
}

impl Route {
    #[must_use]
    pub const fn new(pattern: &'static str, access: Access) -> Self {
        Self { pattern, access }
    }

    /// Segment-wise match; `:param` matches any non-empty segment
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        let mut expected = segments(self.pattern);
        let mut actual = segments(path);
        loop {
            match (expected.next(), actual.next()) {
                (None, None) => return true,
                (Some(pattern), Some(segment)) => {
                    if !(pattern.starts_with(':') || pattern == segment) {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    #[must_use]
    pub const fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// The HomeChef application routes
    #[must_use]
    pub fn standard() -> Self {
        use Access::{Authenticated, Public};

        Self::new(vec![
            Route::new("/", Public),
            Route::new("/meals", Public),
            Route::new("/meals/:id", Authenticated),
            Route::new("/reviews", Public),
            Route::new("/favorites", Public),
            Route::new("/login", Public),
            Route::new("/register", Public),
            Route::new("/payment-success", Public),
            Route::new("/dashboard", Authenticated),
            Route::new("/dashboard/profile", Authenticated),
            Route::new("/dashboard/orders", Authenticated),
            Route::new("/dashboard/favorites", Authenticated),
            Route::new("/dashboard/my-review", Authenticated),
            Route::new("/dashboard/order/:id", Authenticated),
            Route::new("/dashboard/create-meal", Access::Role(Role::Chef)),
            Route::new("/dashboard/my-meals", Access::Role(Role::Chef)),
            Route::new("/dashboard/order-requests", Access::Role(Role::Chef)),
            Route::new("/dashboard/manage-users", Access::Role(Role::Admin)),
            Route::new("/dashboard/manage-requests", Access::Role(Role::Admin)),
            Route::new("/dashboard/statistics", Access::Role(Role::Admin)),
        ])
    }

    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// First route matching `path`, ignoring query string and fragment
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<&Route> {
        let bare = path.split(['?', '#']).next().unwrap_or(path);
        self.routes.iter().find(|route| route.matches(bare))
    }

    #[must_use]
    pub fn access(&self, path: &str) -> Access {
        self.resolve(path).map_or(Access::Public, |route| route.access)
    }

    /// Run the guards a route requires
    ///
    /// Role routes sit inside the authenticated area, so the authentication
    /// guard runs first and anonymous visitors still land on login.
    #[must_use]
    pub fn evaluate(
        &self,
        session: &UnifiedSession,
        path: &str,
        guards: &RouteGuards,
    ) -> GuardDecision {
        match self.access(path) {
            Access::Public => GuardDecision::Render,
            Access::Authenticated => guards.require_authenticated(session, path),
            Access::Role(role) => match guards.require_authenticated(session, path) {
                GuardDecision::Render => guards.require_role(session, role),
                decision => decision,
            },
        }
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::standard()
    }
}
