//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Backend REST endpoints (relative to the configured base URL)
pub const BACKEND_REGISTER_PATH: &str = "/register";
pub const BACKEND_LOGIN_PATH: &str = "/login";
pub const BACKEND_ME_PATH: &str = "/me";
pub const BACKEND_LOGOUT_PATH: &str = "/logout";
pub const BACKEND_USERS_PATH: &str = "/users";

/// Legacy backend message signalling an idempotent upsert hit.
pub const USER_ALREADY_EXISTS_MESSAGE: &str = "User already exists";

// Front-end routes
pub const LOGIN_ROUTE: &str = "/login";
pub const REGISTER_ROUTE: &str = "/register";
pub const DASHBOARD_ROUTE: &str = "/dashboard";
pub const PROFILE_ROUTE: &str = "/dashboard/profile";

// Identity token handling
pub const ROLE_CLAIM: &str = "role";
pub const DEFAULT_REFRESH_THRESHOLD_SECS: i64 = 300;

// Form rules
pub const MIN_PASSWORD_LENGTH: usize = 6;
