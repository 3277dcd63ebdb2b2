//! Navigation gating over the unified session
//!
//! - **[`guards`]**: authentication and role guards, post-login destination
//! - **[`routes`]**: the application's route table and per-route access
//! - **[`dashboard`]**: role-based dashboard selection

pub mod dashboard;
pub mod guards;
pub mod routes;
