//! Authorized access to the HomeChef backend
//!
//! Every request carries the current identity bearer token (when signed in)
//! and the backend session cookie; failures surface the backend's `error`
//! message.

pub mod client;
pub mod errors;

pub use client::ApiClient;
pub use errors::{ApiError, ApiErrorCategory};
