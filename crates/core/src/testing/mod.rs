//! In-memory port implementations
//!
//! Deterministic stand-ins for the identity provider and backend bridge, used
//! by the synchronizer tests and by downstream crates' tests.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod backend;
pub mod identity;

pub use backend::{BackendCall, LoginGate, MockSessionBackend};
pub use identity::MockIdentityProvider;

/// Uid a mock-issued token belongs to (`token-{uid}-{serial}`)
#[must_use]
pub fn uid_from_token(token: &str) -> Option<&str> {
    token.strip_prefix("token-").and_then(|rest| rest.rsplit_once('-')).map(|(uid, _)| uid)
}
