//! Identity provider adapter
//!
//! - **[`toolkit`]**: REST client implementing `IdentityProvider`
//! - **[`claims`]**: JWT payload decoding
//! - **[`store`]**: persisted principal between runs

pub mod claims;
pub mod store;
pub mod toolkit;

pub use claims::decode_claims;
pub use store::{FilePrincipalStore, MemoryPrincipalStore, PrincipalStore, StoredPrincipal};
pub use toolkit::{AutoRefreshHandle, IdentityToolkitClient};
