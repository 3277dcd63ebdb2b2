//! # HomeChef Infrastructure
//!
//! Infrastructure implementations of the core session ports.
//!
//! This crate contains:
//! - Retrying HTTP client with a shared cookie jar
//! - Backend session bridge (`/register`, `/login`, `/me`, `/logout`, `/users`)
//! - Identity provider adapter with token refresh and principal persistence
//! - Authorized backend API client
//! - Configuration loading and tracing initialisation
//! - [`AuthContext`], which wires everything together
//!
//! ## Architecture
//! - Implements traits defined in `homechef-core`
//! - Contains all "impure" code (network and file I/O)

pub mod api;
pub mod backend;
pub mod config;
pub mod context;
pub mod errors;
pub mod http;
pub mod identity;
pub mod observability;

pub use api::{ApiClient, ApiError};
pub use backend::BackendSessionBridge;
pub use context::AuthContext;
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use identity::{
    FilePrincipalStore, IdentityToolkitClient, MemoryPrincipalStore, PrincipalStore,
    StoredPrincipal,
};
pub use observability::{init_tracing, LogFormat};
