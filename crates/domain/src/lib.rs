//! # HomeChef Domain
//!
//! Session and identity domain types for the HomeChef front end.
//!
//! This crate contains:
//! - Identity, backend profile and unified session types
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants (endpoints, routes, form rules)
//!
//! ## Architecture
//! - No dependencies on other HomeChef crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
