//! # HomeChef Core
//!
//! Pure session logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for the identity provider and backend bridge
//! - The session synchronizer state machine
//! - Route guards, the route table and dashboard selection
//! - In-memory port implementations for tests
//!
//! ## Architecture Principles
//! - Only depends on `homechef-domain`
//! - No HTTP or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod auth;
pub mod navigation;
pub mod testing;

// Re-export specific items to avoid ambiguity
pub use auth::errors::{AuthError, BridgeError, FlowFailure, IdentityError};
pub use auth::flow_guard::{FlowGuard, FlowKind, FlowTicket, Suppression};
pub use auth::ports::{EnsureRegistered, IdentityProvider, SessionBackend, SignedIn};
pub use auth::synchronizer::{
    AuthenticatedUser, NotificationOutcome, SessionSynchronizer, SyncHandle,
};
pub use navigation::dashboard::DashboardView;
pub use navigation::guards::{post_login_destination, GuardDecision, Redirect, RouteGuards};
pub use navigation::routes::{Access, Route, RouteTable};
