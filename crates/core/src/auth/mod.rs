//! Session synchronization
//!
//! ```text
//! ┌──────────────────────┐
//! │ SessionSynchronizer  │  single writer of UnifiedSession
//! └──────────┬───────────┘
//!            │
//!            ├──► IdentityProvider   (sign-in/up/out, tokens, notifications)
//!            ├──► SessionBackend     (session cookie + canonical profile)
//!            └──► FlowGuard          (suppresses passive hydration during
//!                                     explicit login/register/logout)
//! ```
//!
//! - **[`ports`]**: traits implemented by the infrastructure adapters
//! - **[`errors`]**: identity, backend and flow error taxonomy
//! - **[`flow_guard`]**: explicit-flow marker and revision watermark
//! - **[`synchronizer`]**: the state machine itself

pub mod errors;
pub mod flow_guard;
pub mod ports;
pub mod synchronizer;
