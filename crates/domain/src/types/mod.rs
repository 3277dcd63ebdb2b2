//! Domain data types
//!
//! - [`identity`]: identity-provider principal, bearer token, decoded claims
//! - [`profile`]: backend-owned user record, roles and account status
//! - [`session`]: merged session view consumed by guards and UI
//! - [`forms`]: login/registration input and its validation rules

pub mod forms;
pub mod identity;
pub mod profile;
pub mod session;

pub use forms::{FormError, LoginForm, RegistrationForm};
pub use identity::{AuthNotification, IdToken, IdentityPrincipal, TokenClaims};
pub use profile::{AccountStatus, BackendProfile, RegistrationFields, Role};
pub use session::{AuthPhase, SessionUser, UnifiedSession};
