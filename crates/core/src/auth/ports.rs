//! Port interfaces for session synchronization
//!
//! These traits define the boundaries between the synchronizer and the
//! infrastructure adapters that talk to the identity provider and backend.

use async_trait::async_trait;
use homechef_domain::{
    AuthNotification, BackendProfile, IdentityPrincipal, RegistrationFields, Role, TokenClaims,
};
use tokio::sync::watch;

use super::errors::{BridgeError, IdentityError};

/// Result of a successful credential sign-in
#[derive(Debug, Clone, PartialEq)]
pub struct SignedIn {
    pub principal: IdentityPrincipal,
    /// Claims decoded from the freshly issued token
    pub claims: TokenClaims,
}

/// Trait for identity provider operations
///
/// Implementations publish an [`AuthNotification`] on every principal change
/// (sign-in, sign-up, sign-out, token refresh). The watch channel holds
/// `None` until the provider knows whether a session exists.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account, set its display metadata and return the refreshed
    /// principal
    ///
    /// # Errors
    /// `Credential` on malformed/duplicate email, `WeakPassword` on policy
    /// violation
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
        photo_url: Option<&str>,
    ) -> Result<IdentityPrincipal, IdentityError>;

    /// Sign in with email and password
    ///
    /// # Errors
    /// `InvalidCredentials` when the email/password pair is rejected
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, IdentityError>;

    /// Invalidate the local session
    ///
    /// # Errors
    /// Returns error if the local session could not be cleared
    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// Valid bearer token, refreshed if expired or when `force_refresh` is set
    ///
    /// # Errors
    /// `NotAuthenticated` if no principal is active
    async fn get_token(&self, force_refresh: bool) -> Result<String, IdentityError>;

    /// Claims of the current token
    ///
    /// # Errors
    /// `NotAuthenticated` if no principal is active, `Provider` if the token
    /// cannot be decoded
    async fn claims(&self) -> Result<TokenClaims, IdentityError>;

    /// Currently signed-in principal, if any
    fn current_principal(&self) -> Option<IdentityPrincipal>;

    /// Subscribe to principal change notifications
    fn subscribe(&self) -> watch::Receiver<Option<AuthNotification>>;

    /// Revision of the most recent notification
    fn revision(&self) -> u64;
}

/// Outcome of an idempotent profile upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureRegistered {
    Created,
    /// The backend already had a record; treated as success
    AlreadyExists,
    /// Any other failure; already logged by the bridge, never fatal
    Failed(BridgeError),
}

impl EnsureRegistered {
    /// Whether the profile is known to exist after the call
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        matches!(self, Self::Created | Self::AlreadyExists)
    }
}

/// Trait for the backend session bridge
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Post the identity token plus registration fields; the backend sets the
    /// session cookie and returns the created profile
    ///
    /// # Errors
    /// `Registration` when the backend rejects the request
    async fn exchange_and_register(
        &self,
        principal: &IdentityPrincipal,
        fields: &RegistrationFields,
    ) -> Result<BackendProfile, BridgeError>;

    /// Post the identity token to establish the session cookie
    ///
    /// # Errors
    /// `Login` when the token is rejected
    async fn login(&self, token: &str) -> Result<(), BridgeError>;

    /// Fetch the canonical profile; `Ok(None)` when the backend has no record
    ///
    /// # Errors
    /// Returns error on transport failures or unexpected statuses
    async fn fetch_profile(&self, token: &str) -> Result<Option<BackendProfile>, BridgeError>;

    /// Clear the backend session cookie
    ///
    /// # Errors
    /// Returns error if the backend could not be reached
    async fn logout(&self) -> Result<(), BridgeError>;

    /// Idempotent profile upsert; "already exists" counts as success
    async fn ensure_registered(
        &self,
        principal: &IdentityPrincipal,
        role_hint: Role,
    ) -> EnsureRegistered;
}
