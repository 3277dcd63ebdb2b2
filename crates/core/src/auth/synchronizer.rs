//! Session synchronizer - the auth state machine
//!
//! Single writer of [`UnifiedSession`]. Two kinds of input drive it:
//!
//! - passive: identity provider notifications (restored session, sign-in
//!   elsewhere, token refresh, sign-out), handled by
//!   [`SessionSynchronizer::handle_notification`]
//! - explicit: [`SessionSynchronizer::login`], [`SessionSynchronizer::register`]
//!   and [`SessionSynchronizer::logout`], serialized against each other and
//!   guarded by a [`FlowGuard`] so notifications they cause cannot overwrite
//!   their result
//!
//! States: `Uninitialized → Hydrating → Authenticated(role) | Anonymous`.

use std::sync::Arc;

use homechef_domain::{
    AuthNotification, AuthPhase, BackendProfile, IdentityPrincipal, LoginForm, RegistrationForm,
    Role, SessionUser, TokenClaims, UnifiedSession,
};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::errors::{AuthError, FlowFailure, IdentityError};
use super::flow_guard::{FlowGuard, FlowKind, Suppression};
use super::ports::{EnsureRegistered, IdentityProvider, SessionBackend, SignedIn};

/// Merged user and role returned to the caller of an explicit flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user: SessionUser,
    pub role: Role,
}

/// What a provider notification did to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// No state change
    Suppressed(Suppression),
    Anonymous,
    Authenticated(Role),
    /// Hydration finished after an explicit flow took over; result dropped
    Discarded,
}

/// Handle to the background notification listener
#[derive(Debug)]
pub struct SyncHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Stop listening and wait for the listener task to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.task.await {
            error!(error = %err, "session listener task panicked");
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Auth state machine merging identity provider and backend sessions
pub struct SessionSynchronizer {
    identity: Arc<dyn IdentityProvider>,
    backend: Arc<dyn SessionBackend>,
    guard: FlowGuard,
    flows: Mutex<()>,
    session: watch::Sender<UnifiedSession>,
}

impl SessionSynchronizer {
    /// Create a synchronizer in the `Uninitialized` state
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityProvider>, backend: Arc<dyn SessionBackend>) -> Self {
        let (session, _) = watch::channel(UnifiedSession::uninitialized());
        Self { identity, backend, guard: FlowGuard::new(), flows: Mutex::new(()), session }
    }

    /// Current session snapshot
    #[must_use]
    pub fn session(&self) -> UnifiedSession {
        self.session.borrow().clone()
    }

    /// Reactive view for guards and UI
    #[must_use]
    pub fn watch_session(&self) -> watch::Receiver<UnifiedSession> {
        self.session.subscribe()
    }

    #[must_use]
    pub const fn guard(&self) -> &FlowGuard {
        &self.guard
    }

    /// Move to `Hydrating` and start following identity notifications
    pub fn start(self: &Arc<Self>) -> SyncHandle {
        self.session.send_if_modified(|session| {
            if session.phase() == AuthPhase::Uninitialized {
                *session = UnifiedSession::hydrating(None);
                true
            } else {
                false
            }
        });

        let cancel = CancellationToken::new();
        let receiver = self.identity.subscribe();
        let this = Arc::clone(self);
        let token = cancel.clone();
        let task = tokio::spawn(async move { this.listen(receiver, token).await });

        SyncHandle { cancel, task }
    }

    async fn listen(
        &self,
        mut receiver: watch::Receiver<Option<AuthNotification>>,
        cancel: CancellationToken,
    ) {
        info!("session synchronizer following identity notifications");
        loop {
            let latest = receiver.borrow_and_update().clone();
            if let Some(notification) = latest {
                self.handle_notification(notification).await;
            }

            tokio::select! {
                () = cancel.cancelled() => break,
                changed = receiver.changed() => {
                    if changed.is_err() {
                        debug!("identity provider closed its notification channel");
                        break;
                    }
                }
            }
        }
        info!("session synchronizer stopped");
    }

    /// Apply one identity provider notification (passive path)
    ///
    /// Backend failures here never surface: the session degrades to
    /// identity-only data so a transient outage does not log the user out.
    pub async fn handle_notification(&self, notification: AuthNotification) -> NotificationOutcome {
        let AuthNotification { revision, principal } = notification;

        if let Some(reason) = self.guard.suppression(revision) {
            debug!(revision, ?reason, "identity notification suppressed");
            return NotificationOutcome::Suppressed(reason);
        }

        let Some(principal) = principal else {
            self.guard.advance_watermark(revision);
            self.publish(UnifiedSession::anonymous());
            return NotificationOutcome::Anonymous;
        };

        self.guard.advance_watermark(revision);
        self.hydrate(principal).await
    }

    async fn hydrate(&self, principal: IdentityPrincipal) -> NotificationOutcome {
        let epoch = self.guard.epoch();
        let before = self.session();
        self.publish(UnifiedSession::hydrating(before.user().cloned()));

        let token = match self.identity.get_token(true).await {
            Ok(token) => token,
            Err(IdentityError::NotAuthenticated) => {
                warn!(uid = %principal.uid, "principal vanished during hydration");
                return self.commit_passive(epoch, &before, None);
            }
            Err(err) => {
                error!(uid = %principal.uid, error = %err, "token refresh failed during hydration");
                let role = self.current_role().await;
                let user = SessionUser::from_principal(&principal);
                return self.commit_passive(epoch, &before, Some((user, role)));
            }
        };
        // The forced refresh published its own notification
        self.guard.advance_watermark(self.identity.revision());

        let role = self.current_role().await;
        let profile = self.fetch_profile_or_degrade(&principal, &token).await;
        let user = SessionUser::merge(&principal, profile.as_ref());

        self.commit_passive(epoch, &before, Some((user, role)))
    }

    fn commit_passive(
        &self,
        epoch: u64,
        before: &UnifiedSession,
        resolved: Option<(SessionUser, Role)>,
    ) -> NotificationOutcome {
        if self.guard.epoch() != epoch || self.guard.in_flight().is_some() {
            debug!("explicit auth flow took over; dropping hydration result");
            let restore = before.clone();
            self.session.send_if_modified(|session| {
                if session.phase() == AuthPhase::Hydrating {
                    *session = restore;
                    true
                } else {
                    false
                }
            });
            return NotificationOutcome::Discarded;
        }

        match resolved {
            Some((user, role)) => {
                self.publish(UnifiedSession::authenticated(user, role));
                NotificationOutcome::Authenticated(role)
            }
            None => {
                self.publish(UnifiedSession::anonymous());
                NotificationOutcome::Anonymous
            }
        }
    }

    /// Explicit login
    ///
    /// Identity sign-in, backend session, profile merge, idempotent upsert,
    /// then commit. On failure the session is left exactly as it was.
    ///
    /// # Errors
    /// `InvalidForm` before any network call, `LoginFailed` if the identity
    /// provider or the backend session exchange rejects the attempt
    #[instrument(skip_all)]
    pub async fn login(&self, form: &LoginForm) -> Result<AuthenticatedUser, AuthError> {
        form.validate().map_err(AuthError::InvalidForm)?;

        let _serial = self.flows.lock().await;
        let ticket = self.guard.begin(FlowKind::Login);
        let result = self.run_login(form.email.trim(), &form.password).await;
        ticket.complete(self.identity.revision());

        match result {
            Ok(authenticated) => {
                info!(uid = %authenticated.user.uid, role = %authenticated.role, "login succeeded");
                Ok(authenticated)
            }
            Err(failure) => {
                warn!(error = %failure, "login failed");
                Err(AuthError::LoginFailed(failure))
            }
        }
    }

    async fn run_login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthenticatedUser, FlowFailure> {
        let SignedIn { principal, claims } = self.identity.sign_in(email, password).await?;
        let role = role_from_claims(&claims);
        let token = principal.token.value.clone();

        if let Err(err) = self.backend.login(&token).await {
            self.roll_back_identity(&principal).await;
            return Err(err.into());
        }

        let profile = self.fetch_profile_or_degrade(&principal, &token).await;
        self.ensure_registered(&principal, role).await;

        let user = SessionUser::merge(&principal, profile.as_ref());
        self.publish(UnifiedSession::authenticated(user.clone(), role));
        Ok(AuthenticatedUser { user, role })
    }

    /// Explicit registration
    ///
    /// A rejected backend registration is not fatal: the session falls back to
    /// identity data and the upsert still runs.
    ///
    /// # Errors
    /// `InvalidForm` before any network call, `RegistrationFailed` if the
    /// identity provider rejects the account or its token cannot be refreshed
    #[instrument(skip_all)]
    pub async fn register(&self, form: &RegistrationForm) -> Result<AuthenticatedUser, AuthError> {
        form.validate().map_err(AuthError::InvalidForm)?;

        let _serial = self.flows.lock().await;
        let ticket = self.guard.begin(FlowKind::Register);
        let result = self.run_register(form).await;
        ticket.complete(self.identity.revision());

        match result {
            Ok(authenticated) => {
                info!(
                    uid = %authenticated.user.uid,
                    role = %authenticated.role,
                    "registration succeeded"
                );
                Ok(authenticated)
            }
            Err(failure) => {
                warn!(error = %failure, "registration failed");
                Err(AuthError::RegistrationFailed(failure))
            }
        }
    }

    async fn run_register(
        &self,
        form: &RegistrationForm,
    ) -> Result<AuthenticatedUser, FlowFailure> {
        let fields = form.fields();
        let signed_up = self
            .identity
            .sign_up(
                form.email.trim(),
                &form.password,
                fields.name.as_deref(),
                fields.profile_image.as_deref(),
            )
            .await?;

        if let Err(err) = self.identity.get_token(true).await {
            self.roll_back_identity(&signed_up).await;
            return Err(err.into());
        }
        let principal = self.identity.current_principal().unwrap_or(signed_up);
        let role = match fields.role_hint {
            Some(requested) => requested,
            None => self.current_role().await,
        };

        let profile = match self.backend.exchange_and_register(&principal, &fields).await {
            Ok(profile) => Some(profile),
            Err(err) => {
                warn!(
                    uid = %principal.uid,
                    error = %err,
                    "backend registration failed; continuing with identity data"
                );
                None
            }
        };
        self.ensure_registered(&principal, role).await;

        let user = SessionUser::merge(&principal, profile.as_ref());
        self.publish(UnifiedSession::authenticated(user.clone(), role));
        Ok(AuthenticatedUser { user, role })
    }

    /// Explicit logout
    ///
    /// Always ends `Anonymous`; identity and backend failures are logged only.
    #[instrument(skip_all)]
    pub async fn logout(&self) {
        let _serial = self.flows.lock().await;
        let ticket = self.guard.begin(FlowKind::Logout);

        if let Err(err) = self.identity.sign_out().await {
            error!(error = %err, "identity sign-out failed");
        }
        self.publish(UnifiedSession::anonymous());

        if let Err(err) = self.backend.logout().await {
            warn!(error = %err, "backend logout failed; local session already cleared");
        }

        ticket.complete(self.identity.revision());
        info!("logged out");
    }

    async fn current_role(&self) -> Role {
        match self.identity.claims().await {
            Ok(claims) => role_from_claims(&claims),
            Err(err) => {
                warn!(error = %err, "could not read token claims; defaulting role");
                Role::default()
            }
        }
    }

    async fn fetch_profile_or_degrade(
        &self,
        principal: &IdentityPrincipal,
        token: &str,
    ) -> Option<BackendProfile> {
        match self.backend.fetch_profile(token).await {
            Ok(Some(profile)) => Some(profile),
            Ok(None) => {
                debug!(uid = %principal.uid, "backend has no profile yet");
                None
            }
            Err(err) => {
                warn!(
                    uid = %principal.uid,
                    error = %err,
                    "backend profile sync failed, using identity data"
                );
                None
            }
        }
    }

    async fn ensure_registered(&self, principal: &IdentityPrincipal, role_hint: Role) {
        match self.backend.ensure_registered(principal, role_hint).await {
            EnsureRegistered::Created => debug!(uid = %principal.uid, "backend profile created"),
            EnsureRegistered::AlreadyExists => {
                debug!(uid = %principal.uid, "backend profile already exists");
            }
            EnsureRegistered::Failed(_) => {}
        }
    }

    /// Undo an identity sign-in whose flow failed later on
    ///
    /// Skipped when the session already belongs to the same principal, so a
    /// failed re-login does not sign out a working session. A session held by
    /// a different user was replaced at the provider by the sign-in, so once
    /// it is rolled back the session goes `Anonymous`.
    async fn roll_back_identity(&self, principal: &IdentityPrincipal) {
        let session = self.session();
        if session.user().is_some_and(|user| user.uid == principal.uid) {
            return;
        }
        if let Err(err) = self.identity.sign_out().await {
            error!(uid = %principal.uid, error = %err, "could not roll back identity sign-in");
            return;
        }
        if let Some(previous) = session.user() {
            warn!(uid = %previous.uid, "previous user lost its identity session; signing out");
            self.publish(UnifiedSession::anonymous());
        }
    }

    fn publish(&self, next: UnifiedSession) {
        let phase = next.phase();
        let previous = self.session.send_replace(next);
        if previous.phase() != phase {
            info!(from = ?previous.phase(), to = ?phase, "session transition");
        }
    }
}

impl std::fmt::Debug for SessionSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSynchronizer")
            .field("phase", &self.session.borrow().phase())
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

fn role_from_claims(claims: &TokenClaims) -> Role {
    if let Some(raw) = claims.role.as_deref() {
        if Role::parse(raw).is_none() {
            warn!(claim = raw, "unknown role claim; defaulting to user");
        }
    }
    claims.role()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockIdentityProvider, MockSessionBackend};

    fn synchronizer() -> (Arc<MockIdentityProvider>, Arc<MockSessionBackend>, SessionSynchronizer)
    {
        let identity = Arc::new(MockIdentityProvider::new());
        let backend = Arc::new(MockSessionBackend::new());
        let sync = SessionSynchronizer::new(identity.clone(), backend.clone());
        (identity, backend, sync)
    }

    #[tokio::test]
    async fn test_starts_uninitialized() {
        let (_, _, sync) = synchronizer();
        assert_eq!(sync.session().phase(), AuthPhase::Uninitialized);
        assert!(sync.session().is_loading());
    }

    #[tokio::test]
    async fn test_empty_notification_goes_anonymous() {
        let (_, _, sync) = synchronizer();
        let outcome =
            sync.handle_notification(AuthNotification { revision: 1, principal: None }).await;
        assert_eq!(outcome, NotificationOutcome::Anonymous);
        assert_eq!(sync.session().phase(), AuthPhase::Anonymous);
    }

    #[tokio::test]
    async fn test_login_rejects_invalid_form_without_network() {
        let (identity, _, sync) = synchronizer();
        let err = sync.login(&LoginForm::new("", "123")).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidForm(_)));
        assert_eq!(identity.sign_in_calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_role_claim_resolves_to_user() {
        let claims = TokenClaims { role: Some("owner".to_string()), ..Default::default() };
        assert_eq!(role_from_claims(&claims), Role::User);
    }
}
