//! Scriptable identity provider

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use homechef_domain::{AuthNotification, IdToken, IdentityPrincipal, TokenClaims};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::auth::errors::IdentityError;
use crate::auth::ports::{IdentityProvider, SignedIn};

#[derive(Debug, Clone)]
struct Account {
    uid: String,
    password: String,
    role: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
}

#[derive(Debug, Default)]
struct Failures {
    sign_up: Option<IdentityError>,
    sign_in: Option<IdentityError>,
    sign_out: Option<IdentityError>,
    refresh: Option<IdentityError>,
}

#[derive(Debug, Default)]
struct IdentityState {
    accounts: HashMap<String, Account>,
    current: Option<IdentityPrincipal>,
    issued: u64,
    revision: u64,
    failures: Failures,
}

/// In-memory identity provider
///
/// Every principal change (sign-in, sign-up, sign-out, forced refresh) bumps
/// the revision and publishes a notification, as a real provider would.
#[derive(Debug)]
pub struct MockIdentityProvider {
    state: Mutex<IdentityState>,
    notifications: watch::Sender<Option<AuthNotification>>,
    sign_in_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        let (notifications, _) = watch::channel(None);
        Self {
            state: Mutex::new(IdentityState::default()),
            notifications,
            sign_in_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    /// Seed an account; `role` is the raw custom claim
    #[must_use]
    pub fn with_account(self, email: &str, password: &str, role: Option<&str>) -> Self {
        {
            let mut state = self.state.lock();
            let uid = format!("uid-{}", state.accounts.len() + 1);
            state.accounts.insert(
                email.to_string(),
                Account {
                    uid,
                    password: password.to_string(),
                    role: role.map(str::to_string),
                    display_name: None,
                    photo_url: None,
                },
            );
        }
        self
    }

    /// Change an account's role claim; takes effect on the next token
    pub fn set_role(&self, email: &str, role: Option<&str>) {
        if let Some(account) = self.state.lock().accounts.get_mut(email) {
            account.role = role.map(str::to_string);
        }
    }

    /// Report "no session" as a provider does once initialization finishes
    pub fn initialize_signed_out(&self) -> u64 {
        self.publish(None)
    }

    /// Sign `email` in without credentials, as a persisted session restored
    /// at startup
    pub fn restore_session(&self, email: &str) -> Option<IdentityPrincipal> {
        let principal = {
            let mut state = self.state.lock();
            let account = state.accounts.get(email)?.clone();
            let principal = issue(&mut state, email, &account);
            state.current = Some(principal.clone());
            principal
        };
        self.publish(Some(principal.clone()));
        Some(principal)
    }

    /// Publish an arbitrary notification; returns its revision
    pub fn emit(&self, principal: Option<IdentityPrincipal>) -> u64 {
        self.publish(principal)
    }

    pub fn fail_sign_up(&self, err: IdentityError) {
        self.state.lock().failures.sign_up = Some(err);
    }

    pub fn fail_sign_in(&self, err: IdentityError) {
        self.state.lock().failures.sign_in = Some(err);
    }

    pub fn fail_sign_out(&self, err: IdentityError) {
        self.state.lock().failures.sign_out = Some(err);
    }

    pub fn fail_token_refresh(&self, err: IdentityError) {
        self.state.lock().failures.refresh = Some(err);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures = Failures::default();
    }

    pub fn sign_in_calls(&self) -> usize {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn is_signed_in(&self) -> bool {
        self.state.lock().current.is_some()
    }

    fn publish(&self, principal: Option<IdentityPrincipal>) -> u64 {
        let revision = {
            let mut state = self.state.lock();
            state.revision += 1;
            state.revision
        };
        self.notifications.send_replace(Some(AuthNotification { revision, principal }));
        revision
    }
}

fn issue(state: &mut IdentityState, email: &str, account: &Account) -> IdentityPrincipal {
    state.issued += 1;
    IdentityPrincipal {
        uid: account.uid.clone(),
        email: email.to_string(),
        display_name: account.display_name.clone(),
        photo_url: account.photo_url.clone(),
        token: IdToken::new(format!("token-{}-{}", account.uid, state.issued), 3600),
    }
}

fn claims_for(principal: &IdentityPrincipal, role: Option<String>) -> TokenClaims {
    TokenClaims {
        subject: Some(principal.uid.clone()),
        email: Some(principal.email.clone()),
        role,
        expires_at: Some(principal.token.expires_at.timestamp()),
        ..TokenClaims::default()
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
        photo_url: Option<&str>,
    ) -> Result<IdentityPrincipal, IdentityError> {
        let principal = {
            let mut state = self.state.lock();
            if let Some(err) = state.failures.sign_up.clone() {
                return Err(err);
            }
            if state.accounts.contains_key(email) {
                return Err(IdentityError::Credential("email already in use".to_string()));
            }
            let account = Account {
                uid: format!("uid-{}", state.accounts.len() + 1),
                password: password.to_string(),
                role: None,
                display_name: display_name.map(str::to_string),
                photo_url: photo_url.map(str::to_string),
            };
            state.accounts.insert(email.to_string(), account.clone());
            let principal = issue(&mut state, email, &account);
            state.current = Some(principal.clone());
            principal
        };
        self.publish(Some(principal.clone()));
        Ok(principal)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, IdentityError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        let signed_in = {
            let mut state = self.state.lock();
            if let Some(err) = state.failures.sign_in.clone() {
                return Err(err);
            }
            let account = match state.accounts.get(email) {
                Some(account) if account.password == password => account.clone(),
                _ => return Err(IdentityError::InvalidCredentials),
            };
            let principal = issue(&mut state, email, &account);
            state.current = Some(principal.clone());
            SignedIn { claims: claims_for(&principal, account.role), principal }
        };
        self.publish(Some(signed_in.principal.clone()));
        Ok(signed_in)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.state.lock();
            if let Some(err) = state.failures.sign_out.clone() {
                return Err(err);
            }
            state.current = None;
        }
        self.publish(None);
        Ok(())
    }

    async fn get_token(&self, force_refresh: bool) -> Result<String, IdentityError> {
        if !force_refresh {
            return self
                .state
                .lock()
                .current
                .as_ref()
                .map(|principal| principal.token.value.clone())
                .ok_or(IdentityError::NotAuthenticated);
        }

        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let principal = {
            let mut state = self.state.lock();
            let current = state.current.clone().ok_or(IdentityError::NotAuthenticated)?;
            if let Some(err) = state.failures.refresh.clone() {
                return Err(err);
            }
            let account = state
                .accounts
                .get(&current.email)
                .cloned()
                .ok_or(IdentityError::NotAuthenticated)?;
            let principal = issue(&mut state, &current.email, &account);
            state.current = Some(principal.clone());
            principal
        };
        self.publish(Some(principal.clone()));
        Ok(principal.token.value)
    }

    async fn claims(&self) -> Result<TokenClaims, IdentityError> {
        let state = self.state.lock();
        let principal = state.current.as_ref().ok_or(IdentityError::NotAuthenticated)?;
        let role = state.accounts.get(&principal.email).and_then(|account| account.role.clone());
        Ok(claims_for(principal, role))
    }

    fn current_principal(&self) -> Option<IdentityPrincipal> {
        self.state.lock().current.clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<AuthNotification>> {
        self.notifications.subscribe()
    }

    fn revision(&self) -> u64 {
        self.state.lock().revision
    }
}
