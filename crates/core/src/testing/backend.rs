//! Scriptable backend session bridge

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use homechef_domain::{AccountStatus, BackendProfile, IdentityPrincipal, RegistrationFields, Role};
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::uid_from_token;
use crate::auth::errors::BridgeError;
use crate::auth::ports::{EnsureRegistered, SessionBackend};

/// Recorded backend interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Register { uid: String },
    Login { token: String },
    FetchProfile { token: String },
    Logout,
    EnsureRegistered { uid: String, role: Role },
}

/// Pauses one `login` call until the test releases it
#[derive(Debug, Default)]
pub struct LoginGate {
    entered: Notify,
    release: Notify,
}

impl LoginGate {
    /// Wait until the held login call has started
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[derive(Debug, Default)]
struct Failures {
    register: Option<BridgeError>,
    login: Option<BridgeError>,
    fetch: Option<BridgeError>,
    logout: Option<BridgeError>,
    upsert: Option<BridgeError>,
}

#[derive(Debug, Default)]
struct BackendState {
    profiles: HashMap<String, BackendProfile>,
    registered: HashSet<String>,
    calls: Vec<BackendCall>,
    failures: Failures,
    login_gate: Option<Arc<LoginGate>>,
}

/// In-memory backend keyed by the uid embedded in mock tokens
#[derive(Debug, Default)]
pub struct MockSessionBackend {
    state: Mutex<BackendState>,
}

impl MockSessionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a stored profile for `uid`
    #[must_use]
    pub fn with_profile(self, uid: &str, profile: BackendProfile) -> Self {
        {
            let mut state = self.state.lock();
            state.profiles.insert(uid.to_string(), profile);
            state.registered.insert(uid.to_string());
        }
        self
    }

    pub fn fail_register(&self, err: BridgeError) {
        self.state.lock().failures.register = Some(err);
    }

    pub fn fail_login(&self, err: BridgeError) {
        self.state.lock().failures.login = Some(err);
    }

    pub fn fail_fetch(&self, err: BridgeError) {
        self.state.lock().failures.fetch = Some(err);
    }

    pub fn fail_logout(&self, err: BridgeError) {
        self.state.lock().failures.logout = Some(err);
    }

    pub fn fail_upsert(&self, err: BridgeError) {
        self.state.lock().failures.upsert = Some(err);
    }

    /// Hold the next `login` call until [`LoginGate::release`]
    pub fn hold_next_login(&self) -> Arc<LoginGate> {
        let gate = Arc::new(LoginGate::default());
        self.state.lock().login_gate = Some(Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().calls.clone()
    }

    pub fn profile(&self, uid: &str) -> Option<BackendProfile> {
        self.state.lock().profiles.get(uid).cloned()
    }

    pub fn is_registered(&self, uid: &str) -> bool {
        self.state.lock().registered.contains(uid)
    }

    fn record(&self, call: BackendCall) {
        self.state.lock().calls.push(call);
    }
}

#[async_trait]
impl SessionBackend for MockSessionBackend {
    async fn exchange_and_register(
        &self,
        principal: &IdentityPrincipal,
        fields: &RegistrationFields,
    ) -> Result<BackendProfile, BridgeError> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::Register { uid: principal.uid.clone() });
        if let Some(err) = state.failures.register.clone() {
            return Err(err);
        }

        let profile = BackendProfile {
            id: Some(format!("db-{}", principal.uid)),
            uid: Some(principal.uid.clone()),
            email: Some(principal.email.clone()),
            name: fields.name.clone(),
            profile_image: fields.profile_image.clone(),
            address: fields.address.clone(),
            role: Some(Role::User),
            status: Some(AccountStatus::Active),
        };
        state.profiles.insert(principal.uid.clone(), profile.clone());
        state.registered.insert(principal.uid.clone());
        Ok(profile)
    }

    async fn login(&self, token: &str) -> Result<(), BridgeError> {
        let gate = {
            let mut state = self.state.lock();
            state.calls.push(BackendCall::Login { token: token.to_string() });
            state.login_gate.take()
        };
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        match self.state.lock().failures.login.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn fetch_profile(&self, token: &str) -> Result<Option<BackendProfile>, BridgeError> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::FetchProfile { token: token.to_string() });
        if let Some(err) = state.failures.fetch.clone() {
            return Err(err);
        }
        Ok(uid_from_token(token).and_then(|uid| state.profiles.get(uid).cloned()))
    }

    async fn logout(&self) -> Result<(), BridgeError> {
        self.record(BackendCall::Logout);
        match self.state.lock().failures.logout.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn ensure_registered(
        &self,
        principal: &IdentityPrincipal,
        role_hint: Role,
    ) -> EnsureRegistered {
        let mut state = self.state.lock();
        state
            .calls
            .push(BackendCall::EnsureRegistered { uid: principal.uid.clone(), role: role_hint });
        if let Some(err) = state.failures.upsert.clone() {
            return EnsureRegistered::Failed(err);
        }
        if !state.registered.insert(principal.uid.clone()) {
            return EnsureRegistered::AlreadyExists;
        }
        state.profiles.entry(principal.uid.clone()).or_insert_with(|| BackendProfile {
            uid: Some(principal.uid.clone()),
            email: Some(principal.email.clone()),
            name: principal.display_name.clone(),
            profile_image: principal.photo_url.clone(),
            role: Some(role_hint),
            status: Some(AccountStatus::Active),
            ..BackendProfile::default()
        });
        EnsureRegistered::Created
    }
}
