//! Email/password identity provider over the Identity Toolkit REST API
//!
//! Endpoints (all keyed by the project's public API key):
//! - `POST {identity_url}/v1/accounts:signUp`
//! - `POST {identity_url}/v1/accounts:signInWithPassword`
//! - `POST {identity_url}/v1/accounts:update`
//! - `POST {identity_url}/v1/accounts:lookup`
//! - `POST {token_url}/v1/token` (refresh-token grant)
//!
//! Every principal change bumps the revision and publishes an
//! [`AuthNotification`]; the watch channel holds `None` until
//! [`IdentityToolkitClient::initialize`] has run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use homechef_core::{IdentityError, IdentityProvider, SignedIn};
use homechef_domain::{
    AuthNotification, HomeChefError, IdToken, IdentityConfig, IdentityPrincipal, TokenClaims,
};
use parking_lot::{Mutex, RwLock};
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::claims::decode_claims;
use super::store::{PrincipalStore, StoredPrincipal};
use crate::errors::InfraError;
use crate::http::HttpClient;

/// Back-off after a failed background refresh
const REFRESH_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Shortest sleep between two background refresh checks
const MIN_REFRESH_WAIT: Duration = Duration::from_secs(1);

/// Longest token lifetime accepted from the provider (one day)
const MAX_EXPIRES_IN: i64 = 86_400;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest<'a> {
    id_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    photo_url: Option<&'a str>,
    return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

/// Shared shape of the sign-up, sign-in and update responses
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Seconds, encoded as a string
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

/// Refresh failures that end the session
const SESSION_ENDING_CODES: &[&str] =
    &["TOKEN_EXPIRED", "INVALID_REFRESH_TOKEN", "USER_NOT_FOUND", "USER_DISABLED"];

/// Map a provider error message (`CODE` or `CODE : detail`) to the taxonomy
fn map_provider_error(message: &str) -> IdentityError {
    let (code, detail) = match message.split_once(" : ") {
        Some((code, detail)) => (code.trim(), detail.trim()),
        None => (message.trim(), ""),
    };

    match code {
        "EMAIL_EXISTS" => IdentityError::Credential("email already in use".to_string()),
        "INVALID_EMAIL" | "MISSING_EMAIL" => {
            IdentityError::Credential("invalid email address".to_string())
        }
        "WEAK_PASSWORD" | "MISSING_PASSWORD" => IdentityError::WeakPassword(if detail.is_empty() {
            "password does not meet the policy".to_string()
        } else {
            detail.to_string()
        }),
        "INVALID_PASSWORD" | "EMAIL_NOT_FOUND" | "INVALID_LOGIN_CREDENTIALS" => {
            IdentityError::InvalidCredentials
        }
        "USER_DISABLED" => IdentityError::AccountDisabled,
        "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "INVALID_ID_TOKEN" | "USER_NOT_FOUND"
        | "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" => IdentityError::NotAuthenticated,
        _ => IdentityError::Provider(message.to_string()),
    }
}

fn parse_expires_in(raw: Option<&str>) -> i64 {
    raw.and_then(|value| value.parse::<i64>().ok())
        .map_or(3600, |seconds| seconds.clamp(0, MAX_EXPIRES_IN))
}

#[derive(Debug, Clone)]
struct ActiveSession {
    principal: IdentityPrincipal,
    refresh_token: String,
    /// When this client received the token
    issued_at: DateTime<Utc>,
}

impl ActiveSession {
    fn new(principal: IdentityPrincipal, refresh_token: String) -> Self {
        Self { principal, refresh_token, issued_at: Utc::now() }
    }

    fn stored(&self) -> StoredPrincipal {
        StoredPrincipal {
            principal: self.principal.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }

    /// Refresh window in milliseconds, never more than half the token lifetime
    fn refresh_window_ms(&self, threshold_seconds: i64) -> i64 {
        let lifetime = (self.principal.token.expires_at - self.issued_at).num_milliseconds();
        threshold_seconds.saturating_mul(1000).clamp(0, lifetime.max(0) / 2)
    }

    fn remaining_ms(&self) -> i64 {
        (self.principal.token.expires_at - Utc::now()).num_milliseconds()
    }

    fn needs_refresh(&self, threshold_seconds: i64) -> bool {
        self.remaining_ms() <= self.refresh_window_ms(threshold_seconds)
    }
}

/// Identity provider adapter for email/password accounts
pub struct IdentityToolkitClient {
    http: HttpClient,
    config: IdentityConfig,
    store: Arc<dyn PrincipalStore>,
    session: RwLock<Option<ActiveSession>>,
    /// Serializes token refreshes so concurrent callers share one round trip
    refresh_lock: tokio::sync::Mutex<()>,
    revision: Mutex<u64>,
    notifications: watch::Sender<Option<AuthNotification>>,
}

impl std::fmt::Debug for IdentityToolkitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityToolkitClient")
            .field("config", &self.config)
            .field("signed_in", &self.session.read().is_some())
            .field("revision", &*self.revision.lock())
            .finish_non_exhaustive()
    }
}

impl IdentityToolkitClient {
    #[must_use]
    pub fn new(config: IdentityConfig, http: HttpClient, store: Arc<dyn PrincipalStore>) -> Self {
        let (notifications, _) = watch::channel(None);
        Self {
            http,
            config,
            store,
            session: RwLock::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
            revision: Mutex::new(0),
            notifications,
        }
    }

    /// Build with a dedicated HTTP client (no cookie jar)
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn from_config(
        config: IdentityConfig,
        store: Arc<dyn PrincipalStore>,
    ) -> Result<Self, HomeChefError> {
        let http = HttpClient::builder().cookie_store(false).max_attempts(2).build()?;
        Ok(Self::new(config, http, store))
    }

    /// Restore a persisted session and publish the first notification
    ///
    /// Publishes `None` when nothing was persisted (or the store is
    /// unreadable), which is what lets observers leave their loading state.
    pub async fn initialize(&self) -> Option<IdentityPrincipal> {
        let restored = match self.store.load().await {
            Ok(restored) => restored,
            Err(err) => {
                warn!(error = %err, "could not read persisted principal; starting signed out");
                None
            }
        };

        let principal = restored.map(|stored| {
            let principal = stored.principal.clone();
            *self.session.write() =
                Some(ActiveSession::new(stored.principal, stored.refresh_token));
            principal
        });

        match &principal {
            Some(principal) => info!(uid = %principal.uid, "restored persisted identity session"),
            None => info!("no persisted identity session"),
        }
        self.publish(principal.clone());
        principal
    }

    /// Refresh the token shortly before it expires, until cancelled
    pub fn start_auto_refresh(self: &Arc<Self>) -> AutoRefreshHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let this = Arc::clone(self);
        let task = tokio::spawn(async move { this.auto_refresh(token).await });
        AutoRefreshHandle { cancel, task }
    }

    async fn auto_refresh(&self, cancel: CancellationToken) {
        let mut receiver = self.notifications.subscribe();
        loop {
            let wait = self.next_refresh_in();
            tokio::select! {
                () = cancel.cancelled() => break,
                changed = receiver.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = sleep_for(wait) => {
                    match self.get_token(false).await {
                        Ok(_) | Err(IdentityError::NotAuthenticated) => {}
                        Err(err) => {
                            warn!(error = %err, "background token refresh failed");
                            tokio::select! {
                                () = cancel.cancelled() => break,
                                () = tokio::time::sleep(REFRESH_RETRY_DELAY) => {}
                            }
                        }
                    }
                }
            }
        }
        debug!("token auto-refresh stopped");
    }

    /// Time until the current token enters the refresh window
    fn next_refresh_in(&self) -> Option<Duration> {
        let session = self.session.read();
        let session = session.as_ref()?;
        let window_ms = session.refresh_window_ms(self.config.refresh_threshold_seconds);
        let wait_ms = session.remaining_ms() - window_ms;
        let wait = Duration::from_millis(u64::try_from(wait_ms).unwrap_or(0));
        Some(wait.max(MIN_REFRESH_WAIT))
    }

    fn account_url(&self, action: &str) -> String {
        format!(
            "{}/v1/accounts:{}?key={}",
            self.config.identity_url.trim_end_matches('/'),
            action,
            self.config.api_key
        )
    }

    fn token_url(&self) -> String {
        format!(
            "{}/v1/token?key={}",
            self.config.token_url.trim_end_matches('/'),
            self.config.api_key
        )
    }

    async fn post_json<B, R>(&self, url: String, body: &B) -> Result<R, IdentityError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let request = self.http.request(Method::POST, url).json(body);
        let response = self.http.send(request).await.map_err(transport)?;
        read_response(response).await
    }

    fn publish(&self, principal: Option<IdentityPrincipal>) -> u64 {
        let mut revision = self.revision.lock();
        *revision += 1;
        let current = *revision;
        self.notifications.send_replace(Some(AuthNotification { revision: current, principal }));
        debug!(revision = current, "identity notification published");
        current
    }

    /// Install a new session, persist it and notify
    async fn activate(&self, session: ActiveSession) -> IdentityPrincipal {
        if let Err(err) = self.store.save(&session.stored()).await {
            warn!(uid = %session.principal.uid, error = %err, "could not persist identity session");
        }
        let principal = session.principal.clone();
        *self.session.write() = Some(session);
        self.publish(Some(principal.clone()));
        principal
    }

    async fn deactivate(&self) {
        self.session.write().take();
        if let Err(err) = self.store.clear().await {
            warn!(error = %err, "could not clear persisted identity session");
        }
        self.publish(None);
    }

    fn session_from_account(
        account: AccountResponse,
        fallback_email: &str,
    ) -> Result<ActiveSession, IdentityError> {
        let (Some(id_token), Some(refresh_token)) = (account.id_token, account.refresh_token) else {
            return Err(IdentityError::Provider("response is missing tokens".to_string()));
        };
        let principal = IdentityPrincipal {
            uid: account.local_id,
            email: account.email.unwrap_or_else(|| fallback_email.to_string()),
            display_name: account.display_name.filter(|name| !name.is_empty()),
            photo_url: account.photo_url.filter(|url| !url.is_empty()),
            token: IdToken::new(id_token, parse_expires_in(account.expires_in.as_deref())),
        };
        Ok(ActiveSession::new(principal, refresh_token))
    }

    async fn refresh(&self) -> Result<String, IdentityError> {
        let refresh_token = self
            .session
            .read()
            .as_ref()
            .map(|session| session.refresh_token.clone())
            .ok_or(IdentityError::NotAuthenticated)?;

        let request = self
            .http
            .request(Method::POST, self.token_url())
            .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token.as_str())]);
        let response = self.http.send(request).await.map_err(transport)?;

        let refreshed: RefreshResponse = match read_response_with_code(response).await {
            Ok(refreshed) => refreshed,
            Err((err, code)) => {
                if code.as_deref().is_some_and(|code| SESSION_ENDING_CODES.contains(&code)) {
                    warn!(error = %err, "refresh token rejected; signing out locally");
                    self.deactivate().await;
                }
                return Err(err);
            }
        };

        let next = {
            let guard = self.session.read();
            let Some(current) = guard.as_ref() else {
                return Err(IdentityError::NotAuthenticated);
            };
            let principal = IdentityPrincipal {
                token: IdToken::new(
                    refreshed.id_token,
                    parse_expires_in(Some(&refreshed.expires_in)),
                ),
                ..current.principal.clone()
            };
            ActiveSession::new(principal, refreshed.refresh_token)
        };
        let principal = self.activate(next).await;
        debug!(uid = %principal.uid, "identity token refreshed");
        Ok(principal.token.value)
    }

    /// Display metadata from `accounts:lookup`
    async fn lookup(&self, id_token: &str) -> Result<Option<LookupUser>, IdentityError> {
        let response: LookupResponse =
            self.post_json(self.account_url("lookup"), &LookupRequest { id_token }).await?;
        Ok(response.users.into_iter().next())
    }
}

#[async_trait]
impl IdentityProvider for IdentityToolkitClient {
    #[instrument(skip_all)]
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
        photo_url: Option<&str>,
    ) -> Result<IdentityPrincipal, IdentityError> {
        let created: AccountResponse = self
            .post_json(
                self.account_url("signUp"),
                &PasswordRequest { email, password, return_secure_token: true },
            )
            .await?;
        let mut session = Self::session_from_account(created, email)?;
        info!(uid = %session.principal.uid, "identity account created");

        if display_name.is_some() || photo_url.is_some() {
            let update = UpdateProfileRequest {
                id_token: &session.principal.token.value,
                display_name,
                photo_url,
                return_secure_token: true,
            };
            match self.post_json::<_, AccountResponse>(self.account_url("update"), &update).await {
                Ok(updated) => {
                    let display_name = updated.display_name.clone();
                    let photo_url = updated.photo_url.clone();
                    if updated.id_token.is_some() && updated.refresh_token.is_some() {
                        session = Self::session_from_account(updated, email)?;
                    }
                    session.principal.display_name = display_name.filter(|n| !n.is_empty());
                    session.principal.photo_url = photo_url.filter(|u| !u.is_empty());
                }
                Err(err) => {
                    warn!(
                        uid = %session.principal.uid,
                        error = %err,
                        "could not set display metadata"
                    );
                }
            }
        }

        Ok(self.activate(session).await)
    }

    #[instrument(skip_all)]
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, IdentityError> {
        let account: AccountResponse = self
            .post_json(
                self.account_url("signInWithPassword"),
                &PasswordRequest { email, password, return_secure_token: true },
            )
            .await?;
        let mut session = Self::session_from_account(account, email)?;

        if session.principal.photo_url.is_none() {
            match self.lookup(&session.principal.token.value).await {
                Ok(Some(user)) => {
                    session.principal.photo_url = user.photo_url.filter(|u| !u.is_empty());
                    if session.principal.display_name.is_none() {
                        session.principal.display_name =
                            user.display_name.filter(|n| !n.is_empty());
                    }
                }
                Ok(None) => {}
                Err(err) => debug!(error = %err, "account lookup failed; continuing without photo"),
            }
        }

        let claims = decode_claims(&session.principal.token.value)?;
        let principal = self.activate(session).await;
        info!(uid = %principal.uid, "identity sign-in succeeded");
        Ok(SignedIn { principal, claims })
    }

    #[instrument(skip_all)]
    async fn sign_out(&self) -> Result<(), IdentityError> {
        let uid = self.session.read().as_ref().map(|session| session.principal.uid.clone());
        self.deactivate().await;
        info!(uid = ?uid, "identity signed out");
        Ok(())
    }

    async fn get_token(&self, force_refresh: bool) -> Result<String, IdentityError> {
        let threshold = self.config.refresh_threshold_seconds;
        {
            let session = self.session.read();
            let session = session.as_ref().ok_or(IdentityError::NotAuthenticated)?;
            if !force_refresh && !session.needs_refresh(threshold) {
                return Ok(session.principal.token.value.clone());
            }
        }

        let _refreshing = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited
        if !force_refresh {
            let session = self.session.read();
            if let Some(session) = session.as_ref() {
                if !session.needs_refresh(threshold) {
                    return Ok(session.principal.token.value.clone());
                }
            }
        }
        self.refresh().await
    }

    async fn claims(&self) -> Result<TokenClaims, IdentityError> {
        let token = self
            .session
            .read()
            .as_ref()
            .map(|session| session.principal.token.value.clone())
            .ok_or(IdentityError::NotAuthenticated)?;
        decode_claims(&token)
    }

    fn current_principal(&self) -> Option<IdentityPrincipal> {
        self.session.read().as_ref().map(|session| session.principal.clone())
    }

    fn subscribe(&self) -> watch::Receiver<Option<AuthNotification>> {
        self.notifications.subscribe()
    }

    fn revision(&self) -> u64 {
        *self.revision.lock()
    }
}

/// Handle to the background refresh task
#[derive(Debug)]
pub struct AutoRefreshHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl AutoRefreshHandle {
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.task.await {
            error!(error = %err, "token refresh task panicked");
        }
    }
}

async fn sleep_for(wait: Option<Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => std::future::pending().await,
    }
}

fn transport(err: HomeChefError) -> IdentityError {
    IdentityError::from(InfraError(err))
}

async fn read_response<R: DeserializeOwned>(response: Response) -> Result<R, IdentityError> {
    read_response_with_code(response).await.map_err(|(err, _)| err)
}

/// Decode a success body, or map the provider error and keep its raw code
async fn read_response_with_code<R: DeserializeOwned>(
    response: Response,
) -> Result<R, (IdentityError, Option<String>)> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|err| (IdentityError::from(InfraError::from(err)), None))?;

    if status.is_success() {
        return serde_json::from_str(&text)
            .map_err(|err| (IdentityError::Provider(format!("unexpected response: {err}")), None));
    }

    match serde_json::from_str::<ErrorEnvelope>(&text) {
        Ok(envelope) => {
            let message = envelope.error.message;
            let code = message.split(" : ").next().unwrap_or_default().trim().to_string();
            Err((map_provider_error(&message), Some(code)))
        }
        Err(_) if status.is_server_error() => {
            Err((IdentityError::Network(format!("identity provider returned {status}")), None))
        }
        Err(_) => {
            Err((IdentityError::Provider(format!("identity provider returned {status}")), None))
        }
    }
}
