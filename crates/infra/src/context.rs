//! Composition root
//!
//! Wires the identity adapter, backend bridge, synchronizer and route guards
//! from a [`Config`] and owns the background tasks.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use homechef_core::{
    AuthError, AuthenticatedUser, DashboardView, GuardDecision, IdentityProvider, RouteGuards,
    RouteTable, SessionBackend, SessionSynchronizer, SyncHandle,
};
use homechef_domain::{Config, HomeChefError, LoginForm, RegistrationForm, UnifiedSession};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::backend::BackendSessionBridge;
use crate::http::HttpClient;
use crate::identity::{
    AutoRefreshHandle, FilePrincipalStore, IdentityToolkitClient, MemoryPrincipalStore,
    PrincipalStore,
};

#[derive(Debug)]
struct Running {
    sync: SyncHandle,
    refresh: AutoRefreshHandle,
}

#[derive(Debug, Default)]
enum Lifecycle {
    #[default]
    Stopped,
    /// Claimed by a `start` call that is still initializing
    Starting,
    Running(Running),
}

/// Session state and navigation for one signed-in (or anonymous) user
#[derive(Debug)]
pub struct AuthContext {
    identity: Arc<IdentityToolkitClient>,
    synchronizer: Arc<SessionSynchronizer>,
    api: ApiClient,
    guards: RouteGuards,
    routes: RouteTable,
    lifecycle: Mutex<Lifecycle>,
}

impl AuthContext {
    /// Build every component; nothing runs until [`AuthContext::start`]
    ///
    /// The backend bridge and the API client share one cookie jar so the
    /// session cookie set by `/login` is sent on every later call.
    ///
    /// # Errors
    /// Returns error if an HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self, HomeChefError> {
        let store: Arc<dyn PrincipalStore> = match &config.session.principal_store_path {
            Some(path) => Arc::new(FilePrincipalStore::new(PathBuf::from(path))),
            None => Arc::new(MemoryPrincipalStore::new()),
        };
        let identity =
            Arc::new(IdentityToolkitClient::from_config(config.identity.clone(), store)?);

        let backend_http = HttpClient::builder()
            .timeout(Duration::from_secs(config.backend.timeout_seconds))
            .max_attempts(config.backend.max_attempts)
            .build()?;
        let backend = Arc::new(BackendSessionBridge::with_client(
            backend_http.clone(),
            &config.backend.base_url,
        ));

        let identity_port: Arc<dyn IdentityProvider> = identity.clone();
        let backend_port: Arc<dyn SessionBackend> = backend;
        let synchronizer =
            Arc::new(SessionSynchronizer::new(Arc::clone(&identity_port), backend_port));
        let api = ApiClient::new(backend_http, &config.backend.base_url, identity_port);

        Ok(Self {
            identity,
            synchronizer,
            api,
            guards: RouteGuards::from(&config.session),
            routes: RouteTable::standard(),
            lifecycle: Mutex::new(Lifecycle::Stopped),
        })
    }

    /// Start following identity changes, restore any persisted session and
    /// begin background token refresh
    ///
    /// Calling it again while starting or running is a no-op.
    pub async fn start(&self) {
        {
            let mut lifecycle = self.lifecycle.lock();
            if !matches!(*lifecycle, Lifecycle::Stopped) {
                debug!("auth context already started");
                return;
            }
            *lifecycle = Lifecycle::Starting;
        }

        let sync = self.synchronizer.start();
        self.identity.initialize().await;
        let refresh = self.identity.start_auto_refresh();

        // `shutdown` may have run while we were initializing
        let cancelled = {
            let mut lifecycle = self.lifecycle.lock();
            if matches!(*lifecycle, Lifecycle::Starting) {
                *lifecycle = Lifecycle::Running(Running { sync, refresh });
                None
            } else {
                Some(Running { sync, refresh })
            }
        };
        match cancelled {
            Some(Running { sync, refresh }) => {
                refresh.shutdown().await;
                sync.shutdown().await;
                info!("auth context shut down during start");
            }
            None => info!("auth context started"),
        }
    }

    /// Stop the background tasks
    pub async fn shutdown(&self) {
        let previous = std::mem::take(&mut *self.lifecycle.lock());
        if let Lifecycle::Running(Running { sync, refresh }) = previous {
            refresh.shutdown().await;
            sync.shutdown().await;
            info!("auth context stopped");
        }
    }

    /// Wait until the session leaves its loading phases
    pub async fn ready(&self) -> UnifiedSession {
        let mut receiver = self.synchronizer.watch_session();
        let settled = receiver.wait_for(|session| !session.is_loading()).await.map(|s| s.clone());
        settled.unwrap_or_else(|_| self.synchronizer.session())
    }

    /// # Errors
    /// See [`SessionSynchronizer::login`].
    pub async fn login(&self, form: &LoginForm) -> Result<AuthenticatedUser, AuthError> {
        self.synchronizer.login(form).await
    }

    /// # Errors
    /// See [`SessionSynchronizer::register`].
    pub async fn register(&self, form: &RegistrationForm) -> Result<AuthenticatedUser, AuthError> {
        self.synchronizer.register(form).await
    }

    pub async fn logout(&self) {
        self.synchronizer.logout().await;
    }

    #[must_use]
    pub fn session(&self) -> UnifiedSession {
        self.synchronizer.session()
    }

    #[must_use]
    pub fn watch_session(&self) -> watch::Receiver<UnifiedSession> {
        self.synchronizer.watch_session()
    }

    /// Guard decision for navigating to `path` with the current session
    #[must_use]
    pub fn evaluate(&self, path: &str) -> GuardDecision {
        self.routes.evaluate(&self.session(), path, &self.guards)
    }

    #[must_use]
    pub fn dashboard(&self) -> DashboardView {
        DashboardView::for_session(&self.session())
    }

    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub const fn synchronizer(&self) -> &Arc<SessionSynchronizer> {
        &self.synchronizer
    }

    #[must_use]
    pub const fn identity(&self) -> &Arc<IdentityToolkitClient> {
        &self.identity
    }

    #[must_use]
    pub const fn guards(&self) -> &RouteGuards {
        &self.guards
    }
}
