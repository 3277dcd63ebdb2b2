//! Principal persistence
//!
//! Keeps the signed-in principal and its refresh token across restarts so
//! `IdentityToolkitClient::initialize` can restore the session.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use homechef_domain::{HomeChefError, IdentityPrincipal};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::InfraError;

/// What gets persisted for a signed-in principal
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPrincipal {
    pub principal: IdentityPrincipal,
    pub refresh_token: String,
}

impl fmt::Debug for StoredPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredPrincipal")
            .field("principal", &self.principal)
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Storage for the persisted principal
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// # Errors
    /// Returns error if the store exists but cannot be read.
    async fn load(&self) -> Result<Option<StoredPrincipal>, HomeChefError>;

    /// # Errors
    /// Returns error if the principal cannot be written.
    async fn save(&self, stored: &StoredPrincipal) -> Result<(), HomeChefError>;

    /// # Errors
    /// Returns error if the persisted principal cannot be removed.
    async fn clear(&self) -> Result<(), HomeChefError>;
}

/// Process-local store; sessions end with the process
#[derive(Debug, Default)]
pub struct MemoryPrincipalStore {
    slot: Mutex<Option<StoredPrincipal>>,
}

impl MemoryPrincipalStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_principal(stored: StoredPrincipal) -> Self {
        Self { slot: Mutex::new(Some(stored)) }
    }
}

#[async_trait]
impl PrincipalStore for MemoryPrincipalStore {
    async fn load(&self) -> Result<Option<StoredPrincipal>, HomeChefError> {
        Ok(self.slot.lock().clone())
    }

    async fn save(&self, stored: &StoredPrincipal) -> Result<(), HomeChefError> {
        *self.slot.lock() = Some(stored.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), HomeChefError> {
        self.slot.lock().take();
        Ok(())
    }
}

/// JSON file store
#[derive(Debug, Clone)]
pub struct FilePrincipalStore {
    path: PathBuf,
}

impl FilePrincipalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PrincipalStore for FilePrincipalStore {
    async fn load(&self) -> Result<Option<StoredPrincipal>, HomeChefError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(InfraError::from(err).into()),
        };
        let stored = serde_json::from_str(&contents).map_err(InfraError::from)?;
        debug!(path = %self.path.display(), "loaded persisted principal");
        Ok(Some(stored))
    }

    async fn save(&self, stored: &StoredPrincipal) -> Result<(), HomeChefError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(InfraError::from)?;
        }
        let contents = serde_json::to_vec_pretty(stored).map_err(InfraError::from)?;
        tokio::fs::write(&self.path, contents).await.map_err(InfraError::from)?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), HomeChefError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(InfraError::from(err).into()),
        }
    }
}
