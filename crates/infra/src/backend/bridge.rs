//! Backend session bridge
//!
//! Exchanges identity tokens for the backend's cookie session and keeps the
//! backend user record in sync. The cookie itself lives in the shared
//! [`HttpClient`] jar.

use async_trait::async_trait;
use homechef_core::{BridgeError, EnsureRegistered, SessionBackend};
use homechef_domain::constants::{
    BACKEND_LOGIN_PATH, BACKEND_LOGOUT_PATH, BACKEND_ME_PATH, BACKEND_REGISTER_PATH,
    BACKEND_USERS_PATH, USER_ALREADY_EXISTS_MESSAGE,
};
use homechef_domain::{
    BackendConfig, BackendProfile, HomeChefError, IdentityPrincipal, RegistrationFields, Role,
};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::errors::InfraError;
use crate::http::HttpClient;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest<'a> {
    id_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile_image: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    id_token: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpsertUserRequest<'a> {
    uid: &'a str,
    email: &'a str,
    name: &'a str,
    profile_image: &'a str,
    role: Role,
}

/// `{ "user": { ... } }`
#[derive(Debug, Default, Deserialize)]
struct ProfileEnvelope {
    #[serde(default)]
    user: Option<BackendProfile>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// REST client for the HomeChef backend session endpoints
#[derive(Debug, Clone)]
pub struct BackendSessionBridge {
    http: HttpClient,
    base_url: String,
}

impl BackendSessionBridge {
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, HomeChefError> {
        Ok(Self::with_client(HttpClient::for_backend(config)?, &config.base_url))
    }

    /// Use an existing client so its cookie jar is shared
    #[must_use]
    pub fn with_client(http: HttpClient, base_url: &str) -> Self {
        Self { http, base_url: base_url.trim_end_matches('/').to_string() }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, BridgeError> {
        self.http.send(request).await.map_err(|err| BridgeError::from(InfraError(err)))
    }
}

#[async_trait]
impl SessionBackend for BackendSessionBridge {
    #[instrument(skip_all, fields(uid = %principal.uid))]
    async fn exchange_and_register(
        &self,
        principal: &IdentityPrincipal,
        fields: &RegistrationFields,
    ) -> Result<BackendProfile, BridgeError> {
        let body = RegisterRequest {
            id_token: &principal.token.value,
            name: fields.name.as_deref(),
            address: fields.address.as_deref(),
            profile_image: fields.profile_image.as_deref(),
        };
        let request = self.http.request(Method::POST, self.url(BACKEND_REGISTER_PATH)).json(&body);
        let response = self.send(request).await?;

        if !response.status().is_success() {
            let (_, message) = error_message(response).await;
            return Err(BridgeError::Registration(message));
        }

        let envelope: ProfileEnvelope = decode(response).await?;
        let profile = envelope
            .user
            .ok_or_else(|| BridgeError::Decode("register response has no user".to_string()))?;
        info!("backend registration complete");
        Ok(profile)
    }

    #[instrument(skip_all)]
    async fn login(&self, token: &str) -> Result<(), BridgeError> {
        let request = self
            .http
            .request(Method::POST, self.url(BACKEND_LOGIN_PATH))
            .json(&LoginRequest { id_token: token });
        let response = self.send(request).await?;

        if !response.status().is_success() {
            let (_, message) = error_message(response).await;
            return Err(BridgeError::Login(message));
        }
        debug!("backend session established");
        Ok(())
    }

    #[instrument(skip_all)]
    async fn fetch_profile(&self, token: &str) -> Result<Option<BackendProfile>, BridgeError> {
        let request = self.http.request(Method::GET, self.url(BACKEND_ME_PATH)).bearer_auth(token);
        let response = self.send(request).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("backend has no profile for this principal");
            return Ok(None);
        }
        if !status.is_success() {
            let (status, message) = error_message(response).await;
            return Err(BridgeError::Status { status, message });
        }

        let envelope: ProfileEnvelope = decode(response).await?;
        Ok(envelope.user)
    }

    #[instrument(skip_all)]
    async fn logout(&self) -> Result<(), BridgeError> {
        let request = self.http.request(Method::POST, self.url(BACKEND_LOGOUT_PATH));
        let response = self.send(request).await?;

        if !response.status().is_success() {
            let (status, message) = error_message(response).await;
            return Err(BridgeError::Status { status, message });
        }
        Ok(())
    }

    #[instrument(skip_all, fields(uid = %principal.uid, role = %role_hint))]
    async fn ensure_registered(
        &self,
        principal: &IdentityPrincipal,
        role_hint: Role,
    ) -> EnsureRegistered {
        let body = UpsertUserRequest {
            uid: &principal.uid,
            email: &principal.email,
            name: principal.display_name.as_deref().unwrap_or_default(),
            profile_image: principal.photo_url.as_deref().unwrap_or_default(),
            role: role_hint,
        };
        let request = self.http.request(Method::POST, self.url(BACKEND_USERS_PATH)).json(&body);

        let response = match self.send(request).await {
            Ok(response) => response,
            Err(err) => {
                error!(error = %err, "failed to register user in backend");
                return EnsureRegistered::Failed(err);
            }
        };

        let status = response.status();
        if status.is_success() {
            return EnsureRegistered::Created;
        }
        if status == StatusCode::CONFLICT {
            return EnsureRegistered::AlreadyExists;
        }

        let (code, message) = error_message(response).await;
        if status.is_client_error() && message == USER_ALREADY_EXISTS_MESSAGE {
            return EnsureRegistered::AlreadyExists;
        }

        let err = BridgeError::Status { status: code, message };
        if status.is_server_error() {
            error!(error = %err, "failed to register user in backend");
        } else {
            warn!(error = %err, "backend rejected user record");
        }
        EnsureRegistered::Failed(err)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BridgeError> {
    let text = response.text().await.map_err(|err| BridgeError::from(InfraError::from(err)))?;
    serde_json::from_str(&text).map_err(|err| BridgeError::Decode(err.to_string()))
}

/// Status code and the most useful message the backend gave
async fn error_message(response: Response) -> (u16, String) {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    (status.as_u16(), extract_message(status, &text))
}

fn extract_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed.error.or(parsed.message) {
            return message;
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed.starts_with('{') {
        status.canonical_reason().unwrap_or("Request failed").to_string()
    } else {
        trimmed.to_string()
    }
}
