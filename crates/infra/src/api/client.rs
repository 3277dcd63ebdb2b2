//! Authorized client for the HomeChef backend
//!
//! Attaches the identity bearer token when a principal is signed in and
//! shares the cookie jar of the session bridge, so both the token and the
//! backend session cookie travel with every call.

use std::sync::Arc;

use homechef_core::{IdentityError, IdentityProvider};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::errors::ApiError;
use crate::http::HttpClient;

/// Shown when the backend sends no `error` field
const FALLBACK_MESSAGE: &str = "Request failed";

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Backend client that authenticates as the current principal
pub struct ApiClient {
    http: HttpClient,
    base_url: String,
    identity: Arc<dyn IdentityProvider>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(http: HttpClient, base_url: &str, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { http, base_url: base_url.trim_end_matches('/').to_string(), identity }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// # Errors
    /// See [`ApiClient::execute`].
    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        self.execute(Method::GET, path, None::<&()>).await
    }

    /// # Errors
    /// See [`ApiClient::execute`].
    pub async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        self.execute(Method::POST, path, Some(body)).await
    }

    /// # Errors
    /// See [`ApiClient::execute`].
    pub async fn put<B, R>(&self, path: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        self.execute(Method::PUT, path, Some(body)).await
    }

    /// # Errors
    /// See [`ApiClient::execute`].
    pub async fn patch<B, R>(&self, path: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        self.execute(Method::PATCH, path, Some(body)).await
    }

    /// # Errors
    /// See [`ApiClient::execute`].
    pub async fn delete<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        self.execute(Method::DELETE, path, None::<&()>).await
    }

    /// Send a request relative to the base URL
    ///
    /// # Errors
    /// - transport failures → `ApiError::Network`
    /// - non-2xx → category by status, carrying the backend's message
    /// - an undecodable 2xx body → `ApiError::Client`
    #[instrument(skip_all, fields(method = %method, path = %path))]
    pub async fn execute<B, R>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<R, ApiError>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.authorize(self.http.request(method, &url)).await?;
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = self.http.send(request).await?;
        let status = response.status();
        let text = response.text().await.map_err(|err| ApiError::Network(err.to_string()))?;

        if !status.is_success() {
            let message = error_message(&text);
            warn!(status = status.as_u16(), message = %message, "backend request failed");
            return Err(ApiError::from_status(status, message));
        }

        debug!(status = status.as_u16(), "backend request succeeded");
        if text.trim().is_empty() || status == StatusCode::NO_CONTENT {
            return serde_json::from_value(serde_json::Value::Null).map_err(|_| {
                ApiError::Client(format!(
                    "empty {} response cannot be decoded into the expected type",
                    status.as_u16()
                ))
            });
        }
        serde_json::from_str(&text)
            .map_err(|err| ApiError::Client(format!("failed to parse response: {err}")))
    }

    /// Attach the bearer token, if a principal is signed in
    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        match self.identity.get_token(false).await {
            Ok(token) => Ok(request.bearer_auth(token)),
            Err(IdentityError::NotAuthenticated) => Ok(request),
            Err(err) => Err(err.into()),
        }
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error.or(parsed.message))
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| FALLBACK_MESSAGE.to_string())
}
