//! OAuth2 installed-application flow
//!
//! The user opens the consent URL, the browser is redirected to the local
//! callback listener with an authorization code, and the code is exchanged
//! for an access/refresh token pair. Expired access tokens are refreshed
//! with the refresh token.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use super::provider::{OAuthToken, TokenProvider};
use crate::backend::ASSISTANT_SCOPE;
use crate::error::{AssistantError, Result};
use crate::http::CallbackListener;

/// Google consent endpoint, used when the client secret omits `auth_uri`
pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google token endpoint, used when the client secret omits `token_uri`
pub const GOOGLE_TOKEN_URI: &str = "https://accounts.google.com/o/oauth2/token";

/// Invoked with every newly obtained token so callers can cache it
pub type TokenCallback = Arc<dyn Fn(&OAuthToken) + Send + Sync>;

/// Client secret JSON downloaded from the cloud console
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub installed: InstalledCredentials,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstalledCredentials {
    pub client_id: String,
    pub client_secret: String,

    #[serde(default)]
    pub project_id: String,

    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,

    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

impl ClientSecret {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| AssistantError::Config(format!("Invalid client secret: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            AssistantError::Config(format!(
                "Cannot read client secret {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&json)
    }
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

/// Token endpoint error body
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

#[derive(Default)]
struct AuthState {
    token: Option<OAuthToken>,
    last_error: Option<AssistantError>,
}

/// Token provider backed by the OAuth2 installed-application flow
pub struct OAuthTokenProvider {
    credentials: InstalledCredentials,
    redirect_uri: String,
    scopes: Vec<String>,
    http: reqwest::Client,
    state: RwLock<AuthState>,
    authorized: watch::Sender<bool>,
    callback: Option<TokenCallback>,
    listener: Mutex<Option<CallbackListener>>,
}

impl OAuthTokenProvider {
    /// Build a provider from the client secret; the first redirect URI is
    /// used unless overridden with [`with_redirect_uri`](Self::with_redirect_uri)
    pub fn new(secret: ClientSecret) -> Result<Self> {
        let credentials = secret.installed;
        let redirect_uri = credentials.redirect_uris.first().cloned().ok_or_else(|| {
            AssistantError::Config("client secret has no redirect URIs".to_string())
        })?;

        url::Url::parse(&credentials.auth_uri)
            .map_err(|e| AssistantError::Config(format!("Invalid auth_uri: {}", e)))?;
        url::Url::parse(&credentials.token_uri)
            .map_err(|e| AssistantError::Config(format!("Invalid token_uri: {}", e)))?;

        let (authorized, _) = watch::channel(false);

        Ok(Self {
            credentials,
            redirect_uri,
            scopes: vec![ASSISTANT_SCOPE.to_string()],
            http: reqwest::Client::new(),
            state: RwLock::new(AuthState::default()),
            authorized,
            callback: None,
            listener: Mutex::new(None),
        })
    }

    /// Seed the provider with a previously cached token
    pub fn with_token(self, token: OAuthToken) -> Self {
        let valid = token.is_valid() || token.refresh_token.is_some();
        self.state.write().token = Some(token);
        if valid {
            self.authorized.send_replace(true);
        }
        self
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_token_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&OAuthToken) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Whether a usable token is held (possibly needing a refresh)
    pub fn is_authorized(&self) -> bool {
        *self.authorized.borrow()
    }

    /// Consent URL for offline access, regardless of the held token
    pub fn consent_url(&self) -> String {
        let scope = self.scopes.join(" ");
        let params = [
            ("access_type", "offline"),
            ("client_id", self.credentials.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("state", "state"),
        ];

        match url::Url::parse_with_params(&self.credentials.auth_uri, &params) {
            Ok(url) => url.to_string(),
            Err(e) => {
                warn!("Cannot build consent URL: {}", e);
                String::new()
            }
        }
    }

    /// Wait until a code exchange succeeds (or a cached token was supplied)
    pub async fn wait_authorized(&self) -> Result<OAuthToken> {
        let mut authorized = self.authorized.subscribe();
        authorized
            .wait_for(|authorized| *authorized)
            .await
            .map_err(|_| AssistantError::Auth("token provider dropped".to_string()))?;

        self.state
            .read()
            .token
            .clone()
            .ok_or_else(|| AssistantError::Auth("no token after authorization".to_string()))
    }

    /// Serve the OAuth redirect on `bind`; returns the bound address
    ///
    /// The listener lives until [`TokenProvider::shutdown`] is called.
    pub async fn start_callback_listener(self: &Arc<Self>, bind: SocketAddr) -> Result<SocketAddr> {
        let mut slot = self.listener.lock().await;
        if let Some(listener) = slot.as_ref() {
            return Ok(listener.local_addr());
        }

        let provider: Arc<dyn TokenProvider> = Arc::clone(self) as Arc<dyn TokenProvider>;
        match CallbackListener::bind(bind, provider).await {
            Ok(listener) => {
                let addr = listener.local_addr();
                info!("OAuth callback listener on http://{}", addr);
                *slot = Some(listener);
                Ok(addr)
            }
            Err(e) => {
                let error = AssistantError::Auth(format!(
                    "Cannot start OAuth callback listener on {}: {}",
                    bind, e
                ));
                error!("{}", error);
                self.state.write().last_error = Some(error.clone());
                Err(error)
            }
        }
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .http
            .post(&self.credentials.token_uri)
            .form(form)
            .send()
            .await
            .map_err(|e| AssistantError::Auth(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{}: {}", err.error, description),
                    None => err.error,
                },
                Err(_) => body.chars().take(200).collect(),
            };
            return Err(AssistantError::Auth(format!(
                "Token endpoint returned HTTP {}: {}",
                status, reason
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AssistantError::Auth(format!("Cannot parse token response: {}", e)))
    }

    /// Store a new token, clear the error and notify waiters
    fn store_token(&self, response: TokenResponse, previous_refresh: Option<String>) -> OAuthToken {
        let token = OAuthToken {
            access_token: response.access_token,
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
            refresh_token: response.refresh_token.or(previous_refresh),
            expires_at: response
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
        };

        {
            let mut state = self.state.write();
            state.token = Some(token.clone());
            state.last_error = None;
        }
        self.authorized.send_replace(true);

        if let Some(callback) = &self.callback {
            callback(&token);
        }

        token
    }

    async fn refresh(&self, refresh_token: String) -> Result<OAuthToken> {
        info!("Refreshing OAuth access token");

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
        ];

        match self.request_token(&form).await {
            Ok(response) => {
                let token = self.store_token(response, Some(refresh_token));
                debug!(expires_at = ?token.expires_at, "OAuth token refreshed");
                Ok(token)
            }
            Err(e) => {
                error!("OAuth refresh failed: {}", e);
                self.state.write().last_error = Some(e.clone());
                Err(e)
            }
        }
    }
}

#[async_trait]
impl TokenProvider for OAuthTokenProvider {
    fn auth_url(&self) -> String {
        let valid = self
            .state
            .read()
            .token
            .as_ref()
            .is_some_and(OAuthToken::is_valid);

        if valid {
            String::new()
        } else {
            self.consent_url()
        }
    }

    async fn exchange(&self, code: &str) -> Result<OAuthToken> {
        info!("Exchanging OAuth authorization code");

        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        match self.request_token(&form).await {
            Ok(response) => {
                let token = self.store_token(response, None);
                info!("OAuth authorization complete");
                Ok(token)
            }
            Err(e) => {
                error!("OAuth code exchange failed: {}", e);
                self.state.write().last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    async fn current_token(&self) -> Result<OAuthToken> {
        let held = self.state.read().token.clone();

        match held {
            Some(token) if token.is_valid() => Ok(token),
            Some(OAuthToken {
                refresh_token: Some(refresh_token),
                ..
            }) => self.refresh(refresh_token).await,
            _ => Err(AssistantError::Auth(format!(
                "authorization required, visit {}",
                self.consent_url()
            ))),
        }
    }

    fn last_error(&self) -> Option<AssistantError> {
        self.state.read().last_error.clone()
    }

    async fn shutdown(&self) {
        let listener = self.listener.lock().await.take();
        if let Some(listener) = listener {
            listener.shutdown().await;
            info!("OAuth callback listener stopped");
        }
    }
}
