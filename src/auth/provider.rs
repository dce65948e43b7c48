use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AssistantError, Result};

/// Tokens expiring within this window are treated as expired
const EXPIRY_MARGIN_SECS: i64 = 60;

/// An OAuth2 access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,

    #[serde(default = "default_token_type")]
    pub token_type: String,

    #[serde(default)]
    pub refresh_token: Option<String>,

    /// `None` for tokens that never expire
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl OAuthToken {
    /// A non-expiring bearer token
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            refresh_token: None,
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Non-empty and not about to expire
    pub fn is_valid(&self) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expires_at {
            Some(expires_at) => Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS) < expires_at,
            None => true,
        }
    }
}

/// Source of access tokens for the assistant channel
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Consent URL the user must visit; empty once a valid token is held
    fn auth_url(&self) -> String;

    /// Exchange an authorization code for a token
    async fn exchange(&self, code: &str) -> Result<OAuthToken>;

    /// A valid token, refreshed if the held one expired
    async fn current_token(&self) -> Result<OAuthToken>;

    /// The last unresolved authentication error
    fn last_error(&self) -> Option<AssistantError>;

    /// Stop any pending authorization listener
    async fn shutdown(&self) {}
}

/// Hands out a fixed token
///
/// Useful when tokens are obtained outside the process.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: OAuthToken,
}

impl StaticTokenProvider {
    pub fn new(token: OAuthToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    fn auth_url(&self) -> String {
        String::new()
    }

    async fn exchange(&self, _code: &str) -> Result<OAuthToken> {
        Err(AssistantError::Auth(
            "static token provider cannot exchange codes".to_string(),
        ))
    }

    async fn current_token(&self) -> Result<OAuthToken> {
        if self.token.is_valid() {
            Ok(self.token.clone())
        } else {
            Err(AssistantError::Auth("static token is expired".to_string()))
        }
    }

    fn last_error(&self) -> Option<AssistantError> {
        None
    }
}
