use super::state::CallbackState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
};
use serde::Deserialize;
use tracing::{error, info, warn};

// ============================================================================
// Request Types
// ============================================================================

/// Query string of the OAuth redirect
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code granted by the user
    pub code: Option<String>,

    /// Set by the consent page when the user denied access
    pub error: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /?code=...
/// Exchange the authorization code for a token
pub async fn oauth_callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> impl IntoResponse {
    let code = match params.code.filter(|code| !code.is_empty()) {
        Some(code) => code,
        None => {
            let reason = params
                .error
                .unwrap_or_else(|| "No authorization code received".to_string());
            warn!("OAuth callback without code: {}", reason);
            return (
                StatusCode::BAD_REQUEST,
                Html(failure_page(&reason)),
            )
                .into_response();
        }
    };

    info!("Received OAuth authorization code");

    match state.provider.exchange(&code).await {
        Ok(_) => (StatusCode::OK, Html(success_page())).into_response(),
        Err(e) => {
            error!("Failed to exchange authorization code: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(failure_page(&e.to_string())),
            )
                .into_response()
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

// ============================================================================
// Pages
// ============================================================================

const PAGE_STYLE: &str = "body{background-color:black;color:white;font-family:sans-serif;}";

fn success_page() -> String {
    format!(
        "<html><head><style>{}</style></head><body>\
         <h3>Authentication Successful</h3>\
         <footer>You may safely close this page.</footer>\
         </body></html>",
        PAGE_STYLE
    )
}

fn failure_page(reason: &str) -> String {
    format!(
        "<html><head><style>{}</style></head><body>\
         <h3>Authentication Failure</h3>\
         <p>The following error was provided: <strong>{}</strong>.</p>\
         <footer>You should try logging in again.</footer>\
         </body></html>",
        PAGE_STYLE,
        escape_html(reason)
    )
}

fn escape_html(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '&' => "&amp;".to_string(),
            '"' => "&quot;".to_string(),
            other => other.to_string(),
        })
        .collect()
}
