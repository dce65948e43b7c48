use crate::auth::TokenProvider;
use std::sync::Arc;

/// Shared state for the OAuth callback handlers
#[derive(Clone)]
pub struct CallbackState {
    /// Provider that exchanges the authorization code
    pub provider: Arc<dyn TokenProvider>,
}

impl CallbackState {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self { provider }
    }
}
