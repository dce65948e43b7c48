//! Credentials for the assistant channel
//!
//! The session manager only sees `TokenProvider`. `OAuthTokenProvider` runs
//! the installed-application consent flow; `StaticTokenProvider` wraps a
//! token obtained elsewhere.

mod oauth;
mod provider;

pub use oauth::{
    ClientSecret, InstalledCredentials, OAuthTokenProvider, TokenCallback, GOOGLE_AUTH_URI,
    GOOGLE_TOKEN_URI,
};
pub use provider::{OAuthToken, StaticTokenProvider, TokenProvider};
