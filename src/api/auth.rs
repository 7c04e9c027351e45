//! Request Authentication
//!
//! Every resource request is checked before it reaches a lifecycle engine.
//! A rejection carries its own message and status, which the client sees
//! unchanged.

use crate::error::{Error, Result};
use axum::http::{HeaderMap, StatusCode};

/// Header carrying the session token
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Authentication check run before each resource request
pub trait Authenticator: Send + Sync + 'static {
    fn check(&self, headers: &HeaderMap) -> Result<()>;
}

/// Accepts every request
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authenticator for AllowAll {
    fn check(&self, _headers: &HeaderMap) -> Result<()> {
        Ok(())
    }
}

/// Requires `X-Auth-Token` to equal a configured token
#[derive(Clone)]
pub struct TokenAuthenticator {
    token: String,
}

impl TokenAuthenticator {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthenticator").finish_non_exhaustive()
    }
}

impl Authenticator for TokenAuthenticator {
    fn check(&self, headers: &HeaderMap) -> Result<()> {
        let presented = headers
            .get(AUTH_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());

        match presented {
            Some(token) if token == self.token => Ok(()),
            _ => Err(Error::Authentication {
                message: "Unauthorized".into(),
                status: StatusCode::UNAUTHORIZED,
            }),
        }
    }
}
