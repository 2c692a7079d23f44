//! Session-cookie authentication
//!
//! Sessions are opaque random tokens handed out as an HttpOnly cookie; only
//! the SHA-256 digest of a token is stored server-side.

pub mod password;
pub mod session;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::User;

/// Extractor for the authenticated user
///
/// Rejects with UNAUTHORIZED when the session cookie is missing, unknown, or
/// expired.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = session::cookie_token(&parts.headers).ok_or(Error::Unauthorized)?;
        let user = state
            .db()
            .session_user(&session::token_digest(&token))?
            .ok_or(Error::Unauthorized)?;

        Ok(AuthUser(user))
    }
}
