//! Signup, login, logout, and password reset endpoints

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::auth::{password, session};
use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::User;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

fn validate_credentials(email: &str, password: &str) -> Result<()> {
    if !email.contains('@') || email.len() < 3 {
        return Err(Error::validation("A valid email address is required"));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(Error::validation("Password must be at least 8 characters"));
    }
    Ok(())
}

fn user_json(user: &User) -> serde_json::Value {
    json!({
        "id": user.id,
        "email": user.email,
        "name": user.name,
    })
}

/// Open a session for the user and build the Set-Cookie header
fn open_session(state: &AppState, user: &User) -> Result<(HeaderMap, serde_json::Value)> {
    let ttl = Duration::hours(state.config().auth.session_ttl_hours);
    let token = session::generate_token();

    state
        .db()
        .create_session(user.id, &session::token_digest(&token), Utc::now() + ttl)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        session::session_cookie(&token, ttl.num_seconds())
            .parse()
            .map_err(|_| Error::internal("Failed to build session cookie"))?,
    );

    Ok((headers, json!({ "user": user_json(user) })))
}

/// POST /api/auth/signup - Create an account and open a session
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<impl IntoResponse> {
    validate_credentials(&request.email, &request.password)?;

    let hash = password::hash_password(&request.password)?;
    let user = state
        .db()
        .create_user(&request.email, &hash, request.name.as_deref())?;

    tracing::info!("User registered: {}", user.email);

    let (headers, body) = open_session(&state, &user)?;
    Ok((StatusCode::CREATED, headers, Json(body)))
}

/// POST /api/auth/login - Verify credentials and open a session
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let (user, hash) = state
        .db()
        .get_user_by_email(&request.email)?
        .ok_or(Error::Unauthorized)?;

    if !password::verify_password(&request.password, &hash)? {
        return Err(Error::Unauthorized);
    }

    let (headers, body) = open_session(&state, &user)?;
    Ok((StatusCode::OK, headers, Json(body)))
}

/// POST /api/auth/logout - Revoke the session and clear the cookie
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    if let Some(token) = session::cookie_token(&headers) {
        state.db().delete_session(&session::token_digest(&token))?;
    }

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        SET_COOKIE,
        session::clear_session_cookie()
            .parse()
            .map_err(|_| Error::internal("Failed to build session cookie"))?,
    );

    Ok((response_headers, Json(json!({ "success": true }))))
}

/// POST /api/auth/forgot-password - Issue a reset token and email a link
///
/// Always answers success so the endpoint cannot be used to probe for
/// registered addresses.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<serde_json::Value>> {
    if let Some((user, _)) = state.db().get_user_by_email(&request.email)? {
        let token = session::generate_token();
        let expires_at =
            Utc::now() + Duration::seconds(state.config().auth.reset_token_ttl_secs);

        state
            .db()
            .create_password_reset(user.id, &session::token_digest(&token), expires_at)?;

        let reset_url = format!(
            "{}/reset-password?token={}",
            state.config().server.frontend_origin,
            token
        );
        state.mailer().spawn_password_reset(user, reset_url);
    }

    Ok(Json(json!({ "success": true })))
}

/// POST /api/auth/reset-password - Consume a reset token and set a new password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>> {
    if request.password.len() < MIN_PASSWORD_LEN {
        return Err(Error::validation("Password must be at least 8 characters"));
    }

    let user_id = state
        .db()
        .consume_password_reset(&session::token_digest(&request.token))?
        .ok_or_else(|| Error::validation("Invalid or expired reset token"))?;

    let hash = password::hash_password(&request.password)?;
    state.db().update_user_password(user_id, &hash)?;

    // Force re-login everywhere with the new password
    state.db().delete_sessions_for_user(user_id)?;

    tracing::info!("Password reset completed for user {}", user_id);

    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_validation() {
        assert!(validate_credentials("a@b.com", "longenough").is_ok());
        assert!(validate_credentials("not-an-email", "longenough").is_err());
        assert!(validate_credentials("a@b.com", "short").is_err());
    }
}
