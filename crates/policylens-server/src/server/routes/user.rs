//! Current-user endpoint

use axum::{extract::State, Json};
use serde_json::json;

use crate::auth::AuthUser;
use crate::error::Result;
use crate::server::state::AppState;

/// GET /api/user/me - Current authenticated user with subscription info
pub async fn current_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<serde_json::Value>> {
    let profile = state.db().get_profile(user.id)?;

    Ok(Json(json!({
        "id": user.id,
        "email": user.email,
        "name": user.name.unwrap_or_default(),
        "subscriptionStatus": profile.as_ref().and_then(|p| p.subscription_status),
        "subscriptionPlan": profile.as_ref().and_then(|p| p.subscription_plan),
        "createdAt": profile.map(|p| p.created_at).unwrap_or(user.created_at),
    })))
}
