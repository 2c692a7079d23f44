//! Policy comparison endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::analysis;
use crate::auth::AuthUser;
use crate::error::{Error, Result};
use crate::server::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateComparisonRequest {
    pub previous_policy_id: Uuid,
    pub new_policy_id: Uuid,
}

/// POST /api/comparisons - Compare two analyzed policies
pub async fn create_comparison(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateComparisonRequest>,
) -> Result<impl IntoResponse> {
    let comparison = analysis::compare_policies(
        &state,
        &user,
        request.previous_policy_id,
        request.new_policy_id,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "comparison": comparison,
        })),
    ))
}

/// GET /api/comparisons - List the user's comparisons
pub async fn list_comparisons(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<serde_json::Value>> {
    let comparisons = state.db().list_comparisons(user.id)?;

    Ok(Json(json!({
        "total": comparisons.len(),
        "comparisons": comparisons,
    })))
}

/// GET /api/comparisons/:id - Get one comparison
pub async fn get_comparison(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let comparison = state
        .db()
        .get_comparison(id, user.id)?
        .ok_or_else(|| Error::not_found("Comparison"))?;

    Ok(Json(json!(comparison)))
}
