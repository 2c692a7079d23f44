//! Analysis endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::analysis;
use crate::auth::AuthUser;
use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{Analysis, Policy, PolicyStatus};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnalysisRequest {
    pub policy_id: Uuid,
}

/// Policy fields embedded in analysis responses
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRef {
    pub id: Uuid,
    pub original_file_name: String,
    pub coverage_start: NaiveDate,
    pub coverage_end: NaiveDate,
    pub status: PolicyStatus,
}

impl From<&Policy> for PolicyRef {
    fn from(policy: &Policy) -> Self {
        Self {
            id: policy.id,
            original_file_name: policy.original_file_name.clone(),
            coverage_start: policy.coverage_start,
            coverage_end: policy.coverage_end,
            status: policy.status,
        }
    }
}

/// An analysis with its policy, as returned by list and get
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisView {
    #[serde(flatten)]
    pub analysis: Analysis,
    pub policy: PolicyRef,
}

impl AnalysisView {
    fn new(analysis: Analysis, policy: &Policy) -> Self {
        Self {
            policy: PolicyRef::from(policy),
            analysis,
        }
    }
}

/// POST /api/analyses - Run the analysis pipeline for a policy
pub async fn create_analysis(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateAnalysisRequest>,
) -> Result<impl IntoResponse> {
    let analysis = analysis::analyze_policy(&state, &user, request.policy_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "analysis": {
                "id": analysis.id,
                "policyId": analysis.policy_id,
                "aiModel": analysis.ai_model,
                "aiTokensUsed": analysis.ai_tokens_used,
                "createdAt": analysis.created_at,
            },
        })),
    ))
}

/// GET /api/analyses - List the user's analyses with policy info
pub async fn list_analyses(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<serde_json::Value>> {
    let analyses: Vec<AnalysisView> = state
        .db()
        .list_analyses(user.id)?
        .into_iter()
        .map(|(analysis, policy)| AnalysisView::new(analysis, &policy))
        .collect();

    Ok(Json(json!({
        "total": analyses.len(),
        "analyses": analyses,
    })))
}

/// GET /api/analyses/:id - Get one analysis with policy info
pub async fn get_analysis(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AnalysisView>> {
    let (analysis, policy) = state
        .db()
        .get_analysis(id, user.id)?
        .ok_or_else(|| Error::not_found("Analysis"))?;

    Ok(Json(AnalysisView::new(analysis, &policy)))
}
