//! Paid human review endpoints

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::HumanReview;

use super::billing::ensure_stripe_customer;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestReviewBody {
    #[serde(default)]
    pub policy_id: Option<Uuid>,
    #[serde(default)]
    pub analysis_id: Option<Uuid>,
}

/// POST /api/human-reviews - Request a paid manual review
///
/// Creates the pending review row, then a payment-mode checkout session; the
/// review is activated by the payment webhook.
pub async fn request_review(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<RequestReviewBody>,
) -> Result<impl IntoResponse> {
    if let Some(policy_id) = body.policy_id {
        state
            .db()
            .get_policy(policy_id, user.id)?
            .ok_or_else(|| Error::not_found("Policy"))?;
    }
    if let Some(analysis_id) = body.analysis_id {
        state
            .db()
            .get_analysis(analysis_id, user.id)?
            .ok_or_else(|| Error::not_found("Analysis"))?;
    }

    let review = HumanReview::new(user.id, body.policy_id, body.analysis_id);
    state.db().insert_human_review(&review)?;

    let customer_id = ensure_stripe_customer(&state, &user).await?;
    let origin = &state.config().server.frontend_origin;
    let review_id = review.id.to_string();
    let user_id = user.id.to_string();

    let session = state
        .stripe()
        .create_payment_checkout(
            &customer_id,
            "Human policy review",
            state.config().stripe.human_review_price_cents,
            &format!("{}/billing?humanReview=success", origin),
            &format!("{}/billing?humanReview=cancelled", origin),
            &[
                ("human_review_id", review_id.as_str()),
                ("user_id", user_id.as_str()),
            ],
        )
        .await?;

    tracing::info!("Human review {} requested by user {}", review.id, user.id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "review": review,
            "checkoutUrl": session.url,
        })),
    ))
}

/// GET /api/human-reviews - List the user's review requests
pub async fn list_reviews(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<serde_json::Value>> {
    let reviews = state.db().list_human_reviews(user.id)?;

    Ok(Json(json!({
        "total": reviews.len(),
        "reviews": reviews,
    })))
}
