//! API routes

pub mod analyses;
pub mod auth;
pub mod billing;
pub mod comparisons;
pub mod policies;
pub mod reviews;
pub mod user;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Auth
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password))
        // Current user
        .route("/user/me", get(user::current_user))
        // Policies - upload gets a larger body limit for the PDF
        .route("/policies", get(policies::list_policies))
        .route(
            "/policies/upload",
            post(policies::upload_policy).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route(
            "/policies/:id",
            get(policies::get_policy).delete(policies::delete_policy),
        )
        // Analyses
        .route(
            "/analyses",
            post(analyses::create_analysis).get(analyses::list_analyses),
        )
        .route("/analyses/:id", get(analyses::get_analysis))
        // Comparisons
        .route(
            "/comparisons",
            post(comparisons::create_comparison).get(comparisons::list_comparisons),
        )
        .route("/comparisons/:id", get(comparisons::get_comparison))
        // Billing
        .route("/billing/checkout", post(billing::create_checkout))
        .route("/billing/subscription", get(billing::get_subscription))
        .route("/billing/webhook", post(billing::stripe_webhook))
        // Human reviews
        .route(
            "/human-reviews",
            post(reviews::request_review).get(reviews::list_reviews),
        )
        // Info
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "policylens",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Insurance policy analysis API",
        "endpoints": {
            "POST /api/policies/upload": "Upload a policy PDF",
            "GET /api/policies": "List policies",
            "GET /api/policies/:id": "Get one policy",
            "DELETE /api/policies/:id": "Soft delete a policy",
            "POST /api/analyses": "Generate the analysis for a policy",
            "GET /api/analyses": "List analyses",
            "GET /api/analyses/:id": "Get one analysis",
            "POST /api/comparisons": "Compare two analyzed policies",
            "POST /api/billing/checkout": "Create a subscription checkout session",
            "POST /api/human-reviews": "Request a paid human review",
            "GET /api/user/me": "Current user"
        }
    }))
}
