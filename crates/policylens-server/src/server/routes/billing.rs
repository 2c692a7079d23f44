//! Billing endpoints: checkout sessions and the Stripe webhook
//!
//! The webhook is the source of truth for billing state; handlers mirror
//! provider objects into the subscriptions/payments tables and onto the user
//! profile.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{
    HumanReviewStatus, Payment, PaymentStatus, PaymentType, Subscription, SubscriptionPlan,
    SubscriptionStatus, User,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub plan: String,
}

/// Get the profile's Stripe customer, creating one on first use
pub async fn ensure_stripe_customer(state: &AppState, user: &User) -> Result<String> {
    let profile = state
        .db()
        .get_profile(user.id)?
        .ok_or_else(|| Error::not_found("User profile"))?;

    if let Some(customer_id) = profile.stripe_customer_id {
        return Ok(customer_id);
    }

    let customer_id = state
        .stripe()
        .create_customer(&user.email, user.name.as_deref())
        .await?;
    state.db().set_stripe_customer_id(user.id, &customer_id)?;
    tracing::info!("Created Stripe customer {} for user {}", customer_id, user.id);

    Ok(customer_id)
}

/// POST /api/billing/checkout - Create a subscription checkout session
pub async fn create_checkout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<serde_json::Value>> {
    let plan = SubscriptionPlan::parse(&request.plan)
        .ok_or_else(|| Error::validation("plan must be one of: ai_analyzer, ai_analyzer_plus"))?;

    let stripe_config = &state.config().stripe;
    let price_id = match plan {
        SubscriptionPlan::AiAnalyzer => &stripe_config.price_ai_analyzer,
        SubscriptionPlan::AiAnalyzerPlus => &stripe_config.price_ai_analyzer_plus,
    };
    if price_id.is_empty() {
        return Err(Error::Payment(format!(
            "No price configured for plan {}",
            plan.as_str()
        )));
    }

    let customer_id = ensure_stripe_customer(&state, &user).await?;

    let origin = &state.config().server.frontend_origin;
    let session = state
        .stripe()
        .create_subscription_checkout(
            &customer_id,
            price_id,
            &format!("{}/billing?checkout=success", origin),
            &format!("{}/billing?checkout=cancelled", origin),
        )
        .await?;

    Ok(Json(json!({
        "sessionId": session.id,
        "url": session.url,
    })))
}

/// GET /api/billing/subscription - Current mirrored subscription
pub async fn get_subscription(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<serde_json::Value>> {
    let subscription = state.db().get_subscription_for_user(user.id)?;
    Ok(Json(json!({ "subscription": subscription })))
}

/// POST /api/billing/webhook - Stripe webhook receiver
///
/// Unauthenticated route; the signature header is the authentication.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(Error::Unauthorized)?;

    state
        .stripe()
        .verify_webhook_signature(&body, signature)
        .map_err(|e| {
            tracing::warn!("Rejected webhook: {}", e);
            Error::Unauthorized
        })?;

    let event = state.stripe().parse_webhook_event(&body)?;
    tracing::info!("Stripe webhook: {} ({})", event.kind, event.id);

    match event.kind.as_str() {
        "checkout.session.completed" => handle_checkout_completed(&state, &event.data.object)?,
        "customer.subscription.created" | "customer.subscription.updated" => {
            handle_subscription_updated(&state, &event.data.object)?
        }
        "customer.subscription.deleted" => handle_subscription_deleted(&state, &event.data.object)?,
        "payment_intent.succeeded" => {
            handle_payment_intent(&state, &event.data.object, PaymentStatus::Succeeded)?
        }
        "payment_intent.payment_failed" => {
            handle_payment_intent(&state, &event.data.object, PaymentStatus::Failed)?
        }
        other => tracing::debug!("Ignoring webhook event type: {}", other),
    }

    Ok(Json(json!({ "received": true })))
}

fn str_field<'a>(object: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    object.get(key).and_then(|v| v.as_str())
}

fn resolve_user(state: &AppState, object: &serde_json::Value) -> Result<Option<Uuid>> {
    // Prefer explicit metadata, fall back to the customer mapping
    if let Some(user_id) = object
        .pointer("/metadata/user_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
    {
        return Ok(Some(user_id));
    }

    match str_field(object, "customer") {
        Some(customer_id) => state.db().user_id_for_stripe_customer(customer_id),
        None => Ok(None),
    }
}

/// A completed payment-mode checkout mirrors a payment and activates the
/// linked human review
fn handle_checkout_completed(state: &AppState, object: &serde_json::Value) -> Result<()> {
    if str_field(object, "mode") != Some("payment") {
        // Subscription checkouts are mirrored from subscription events
        return Ok(());
    }

    let Some(intent_id) = str_field(object, "payment_intent") else {
        tracing::warn!("Checkout session completed without a payment intent");
        return Ok(());
    };

    let Some(user_id) = resolve_user(state, object)? else {
        tracing::warn!("Checkout session completed for unknown customer");
        return Ok(());
    };

    let review_id = object
        .pointer("/metadata/human_review_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok());

    let now = Utc::now();
    let payment = Payment {
        id: Uuid::new_v4(),
        user_id,
        stripe_payment_intent_id: intent_id.to_string(),
        amount: object.get("amount_total").and_then(|v| v.as_i64()).unwrap_or(0),
        currency: str_field(object, "currency").unwrap_or("usd").to_string(),
        status: PaymentStatus::Succeeded,
        payment_type: if review_id.is_some() {
            PaymentType::HumanReview
        } else {
            PaymentType::OneTime
        },
        human_review_id: review_id,
        created_at: now,
        updated_at: now,
    };
    state.db().upsert_payment(&payment)?;

    if let Some(review_id) = review_id {
        state
            .db()
            .set_human_review_status(review_id, HumanReviewStatus::InProgress)?;
        tracing::info!("Human review {} paid and queued", review_id);
    }

    Ok(())
}

fn handle_subscription_updated(state: &AppState, object: &serde_json::Value) -> Result<()> {
    let Some(stripe_subscription_id) = str_field(object, "id") else {
        return Ok(());
    };
    let Some(customer_id) = str_field(object, "customer") else {
        return Ok(());
    };
    let Some(user_id) = state.db().user_id_for_stripe_customer(customer_id)? else {
        tracing::warn!("Subscription event for unknown customer {}", customer_id);
        return Ok(());
    };

    let status = match str_field(object, "status").unwrap_or("") {
        "active" => SubscriptionStatus::Active,
        "trialing" => SubscriptionStatus::Trialing,
        "past_due" | "unpaid" => SubscriptionStatus::PastDue,
        _ => SubscriptionStatus::Canceled,
    };

    let price_id = object
        .pointer("/items/data/0/price/id")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let plan = if price_id == state.config().stripe.price_ai_analyzer_plus {
        SubscriptionPlan::AiAnalyzerPlus
    } else {
        SubscriptionPlan::AiAnalyzer
    };

    let period_start = unix_ts(object, "current_period_start");
    let period_end = unix_ts(object, "current_period_end");
    let cancel_at_period_end = object
        .get("cancel_at_period_end")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    // Keep the row's identity stable across repeated events
    let existing = state.db().get_subscription_by_stripe_id(stripe_subscription_id)?;
    let now = Utc::now();
    let subscription = Subscription {
        id: existing.as_ref().map(|s| s.id).unwrap_or_else(Uuid::new_v4),
        user_id,
        stripe_subscription_id: stripe_subscription_id.to_string(),
        stripe_customer_id: customer_id.to_string(),
        status,
        plan,
        current_period_start: period_start,
        current_period_end: period_end,
        cancel_at_period_end,
        created_at: existing.map(|s| s.created_at).unwrap_or(now),
        updated_at: now,
    };
    state.db().upsert_subscription(&subscription)?;
    state
        .db()
        .set_profile_subscription(user_id, Some(status), Some(plan))?;

    tracing::info!(
        "Mirrored subscription {} for user {}: {:?}/{:?}",
        stripe_subscription_id,
        user_id,
        status,
        plan
    );

    Ok(())
}

fn handle_subscription_deleted(state: &AppState, object: &serde_json::Value) -> Result<()> {
    let Some(stripe_subscription_id) = str_field(object, "id") else {
        return Ok(());
    };

    let Some(mut subscription) = state
        .db()
        .get_subscription_by_stripe_id(stripe_subscription_id)?
    else {
        return Ok(());
    };

    subscription.status = SubscriptionStatus::Canceled;
    subscription.updated_at = Utc::now();
    state.db().upsert_subscription(&subscription)?;
    state.db().set_profile_subscription(
        subscription.user_id,
        Some(SubscriptionStatus::Canceled),
        Some(subscription.plan),
    )?;

    tracing::info!("Subscription {} canceled", stripe_subscription_id);
    Ok(())
}

fn handle_payment_intent(
    state: &AppState,
    object: &serde_json::Value,
    status: PaymentStatus,
) -> Result<()> {
    let Some(intent_id) = str_field(object, "id") else {
        return Ok(());
    };

    let Some(payment) = state.db().get_payment_by_intent(intent_id)? else {
        // Payments are created by checkout.session.completed; a bare intent
        // event for an unknown payment carries nothing to mirror
        tracing::debug!("Payment intent {} has no mirrored payment", intent_id);
        return Ok(());
    };

    state.db().set_payment_status(intent_id, status)?;

    if status == PaymentStatus::Succeeded {
        if let Some(review_id) = payment.human_review_id {
            state
                .db()
                .set_human_review_status(review_id, HumanReviewStatus::InProgress)?;
        }
    }

    Ok(())
}

fn unix_ts(object: &serde_json::Value, key: &str) -> DateTime<Utc> {
    object
        .get(key)
        .and_then(|v| v.as_i64())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::providers::email::MockEmailProvider;
    use crate::providers::llm::MockLlmProvider;
    use crate::providers::object_store::MockObjectStoreProvider;
    use crate::storage::Database;
    use crate::types::HumanReview;
    use std::sync::Arc;

    fn test_state() -> (AppState, User) {
        let db = Arc::new(Database::in_memory().unwrap());
        let user = db.create_user("billing@example.com", "hash", None).unwrap();
        db.set_stripe_customer_id(user.id, "cus_test").unwrap();

        let mut config = AppConfig::default();
        config.stripe.price_ai_analyzer = "price_basic".to_string();
        config.stripe.price_ai_analyzer_plus = "price_plus".to_string();

        let state = AppState::with_providers(
            config,
            db,
            Arc::new(MockObjectStoreProvider::new()),
            Arc::new(MockLlmProvider::new()),
            Arc::new(MockEmailProvider::new()),
        )
        .unwrap();

        (state, user)
    }

    #[test]
    fn test_subscription_updated_mirrors_row_and_profile() {
        let (state, user) = test_state();

        let object = json!({
            "id": "sub_test",
            "customer": "cus_test",
            "status": "active",
            "cancel_at_period_end": false,
            "current_period_start": 1_700_000_000,
            "current_period_end": 1_702_592_000,
            "items": {"data": [{"price": {"id": "price_plus"}}]}
        });
        handle_subscription_updated(&state, &object).unwrap();

        let sub = state.db().get_subscription_for_user(user.id).unwrap().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.plan, SubscriptionPlan::AiAnalyzerPlus);

        let profile = state.db().get_profile(user.id).unwrap().unwrap();
        assert_eq!(profile.subscription_status, Some(SubscriptionStatus::Active));
        assert_eq!(profile.subscription_plan, Some(SubscriptionPlan::AiAnalyzerPlus));

        // A later cancellation flips both mirrors
        handle_subscription_deleted(&state, &json!({"id": "sub_test"})).unwrap();
        let sub = state.db().get_subscription_for_user(user.id).unwrap().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Canceled);
        let profile = state.db().get_profile(user.id).unwrap().unwrap();
        assert_eq!(profile.subscription_status, Some(SubscriptionStatus::Canceled));
    }

    #[test]
    fn test_checkout_completed_activates_human_review() {
        let (state, user) = test_state();

        let review = HumanReview::new(user.id, None, None);
        state.db().insert_human_review(&review).unwrap();

        let object = json!({
            "mode": "payment",
            "payment_intent": "pi_review",
            "customer": "cus_test",
            "amount_total": 15000,
            "currency": "usd",
            "metadata": {
                "human_review_id": review.id.to_string(),
                "user_id": user.id.to_string()
            }
        });
        handle_checkout_completed(&state, &object).unwrap();

        let payment = state.db().get_payment_by_intent("pi_review").unwrap().unwrap();
        assert_eq!(payment.amount, 15000);
        assert_eq!(payment.payment_type, PaymentType::HumanReview);
        assert_eq!(payment.human_review_id, Some(review.id));

        let reviews = state.db().list_human_reviews(user.id).unwrap();
        assert_eq!(reviews[0].status, HumanReviewStatus::InProgress);
    }

    #[test]
    fn test_payment_failed_is_mirrored() {
        let (state, user) = test_state();

        let object = json!({
            "mode": "payment",
            "payment_intent": "pi_fail",
            "customer": "cus_test",
            "amount_total": 5000,
            "currency": "usd"
        });
        handle_checkout_completed(&state, &object).unwrap();
        handle_payment_intent(&state, &json!({"id": "pi_fail"}), PaymentStatus::Failed).unwrap();

        let payment = state.db().get_payment_by_intent("pi_fail").unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(payment.user_id, user.id);
    }

    #[test]
    fn test_unknown_customer_is_ignored() {
        let (state, _) = test_state();

        let object = json!({
            "id": "sub_orphan",
            "customer": "cus_unknown",
            "status": "active"
        });
        // No row is written and no error is raised
        handle_subscription_updated(&state, &object).unwrap();
        assert!(state.db().get_subscription_by_stripe_id("sub_orphan").unwrap().is_none());
    }
}
