//! User identity and billing profile types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An authenticated user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID
    pub id: Uuid,
    /// Email address (unique)
    pub email: String,
    /// Display name
    pub name: Option<String>,
    /// Account creation timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Name to address the user by in emails
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("there")
    }
}

/// Billing extension of a user account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Unique profile ID
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Stripe customer ID, once one has been created
    pub stripe_customer_id: Option<String>,
    /// Mirrored subscription status
    pub subscription_status: Option<SubscriptionStatus>,
    /// Mirrored subscription plan
    pub subscription_plan: Option<SubscriptionPlan>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Subscription status mirrored from the payment provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Canceled,
    PastDue,
    Trialing,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Canceled => "canceled",
            Self::PastDue => "past_due",
            Self::Trialing => "trialing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "canceled" => Some(Self::Canceled),
            "past_due" => Some(Self::PastDue),
            "trialing" => Some(Self::Trialing),
            _ => None,
        }
    }
}

/// Subscription plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
    AiAnalyzer,
    AiAnalyzerPlus,
}

impl SubscriptionPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AiAnalyzer => "ai_analyzer",
            Self::AiAnalyzerPlus => "ai_analyzer_plus",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ai_analyzer" => Some(Self::AiAnalyzer),
            "ai_analyzer_plus" => Some(Self::AiAnalyzerPlus),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            SubscriptionStatus::Active,
            SubscriptionStatus::Canceled,
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Trialing,
        ] {
            assert_eq!(SubscriptionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SubscriptionStatus::parse("bogus"), None);
    }

    #[test]
    fn test_plan_round_trip() {
        assert_eq!(
            SubscriptionPlan::parse("ai_analyzer_plus"),
            Some(SubscriptionPlan::AiAnalyzerPlus)
        );
        assert_eq!(SubscriptionPlan::parse(""), None);
    }

    #[test]
    fn test_display_name_fallback() {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@b.com".to_string(),
            name: None,
            created_at: Utc::now(),
        };
        assert_eq!(user.display_name(), "there");
    }
}
