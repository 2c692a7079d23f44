//! Outbound email notification log types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What an email notification was about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailNotificationType {
    AnalysisReady,
    ComparisonReady,
    HumanReviewReady,
    Billing,
}

impl EmailNotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnalysisReady => "analysis_ready",
            Self::ComparisonReady => "comparison_ready",
            Self::HumanReviewReady => "human_review_ready",
            Self::Billing => "billing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "analysis_ready" => Some(Self::AnalysisReady),
            "comparison_ready" => Some(Self::ComparisonReady),
            "human_review_ready" => Some(Self::HumanReviewReady),
            "billing" => Some(Self::Billing),
            _ => None,
        }
    }
}

/// Delivery status of a logged notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailNotificationStatus {
    Pending,
    Sent,
    Failed,
}

impl EmailNotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Log row for one outbound email
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub notification_type: EmailNotificationType,
    pub policy_id: Option<Uuid>,
    pub analysis_id: Option<Uuid>,
    pub comparison_id: Option<Uuid>,
    /// Provider message ID, once sent
    pub resend_email_id: Option<String>,
    pub status: EmailNotificationStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmailNotification {
    /// Create a pending notification log row
    pub fn pending(
        user_id: Uuid,
        notification_type: EmailNotificationType,
        policy_id: Option<Uuid>,
        analysis_id: Option<Uuid>,
        comparison_id: Option<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            notification_type,
            policy_id,
            analysis_id,
            comparison_id,
            resend_email_id: None,
            status: EmailNotificationStatus::Pending,
            sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
