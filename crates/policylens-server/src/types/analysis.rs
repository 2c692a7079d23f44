//! LLM analysis and comparison report types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// LLM-generated markdown report, 1:1 with a policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    /// Unique analysis ID
    pub id: Uuid,
    /// Analyzed policy
    pub policy_id: Uuid,
    /// Model that produced the report
    pub ai_model: String,
    /// Total tokens consumed by the completion
    pub ai_tokens_used: i64,
    /// Full markdown report
    pub analysis_result: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Analysis {
    /// Create a new analysis record
    pub fn new(policy_id: Uuid, ai_model: String, ai_tokens_used: i64, analysis_result: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            policy_id,
            ai_model,
            ai_tokens_used,
            analysis_result,
            created_at: now,
            updated_at: now,
        }
    }
}

/// LLM-generated diff between two analyzed policies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    /// Unique comparison ID
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Older policy in the comparison
    pub previous_policy_id: Uuid,
    /// Newer policy in the comparison
    pub new_policy_id: Uuid,
    /// Structured change summary extracted from the report
    pub changes_detected: serde_json::Value,
    /// Short prose summary
    pub summary: String,
    /// Model that produced the report
    pub ai_model: String,
    /// Total tokens consumed
    pub ai_tokens_used: i64,
    /// Full markdown comparison report
    pub comparison_result: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comparison {
    /// Create a new comparison record
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: Uuid,
        previous_policy_id: Uuid,
        new_policy_id: Uuid,
        changes_detected: serde_json::Value,
        summary: String,
        ai_model: String,
        ai_tokens_used: i64,
        comparison_result: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            previous_policy_id,
            new_policy_id,
            changes_detected,
            summary,
            ai_model,
            ai_tokens_used,
            comparison_result,
            created_at: now,
            updated_at: now,
        }
    }
}
