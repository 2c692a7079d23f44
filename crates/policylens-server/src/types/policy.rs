//! Uploaded policy document types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an uploaded policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyStatus {
    /// Stored in object storage, no analysis yet
    Uploaded,
    /// An analysis request is in flight
    Processing,
    /// Analysis completed and persisted
    Analyzed,
    /// Analysis pipeline failed
    Failed,
}

impl PolicyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Analyzed => "analyzed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uploaded" => Some(Self::Uploaded),
            "processing" => Some(Self::Processing),
            "analyzed" => Some(Self::Analyzed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// An uploaded insurance policy document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// Unique policy ID
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Internal file name (the upload UUID)
    pub file_name: String,
    /// Original file name as uploaded
    pub original_file_name: String,
    /// Object storage key
    pub s3_key: String,
    /// Object storage bucket
    pub s3_bucket: String,
    /// File size in bytes
    pub file_size: i64,
    /// MIME type (always application/pdf today)
    pub mime_type: String,
    /// Coverage start date
    pub coverage_start: NaiveDate,
    /// Coverage end date (defaults to one year after start)
    pub coverage_end: NaiveDate,
    /// Free-form description
    pub description: Option<String>,
    /// Lifecycle status
    pub status: PolicyStatus,
    /// Soft-delete flag
    pub is_deleted: bool,
    pub uploaded_at: DateTime<Utc>,
    /// Set when an analysis completes
    pub processed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Policy {
    /// Create a new policy record in the `uploaded` state
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: Uuid,
        file_id: Uuid,
        original_file_name: String,
        s3_key: String,
        s3_bucket: String,
        file_size: i64,
        coverage_start: NaiveDate,
        coverage_end: NaiveDate,
        description: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            file_name: file_id.to_string(),
            original_file_name,
            s3_key,
            s3_bucket,
            file_size,
            mime_type: "application/pdf".to_string(),
            coverage_start,
            coverage_end,
            description,
            status: PolicyStatus::Uploaded,
            is_deleted: false,
            uploaded_at: now,
            processed_at: None,
            updated_at: now,
        }
    }
}

/// Policy fields exposed in list and detail responses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySummary {
    pub id: Uuid,
    pub file_name: String,
    pub original_file_name: String,
    pub coverage_start: NaiveDate,
    pub coverage_end: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: PolicyStatus,
    pub file_size: i64,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl From<&Policy> for PolicySummary {
    fn from(policy: &Policy) -> Self {
        Self {
            id: policy.id,
            file_name: policy.file_name.clone(),
            original_file_name: policy.original_file_name.clone(),
            coverage_start: policy.coverage_start,
            coverage_end: policy.coverage_end,
            description: policy.description.clone(),
            status: policy.status,
            file_size: policy.file_size,
            uploaded_at: policy.uploaded_at,
            processed_at: policy.processed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            PolicyStatus::Uploaded,
            PolicyStatus::Processing,
            PolicyStatus::Analyzed,
            PolicyStatus::Failed,
        ] {
            assert_eq!(PolicyStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_new_policy_defaults() {
        let user_id = Uuid::new_v4();
        let file_id = Uuid::new_v4();
        let policy = Policy::new(
            user_id,
            file_id,
            "home.pdf".to_string(),
            format!("policies/{}/{}/home.pdf", user_id, file_id),
            "policy-docs".to_string(),
            1024,
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
            None,
        );
        assert_eq!(policy.status, PolicyStatus::Uploaded);
        assert!(!policy.is_deleted);
        assert!(policy.processed_at.is_none());
        assert_eq!(policy.file_name, file_id.to_string());
        assert_eq!(policy.mime_type, "application/pdf");
    }
}
