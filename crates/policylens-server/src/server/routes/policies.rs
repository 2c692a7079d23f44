//! Policy upload and management endpoints

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::storage::PolicyFilter;
use crate::types::{Policy, PolicyStatus, PolicySummary};

const PDF_MIME: &str = "application/pdf";

/// Query parameters for listing policies
#[derive(Debug, Deserialize)]
pub struct ListPoliciesQuery {
    /// Filter by coverage start year
    pub year: Option<i32>,
    /// Filter by status
    pub status: Option<String>,
    /// Page size (1..=100, default 50)
    pub limit: Option<i64>,
    /// Page offset
    pub offset: Option<i64>,
}

/// Response for the policy list
#[derive(Debug, Serialize)]
pub struct PolicyListResponse {
    pub policies: Vec<PolicySummary>,
    pub total: usize,
    pub limit: i64,
    pub offset: i64,
}

/// GET /api/policies - List the user's policies
pub async fn list_policies(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListPoliciesQuery>,
) -> Result<Json<PolicyListResponse>> {
    let limit = query.limit.unwrap_or(50);
    if !(1..=100).contains(&limit) {
        return Err(Error::validation("limit must be between 1 and 100"));
    }

    let offset = query.offset.unwrap_or(0);
    if offset < 0 {
        return Err(Error::validation("offset must be >= 0"));
    }

    if let Some(year) = query.year {
        if !(1900..=2100).contains(&year) {
            return Err(Error::validation("year must be a valid year"));
        }
    }

    let status = query
        .status
        .as_deref()
        .map(|s| {
            PolicyStatus::parse(s).ok_or_else(|| {
                Error::validation("status must be one of: uploaded, processing, analyzed, failed")
            })
        })
        .transpose()?;

    let filter = PolicyFilter {
        year: query.year,
        status,
        limit,
        offset,
    };
    let (policies, total) = state.db().list_policies(user.id, &filter)?;

    Ok(Json(PolicyListResponse {
        policies: policies.iter().map(PolicySummary::from).collect(),
        total,
        limit,
        offset,
    }))
}

/// POST /api/policies/upload - Upload a PDF policy file
pub async fn upload_policy(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let max_size = state.config().server.max_upload_size;

    let mut file_name: Option<String> = None;
    let mut file_mime: Option<String> = None;
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut coverage_start: Option<String> = None;
    let mut coverage_end: Option<String> = None;
    let mut description: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| Error::validation("Failed to parse form data"))?
    {
        let name = field.name().unwrap_or("").to_string();

        if field.file_name().is_some() {
            file_name = Some(field.file_name().unwrap_or("policy.pdf").to_string());
            file_mime = field.content_type().map(|m| m.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|_| Error::validation("Failed to read uploaded file"))?;
            file_bytes = Some(bytes.to_vec());
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|_| Error::validation("Failed to parse form data"))?;
        match name.as_str() {
            "coverageStart" => coverage_start = Some(value),
            "coverageEnd" => coverage_end = Some(value),
            "description" => description = Some(value),
            _ => {}
        }
    }

    let file_bytes = file_bytes.ok_or_else(|| Error::validation("No file provided"))?;
    let original_file_name = file_name.unwrap_or_else(|| "policy.pdf".to_string());

    if file_mime.as_deref() != Some(PDF_MIME) {
        return Err(Error::InvalidFileType("File must be a PDF".to_string()));
    }

    if file_bytes.len() > max_size {
        return Err(Error::FileTooLarge {
            size: file_bytes.len(),
            limit: max_size,
        });
    }

    let coverage_start = coverage_start
        .ok_or_else(|| Error::validation("coverageStart is required"))?;
    let coverage_start = parse_coverage_date(&coverage_start, "coverageStart")?;

    let coverage_end = coverage_end
        .filter(|s| !s.is_empty())
        .map(|s| parse_coverage_date(&s, "coverageEnd"))
        .transpose()?;

    if let Some(end) = coverage_end {
        if end <= coverage_start {
            return Err(Error::validation("coverageEnd must be after coverageStart"));
        }
    }
    let coverage_end = coverage_end.unwrap_or_else(|| default_coverage_end(coverage_start));

    // Object key: {prefix}{user}/{file}/{sanitized original name}
    let file_id = Uuid::new_v4();
    let sanitized = sanitize_file_name(&original_file_name);
    let s3_key = format!(
        "{}{}/{}/{}",
        state.config().s3.key_prefix,
        user.id,
        file_id,
        sanitized
    );
    let bucket = state.object_store().bucket().to_string();

    tracing::info!("Uploading to object store: bucket={}, key={}", bucket, s3_key);
    state
        .object_store()
        .put_object(&s3_key, &file_bytes, PDF_MIME)
        .await?;

    let policy = Policy::new(
        user.id,
        file_id,
        original_file_name,
        s3_key,
        bucket,
        file_bytes.len() as i64,
        coverage_start,
        coverage_end,
        description.filter(|d| !d.is_empty()),
    );
    state.db().insert_policy(&policy)?;

    tracing::info!("Policy saved with id: {}", policy.id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "policy": PolicySummary::from(&policy),
        })),
    ))
}

/// GET /api/policies/:id - Get one policy
pub async fn get_policy(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PolicySummary>> {
    let policy = state
        .db()
        .get_policy(id, user.id)?
        .ok_or_else(|| Error::not_found("Policy"))?;

    Ok(Json(PolicySummary::from(&policy)))
}

/// DELETE /api/policies/:id - Soft delete a policy
pub async fn delete_policy(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let policy = state
        .db()
        .get_policy_any(id, user.id)?
        .ok_or_else(|| Error::not_found("Policy"))?;

    if policy.is_deleted {
        return Err(Error::validation("Policy already deleted"));
    }

    state.db().mark_policy_deleted(policy.id)?;
    tracing::info!("Policy {} soft deleted by user {}", policy.id, user.id);

    Ok(Json(json!({
        "success": true,
        "message": "Policy deleted successfully",
    })))
}

fn parse_coverage_date(value: &str, field: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| Error::validation(format!("{} must be in YYYY-MM-DD format", field)))
}

/// Default coverage end: one year after the start
fn default_coverage_end(start: NaiveDate) -> NaiveDate {
    start.checked_add_months(Months::new(12)).unwrap_or(start)
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_parsing() {
        assert!(parse_coverage_date("2026-01-31", "coverageStart").is_ok());
        assert!(parse_coverage_date("01/31/2026", "coverageStart").is_err());
        assert!(parse_coverage_date("2026-13-01", "coverageStart").is_err());
        assert!(parse_coverage_date("", "coverageStart").is_err());
    }

    #[test]
    fn test_default_coverage_end_is_one_year_out() {
        let start = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        assert_eq!(
            default_coverage_end(start),
            NaiveDate::from_ymd_opt(2027, 3, 15).unwrap()
        );

        // Leap day clamps to the end of February
        let leap = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(
            default_coverage_end(leap),
            NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()
        );
    }

    #[test]
    fn test_file_name_sanitization() {
        assert_eq!(sanitize_file_name("my policy (2026).pdf"), "my_policy__2026_.pdf");
        assert_eq!(sanitize_file_name("simple.pdf"), "simple.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
    }
}
