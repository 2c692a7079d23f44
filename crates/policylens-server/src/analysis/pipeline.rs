//! The upload-analyze pipeline
//!
//! Strictly sequential: fetch bytes from object storage, extract text, build
//! the prompt, call the LLM, strip fences, persist, flip status, fire the
//! notification email. Any failure after the status flip degrades the policy
//! to `failed`; there is no retry and no compensation.

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::extraction;
use crate::server::state::AppState;
use crate::types::{Analysis, Comparison, Policy, PolicyStatus, User};

use super::prompt::{PromptBuilder, ANALYST_SYSTEM};

/// Generate and persist the analysis for a policy
///
/// The duplicate check is an advisory pre-check query; concurrent requests
/// for the same policy race to the UNIQUE constraint on the analyses table.
pub async fn analyze_policy(state: &AppState, user: &User, policy_id: Uuid) -> Result<Analysis> {
    let db = state.db();

    let policy = db
        .get_policy(policy_id, user.id)?
        .ok_or_else(|| Error::not_found("Policy"))?;

    if db.get_analysis_for_policy(policy.id)?.is_some() {
        return Err(Error::validation("Analysis already exists for this policy"));
    }

    db.set_policy_status(policy.id, PolicyStatus::Processing, None)?;

    match generate_analysis(state, &policy).await {
        Ok(analysis) => {
            db.set_policy_status(policy.id, PolicyStatus::Analyzed, Some(Utc::now()))?;
            tracing::info!("Analysis {} stored for policy {}", analysis.id, policy.id);

            state
                .mailer()
                .spawn_analysis_ready(user.clone(), policy.clone(), analysis.id);

            Ok(analysis)
        }
        Err(e) => {
            tracing::error!("Analysis of policy {} failed: {}", policy.id, e);
            if let Err(status_err) = db.set_policy_status(policy.id, PolicyStatus::Failed, None) {
                tracing::error!("Failed to record failed status: {}", status_err);
            }
            Err(Error::processing(format!("Analysis failed: {}", e)))
        }
    }
}

async fn generate_analysis(state: &AppState, policy: &Policy) -> Result<Analysis> {
    tracing::info!(
        "Downloading policy document: bucket={}, key={}",
        policy.s3_bucket,
        policy.s3_key
    );
    let bytes = state.object_store().get_object(&policy.s3_key).await?;

    let text = extraction::extract_pdf_text(&bytes)?;
    tracing::info!(
        "Extracted {} characters from {}",
        text.len(),
        policy.original_file_name
    );

    let prompt = PromptBuilder::analysis_prompt(&text);
    let completion = state.llm().complete(ANALYST_SYSTEM, &prompt).await?;
    tracing::info!(
        "Completion finished: model={}, tokens={}",
        completion.model,
        completion.tokens_used
    );

    let report = PromptBuilder::strip_code_fence(&completion.text);
    let analysis = Analysis::new(policy.id, completion.model, completion.tokens_used, report);
    state.db().insert_analysis(&analysis)?;

    Ok(analysis)
}

/// Generate and persist a comparison between two analyzed policies
pub async fn compare_policies(
    state: &AppState,
    user: &User,
    previous_policy_id: Uuid,
    new_policy_id: Uuid,
) -> Result<Comparison> {
    if previous_policy_id == new_policy_id {
        return Err(Error::validation("Cannot compare a policy with itself"));
    }

    let db = state.db();

    let previous = db
        .get_policy(previous_policy_id, user.id)?
        .ok_or_else(|| Error::not_found("Previous policy"))?;
    let new = db
        .get_policy(new_policy_id, user.id)?
        .ok_or_else(|| Error::not_found("New policy"))?;

    let previous_analysis = db
        .get_analysis_for_policy(previous.id)?
        .ok_or_else(|| Error::validation("Previous policy has not been analyzed yet"))?;
    let new_analysis = db
        .get_analysis_for_policy(new.id)?
        .ok_or_else(|| Error::validation("New policy has not been analyzed yet"))?;

    let prompt = PromptBuilder::comparison_prompt(
        &previous_analysis.analysis_result,
        &new_analysis.analysis_result,
    );
    let completion = state.llm().complete(ANALYST_SYSTEM, &prompt).await?;

    let report = PromptBuilder::strip_code_fence(&completion.text);
    let changes_detected = PromptBuilder::extract_json_block(&report)
        .unwrap_or_else(|| serde_json::json!({}));

    let comparison = Comparison::new(
        user.id,
        previous.id,
        new.id,
        changes_detected,
        summarize(&report),
        completion.model,
        completion.tokens_used,
        report,
    );
    db.insert_comparison(&comparison)?;
    tracing::info!(
        "Comparison {} stored for policies {} -> {}",
        comparison.id,
        previous.id,
        new.id
    );

    state
        .mailer()
        .spawn_comparison_ready(user.clone(), comparison.id, new.original_file_name.clone());

    Ok(comparison)
}

/// First prose paragraph of the report, capped for the summary column
fn summarize(report: &str) -> String {
    let paragraph = report
        .split("\n\n")
        .map(str::trim)
        .find(|p| !p.is_empty() && !p.starts_with('#') && !p.starts_with("```"))
        .unwrap_or("");

    let summary: String = paragraph.chars().take(500).collect();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::providers::email::MockEmailProvider;
    use crate::providers::llm::MockLlmProvider;
    use crate::providers::object_store::MockObjectStoreProvider;
    use crate::providers::Completion;
    use crate::storage::Database;
    use chrono::NaiveDate;
    use std::sync::Arc;

    struct Fixture {
        state: AppState,
        user: User,
    }

    fn fixture(
        object_store: MockObjectStoreProvider,
        llm: MockLlmProvider,
    ) -> Fixture {
        let db = Arc::new(Database::in_memory().unwrap());
        let user = db.create_user("test@example.com", "hash", Some("Test")).unwrap();

        let mut email = MockEmailProvider::new();
        email.expect_send().returning(|_, _, _, _| Ok("re_test".to_string()));

        let state = AppState::with_providers(
            AppConfig::default(),
            db,
            Arc::new(object_store),
            Arc::new(llm),
            Arc::new(email),
        )
        .unwrap();

        Fixture { state, user }
    }

    fn insert_policy(state: &AppState, user: &User) -> Policy {
        let file_id = Uuid::new_v4();
        let policy = Policy::new(
            user.id,
            file_id,
            "home.pdf".to_string(),
            format!("policies/{}/{}/home.pdf", user.id, file_id),
            "policy-docs".to_string(),
            512,
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
            None,
        );
        state.db().insert_policy(&policy).unwrap();
        policy
    }

    #[tokio::test]
    async fn test_unreadable_document_fails_policy() {
        let mut object_store = MockObjectStoreProvider::new();
        object_store
            .expect_get_object()
            .returning(|_| Ok(b"not a pdf at all".to_vec()));

        // The LLM must never be called when extraction fails
        let llm = MockLlmProvider::new();

        let fx = fixture(object_store, llm);
        let policy = insert_policy(&fx.state, &fx.user);

        let err = analyze_policy(&fx.state, &fx.user, policy.id).await.unwrap_err();
        assert_eq!(err.code(), "PROCESSING_ERROR");

        let stored = fx.state.db().get_policy(policy.id, fx.user.id).unwrap().unwrap();
        assert_eq!(stored.status, PolicyStatus::Failed);
        assert!(fx.state.db().get_analysis_for_policy(policy.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_analysis_rejected_before_status_flip() {
        let object_store = MockObjectStoreProvider::new();
        let llm = MockLlmProvider::new();

        let fx = fixture(object_store, llm);
        let policy = insert_policy(&fx.state, &fx.user);

        let existing = Analysis::new(policy.id, "gpt-4o-mini".to_string(), 10, "# Done".to_string());
        fx.state.db().insert_analysis(&existing).unwrap();

        let err = analyze_policy(&fx.state, &fx.user, policy.id).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        // The pre-check fires before the processing flip
        let stored = fx.state.db().get_policy(policy.id, fx.user.id).unwrap().unwrap();
        assert_eq!(stored.status, PolicyStatus::Uploaded);
    }

    #[tokio::test]
    async fn test_missing_policy_is_not_found() {
        let fx = fixture(MockObjectStoreProvider::new(), MockLlmProvider::new());
        let err = analyze_policy(&fx.state, &fx.user, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_comparison_happy_path() {
        let object_store = MockObjectStoreProvider::new();

        let mut llm = MockLlmProvider::new();
        llm.expect_complete().returning(|_, _| {
            Ok(Completion {
                text: "# Changes\n\nThe deductible doubled.\n\n```json\n{\"premium_changes\": [\"+12%\"]}\n```"
                    .to_string(),
                model: "gpt-4o-mini".to_string(),
                tokens_used: 321,
            })
        });

        let fx = fixture(object_store, llm);
        let previous = insert_policy(&fx.state, &fx.user);
        let new = insert_policy(&fx.state, &fx.user);

        for policy in [&previous, &new] {
            let analysis = Analysis::new(policy.id, "gpt-4o-mini".to_string(), 10, "# Report".to_string());
            fx.state.db().insert_analysis(&analysis).unwrap();
        }

        let comparison = compare_policies(&fx.state, &fx.user, previous.id, new.id)
            .await
            .unwrap();

        assert_eq!(comparison.changes_detected["premium_changes"][0], "+12%");
        assert_eq!(comparison.summary, "The deductible doubled.");
        assert_eq!(comparison.ai_tokens_used, 321);

        let stored = fx.state.db().get_comparison(comparison.id, fx.user.id).unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn test_comparison_requires_analyzed_policies() {
        let fx = fixture(MockObjectStoreProvider::new(), MockLlmProvider::new());
        let previous = insert_policy(&fx.state, &fx.user);
        let new = insert_policy(&fx.state, &fx.user);

        let err = compare_policies(&fx.state, &fx.user, previous.id, new.id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let err = compare_policies(&fx.state, &fx.user, previous.id, previous.id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
