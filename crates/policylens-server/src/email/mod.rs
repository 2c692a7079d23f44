//! Outbound email: rendering, delivery, and the notification log
//!
//! Notification sends are fire-and-forget: the caller spawns them and a
//! failure only marks the log row, it never fails the request that triggered
//! the email.

pub mod templates;

use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::providers::EmailProvider;
use crate::storage::Database;
use crate::types::{EmailNotification, EmailNotificationType, Policy, User};

/// Renders, logs, and sends notification emails
pub struct Mailer {
    provider: Arc<dyn EmailProvider>,
    db: Arc<Database>,
    from: String,
    frontend_origin: String,
}

impl Mailer {
    /// Create a new mailer
    pub fn new(
        provider: Arc<dyn EmailProvider>,
        db: Arc<Database>,
        from: String,
        frontend_origin: String,
    ) -> Self {
        Self {
            provider,
            db,
            from,
            frontend_origin,
        }
    }

    /// Send the "analysis ready" notification and record it in the log
    pub async fn send_analysis_ready(
        &self,
        user: &User,
        policy: &Policy,
        analysis_id: Uuid,
    ) -> Result<()> {
        let notification = EmailNotification::pending(
            user.id,
            EmailNotificationType::AnalysisReady,
            Some(policy.id),
            Some(analysis_id),
            None,
        );
        self.db.insert_email_notification(&notification)?;

        let report_url = format!("{}/reports/{}", self.frontend_origin, analysis_id);
        let policy_url = format!("{}/policies/{}", self.frontend_origin, policy.id);
        let html = templates::analysis_ready(
            user.display_name(),
            &policy.original_file_name,
            &report_url,
            &policy_url,
        );
        let subject = format!(
            "Your insurance policy analysis is ready: {}",
            policy.original_file_name
        );

        self.deliver(&notification, &user.email, &subject, &html).await
    }

    /// Spawn the "analysis ready" send without blocking the caller
    pub fn spawn_analysis_ready(self: &Arc<Self>, user: User, policy: Policy, analysis_id: Uuid) {
        let mailer = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = mailer.send_analysis_ready(&user, &policy, analysis_id).await {
                tracing::error!("Failed to send analysis complete email (non-critical): {}", e);
            }
        });
    }

    /// Send the "comparison ready" notification and record it in the log
    pub async fn send_comparison_ready(
        &self,
        user: &User,
        comparison_id: Uuid,
        policy_file_name: &str,
    ) -> Result<()> {
        let notification = EmailNotification::pending(
            user.id,
            EmailNotificationType::ComparisonReady,
            None,
            None,
            Some(comparison_id),
        );
        self.db.insert_email_notification(&notification)?;

        let comparison_url = format!("{}/comparisons/{}", self.frontend_origin, comparison_id);
        let html =
            templates::comparison_ready(user.display_name(), policy_file_name, &comparison_url);
        let subject = format!("Your policy comparison is ready: {}", policy_file_name);

        self.deliver(&notification, &user.email, &subject, &html).await
    }

    /// Spawn the "comparison ready" send without blocking the caller
    pub fn spawn_comparison_ready(
        self: &Arc<Self>,
        user: User,
        comparison_id: Uuid,
        policy_file_name: String,
    ) {
        let mailer = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = mailer
                .send_comparison_ready(&user, comparison_id, &policy_file_name)
                .await
            {
                tracing::error!("Failed to send comparison ready email (non-critical): {}", e);
            }
        });
    }

    /// Send a password reset link
    ///
    /// Reset emails are account plumbing, not product notifications; they are
    /// not recorded in the notification log.
    pub async fn send_password_reset(&self, user: &User, reset_url: &str) -> Result<()> {
        let html = templates::password_reset(user.display_name(), reset_url);
        self.provider
            .send(&self.from, &user.email, "Reset your Policylens password", &html)
            .await?;
        Ok(())
    }

    /// Spawn a password reset send without blocking the caller
    pub fn spawn_password_reset(self: &Arc<Self>, user: User, reset_url: String) {
        let mailer = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = mailer.send_password_reset(&user, &reset_url).await {
                tracing::error!("Failed to send password reset email: {}", e);
            }
        });
    }

    async fn deliver(
        &self,
        notification: &EmailNotification,
        to: &str,
        subject: &str,
        html: &str,
    ) -> Result<()> {
        match self.provider.send(&self.from, to, subject, html).await {
            Ok(message_id) => {
                self.db.mark_email_sent(notification.id, &message_id)?;
                tracing::info!("Email sent to {} (message id {})", to, message_id);
                Ok(())
            }
            Err(e) => {
                self.db.mark_email_failed(notification.id)?;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::email::MockEmailProvider;
    use crate::types::{EmailNotificationStatus, PolicyStatus};
    use chrono::{NaiveDate, Utc};

    fn test_user(db: &Database) -> User {
        db.create_user("judy@example.com", "hash", Some("Judy")).unwrap()
    }

    fn test_policy(db: &Database, user: &User) -> Policy {
        let file_id = Uuid::new_v4();
        let policy = Policy::new(
            user.id,
            file_id,
            "auto.pdf".to_string(),
            format!("policies/{}/{}/auto.pdf", user.id, file_id),
            "policy-docs".to_string(),
            256,
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
            None,
        );
        db.insert_policy(&policy).unwrap();
        policy
    }

    #[tokio::test]
    async fn test_successful_send_marks_log_sent() {
        let db = Arc::new(Database::in_memory().unwrap());
        let user = test_user(&db);
        let policy = test_policy(&db, &user);
        db.set_policy_status(policy.id, PolicyStatus::Analyzed, Some(Utc::now())).unwrap();

        let mut provider = MockEmailProvider::new();
        provider
            .expect_send()
            .withf(|_, to, subject, html| {
                to == "judy@example.com"
                    && subject.contains("auto.pdf")
                    && html.contains("Hi Judy,")
            })
            .returning(|_, _, _, _| Ok("re_123".to_string()));

        let mailer = Mailer::new(
            Arc::new(provider),
            Arc::clone(&db),
            "Policylens <noreply@example.com>".to_string(),
            "https://app.example.com".to_string(),
        );

        mailer.send_analysis_ready(&user, &policy, Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_send_marks_log_failed() {
        let db = Arc::new(Database::in_memory().unwrap());
        let user = test_user(&db);
        let policy = test_policy(&db, &user);

        let mut provider = MockEmailProvider::new();
        provider
            .expect_send()
            .returning(|_, _, _, _| Err(crate::error::Error::Email("503".to_string())));

        let mailer = Mailer::new(
            Arc::new(provider),
            Arc::clone(&db),
            "Policylens <noreply@example.com>".to_string(),
            "https://app.example.com".to_string(),
        );

        let result = mailer.send_analysis_ready(&user, &policy, Uuid::new_v4()).await;
        assert!(result.is_err());

        // The pending log row was flipped to failed, not dropped
        let logged = db.list_email_notifications(user.id).unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].status, EmailNotificationStatus::Failed);
        assert!(logged[0].sent_at.is_none());
    }
}
