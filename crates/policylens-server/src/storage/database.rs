//! SQLite database for users, policies, analyses, and billing state
//!
//! All application state lives here. Timestamps are stored as RFC 3339 text,
//! dates as YYYY-MM-DD text, and status columns are CHECK-constrained to the
//! enum values the API exposes.

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{
    Analysis, Comparison, EmailNotification, EmailNotificationStatus, EmailNotificationType,
    HumanReview, HumanReviewStatus, Payment, PaymentStatus, PaymentType, Policy, PolicyStatus,
    Subscription, SubscriptionPlan, SubscriptionStatus, User, UserProfile,
};

/// SQLite-backed application database
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// Filters for listing policies
#[derive(Debug, Clone, Default)]
pub struct PolicyFilter {
    /// Filter by coverage start year
    pub year: Option<i32>,
    /// Filter by status
    pub status: Option<PolicyStatus>,
    /// Page size
    pub limit: i64,
    /// Page offset
    pub offset: i64,
}

impl Database {
    /// Create or open the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::Database(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
        "#,
        )
        .map_err(|e| Error::Database(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                name TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                token_hash TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                expires_at TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);

            CREATE TABLE IF NOT EXISTS password_resets (
                token_hash TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                expires_at TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_profiles (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
                stripe_customer_id TEXT,
                subscription_status TEXT
                    CHECK (subscription_status IN ('active','canceled','past_due','trialing')),
                subscription_plan TEXT
                    CHECK (subscription_plan IN ('ai_analyzer','ai_analyzer_plus')),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS policies (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                file_name TEXT NOT NULL,
                original_file_name TEXT NOT NULL,
                s3_key TEXT NOT NULL,
                s3_bucket TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                mime_type TEXT NOT NULL DEFAULT 'application/pdf',
                coverage_start TEXT NOT NULL,
                coverage_end TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'uploaded'
                    CHECK (status IN ('uploaded','processing','analyzed','failed')),
                is_deleted INTEGER NOT NULL DEFAULT 0,
                uploaded_at TEXT NOT NULL,
                processed_at TEXT,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_policies_user_id ON policies(user_id);
            CREATE INDEX IF NOT EXISTS idx_policies_status ON policies(status);

            CREATE TABLE IF NOT EXISTS analyses (
                id TEXT PRIMARY KEY,
                policy_id TEXT NOT NULL UNIQUE REFERENCES policies(id) ON DELETE CASCADE,
                ai_model TEXT NOT NULL,
                ai_tokens_used INTEGER NOT NULL,
                analysis_result TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS comparisons (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                previous_policy_id TEXT NOT NULL REFERENCES policies(id) ON DELETE CASCADE,
                new_policy_id TEXT NOT NULL REFERENCES policies(id) ON DELETE CASCADE,
                changes_detected TEXT NOT NULL,
                summary TEXT NOT NULL,
                ai_model TEXT NOT NULL,
                ai_tokens_used INTEGER NOT NULL,
                comparison_result TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_comparisons_user_id ON comparisons(user_id);

            CREATE TABLE IF NOT EXISTS human_reviews (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                policy_id TEXT REFERENCES policies(id) ON DELETE CASCADE,
                analysis_id TEXT REFERENCES analyses(id) ON DELETE CASCADE,
                comparison_id TEXT REFERENCES comparisons(id) ON DELETE CASCADE,
                status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending','in_progress','completed','cancelled')),
                requested_at TEXT NOT NULL,
                completed_at TEXT,
                reviewer_notes TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_human_reviews_user_id ON human_reviews(user_id);

            CREATE TABLE IF NOT EXISTS subscriptions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
                stripe_subscription_id TEXT NOT NULL UNIQUE,
                stripe_customer_id TEXT NOT NULL,
                status TEXT NOT NULL
                    CHECK (status IN ('active','canceled','past_due','trialing')),
                plan TEXT NOT NULL
                    CHECK (plan IN ('ai_analyzer','ai_analyzer_plus')),
                current_period_start TEXT NOT NULL,
                current_period_end TEXT NOT NULL,
                cancel_at_period_end INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS payments (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                stripe_payment_intent_id TEXT NOT NULL UNIQUE,
                amount INTEGER NOT NULL,
                currency TEXT NOT NULL DEFAULT 'usd',
                status TEXT NOT NULL
                    CHECK (status IN ('pending','succeeded','failed','refunded')),
                type TEXT NOT NULL
                    CHECK (type IN ('subscription','human_review','one_time')),
                human_review_id TEXT REFERENCES human_reviews(id) ON DELETE SET NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_payments_user_id ON payments(user_id);

            CREATE TABLE IF NOT EXISTS email_notifications (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                type TEXT NOT NULL
                    CHECK (type IN ('analysis_ready','comparison_ready','human_review_ready','billing')),
                policy_id TEXT REFERENCES policies(id) ON DELETE CASCADE,
                analysis_id TEXT REFERENCES analyses(id) ON DELETE CASCADE,
                comparison_id TEXT REFERENCES comparisons(id) ON DELETE CASCADE,
                resend_email_id TEXT,
                status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending','sent','failed')),
                sent_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_email_notifications_user_id ON email_notifications(user_id);
        "#,
        )
        .map_err(|e| Error::Database(format!("Failed to run migrations: {}", e)))?;

        tracing::info!("Database migrations complete");
        Ok(())
    }

    /// Cheap liveness probe for the readiness endpoint
    pub fn health_check(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.query_row("SELECT 1", [], |_| Ok(()))
            .map_err(|e| Error::Database(format!("Health check failed: {}", e)))
    }

    // ==================== Users ====================

    /// Create a user and their empty billing profile
    pub fn create_user(&self, email: &str, password_hash: &str, name: Option<&str>) -> Result<User> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let user = User {
            id: Uuid::new_v4(),
            email: email.to_lowercase(),
            name: name.map(|n| n.to_string()),
            created_at: Utc::now(),
        };

        let inserted = tx.execute(
            "INSERT INTO users (id, email, password_hash, name, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id.to_string(),
                user.email,
                password_hash,
                user.name,
                user.created_at.to_rfc3339(),
            ],
        );

        if let Err(e) = inserted {
            if is_unique_violation(&e) {
                return Err(Error::validation("Email already registered"));
            }
            return Err(Error::Database(format!("Failed to create user: {}", e)));
        }

        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO user_profiles (id, user_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![Uuid::new_v4().to_string(), user.id.to_string(), now, now],
        )
        .map_err(|e| Error::Database(format!("Failed to create user profile: {}", e)))?;

        tx.commit()
            .map_err(|e| Error::Database(format!("Failed to commit user: {}", e)))?;

        Ok(user)
    }

    /// Get a user and their password hash by email
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<(User, String)>> {
        let conn = self.conn.lock();

        conn.query_row(
            "SELECT id, email, name, created_at, password_hash FROM users WHERE email = ?1",
            params![email.to_lowercase()],
            |row| {
                let user = row_to_user(row)?;
                let hash: String = row.get(4)?;
                Ok((user, hash))
            },
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get user: {}", e)))
    }

    /// Get a user by ID
    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let conn = self.conn.lock();

        conn.query_row(
            "SELECT id, email, name, created_at FROM users WHERE id = ?1",
            params![id.to_string()],
            row_to_user,
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get user: {}", e)))
    }

    /// Replace a user's password hash
    pub fn update_user_password(&self, user_id: Uuid, password_hash: &str) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "UPDATE users SET password_hash = ?2 WHERE id = ?1",
            params![user_id.to_string(), password_hash],
        )
        .map_err(|e| Error::Database(format!("Failed to update password: {}", e)))?;

        Ok(())
    }

    // ==================== Sessions ====================

    /// Record a new session
    pub fn create_session(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO sessions (token_hash, user_id, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                token_hash,
                user_id.to_string(),
                expires_at.to_rfc3339(),
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Database(format!("Failed to create session: {}", e)))?;

        Ok(())
    }

    /// Resolve a session token digest to its user, if the session is live
    pub fn session_user(&self, token_hash: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();

        conn.query_row(
            r#"
            SELECT u.id, u.email, u.name, u.created_at
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token_hash = ?1 AND s.expires_at > ?2
            "#,
            params![token_hash, Utc::now().to_rfc3339()],
            row_to_user,
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to look up session: {}", e)))
    }

    /// Delete one session
    pub fn delete_session(&self, token_hash: &str) -> Result<bool> {
        let conn = self.conn.lock();

        let count = conn
            .execute("DELETE FROM sessions WHERE token_hash = ?1", params![token_hash])
            .map_err(|e| Error::Database(format!("Failed to delete session: {}", e)))?;

        Ok(count > 0)
    }

    /// Delete every session belonging to a user (used after password reset)
    pub fn delete_sessions_for_user(&self, user_id: Uuid) -> Result<usize> {
        let conn = self.conn.lock();

        conn.execute(
            "DELETE FROM sessions WHERE user_id = ?1",
            params![user_id.to_string()],
        )
        .map_err(|e| Error::Database(format!("Failed to delete sessions: {}", e)))
    }

    // ==================== Password resets ====================

    /// Record a single-use password reset token
    pub fn create_password_reset(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO password_resets (token_hash, user_id, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                token_hash,
                user_id.to_string(),
                expires_at.to_rfc3339(),
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Database(format!("Failed to create password reset: {}", e)))?;

        Ok(())
    }

    /// Consume a reset token: returns the user ID if the token was live, and
    /// deletes it either way
    pub fn consume_password_reset(&self, token_hash: &str) -> Result<Option<Uuid>> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let row: Option<(String, String)> = tx
            .query_row(
                "SELECT user_id, expires_at FROM password_resets WHERE token_hash = ?1",
                params![token_hash],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| Error::Database(format!("Failed to look up reset token: {}", e)))?;

        tx.execute(
            "DELETE FROM password_resets WHERE token_hash = ?1",
            params![token_hash],
        )
        .map_err(|e| Error::Database(format!("Failed to delete reset token: {}", e)))?;

        tx.commit()
            .map_err(|e| Error::Database(format!("Failed to commit: {}", e)))?;

        let Some((user_id, expires_at)) = row else {
            return Ok(None);
        };

        if parse_ts(&expires_at) <= Utc::now() {
            return Ok(None);
        }

        Ok(Uuid::parse_str(&user_id).ok())
    }

    // ==================== User profiles ====================

    /// Get a user's billing profile
    pub fn get_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
        let conn = self.conn.lock();

        conn.query_row(
            r#"
            SELECT id, user_id, stripe_customer_id, subscription_status, subscription_plan,
                   created_at, updated_at
            FROM user_profiles WHERE user_id = ?1
            "#,
            params![user_id.to_string()],
            row_to_profile,
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get profile: {}", e)))
    }

    /// Attach a Stripe customer ID to a profile
    pub fn set_stripe_customer_id(&self, user_id: Uuid, customer_id: &str) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "UPDATE user_profiles SET stripe_customer_id = ?2, updated_at = ?3 WHERE user_id = ?1",
            params![user_id.to_string(), customer_id, Utc::now().to_rfc3339()],
        )
        .map_err(|e| Error::Database(format!("Failed to set stripe customer: {}", e)))?;

        Ok(())
    }

    /// Mirror subscription state onto the profile
    pub fn set_profile_subscription(
        &self,
        user_id: Uuid,
        status: Option<SubscriptionStatus>,
        plan: Option<SubscriptionPlan>,
    ) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            UPDATE user_profiles
            SET subscription_status = ?2, subscription_plan = ?3, updated_at = ?4
            WHERE user_id = ?1
            "#,
            params![
                user_id.to_string(),
                status.map(|s| s.as_str()),
                plan.map(|p| p.as_str()),
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Database(format!("Failed to update profile subscription: {}", e)))?;

        Ok(())
    }

    // ==================== Policies ====================

    /// Insert an uploaded policy record
    pub fn insert_policy(&self, policy: &Policy) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT INTO policies (
                id, user_id, file_name, original_file_name, s3_key, s3_bucket,
                file_size, mime_type, coverage_start, coverage_end, description,
                status, is_deleted, uploaded_at, processed_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
            params![
                policy.id.to_string(),
                policy.user_id.to_string(),
                policy.file_name,
                policy.original_file_name,
                policy.s3_key,
                policy.s3_bucket,
                policy.file_size,
                policy.mime_type,
                policy.coverage_start.to_string(),
                policy.coverage_end.to_string(),
                policy.description,
                policy.status.as_str(),
                policy.is_deleted as i64,
                policy.uploaded_at.to_rfc3339(),
                policy.processed_at.map(|t| t.to_rfc3339()),
                policy.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Database(format!("Failed to insert policy: {}", e)))?;

        Ok(())
    }

    /// Get a non-deleted policy owned by the given user
    pub fn get_policy(&self, id: Uuid, user_id: Uuid) -> Result<Option<Policy>> {
        let conn = self.conn.lock();

        conn.query_row(
            "SELECT * FROM policies WHERE id = ?1 AND user_id = ?2 AND is_deleted = 0",
            params![id.to_string(), user_id.to_string()],
            row_to_policy,
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get policy: {}", e)))
    }

    /// Get a policy owned by the given user, including soft-deleted ones
    pub fn get_policy_any(&self, id: Uuid, user_id: Uuid) -> Result<Option<Policy>> {
        let conn = self.conn.lock();

        conn.query_row(
            "SELECT * FROM policies WHERE id = ?1 AND user_id = ?2",
            params![id.to_string(), user_id.to_string()],
            row_to_policy,
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get policy: {}", e)))
    }

    /// List a user's non-deleted policies, newest upload first, with the total
    /// matching count before pagination
    pub fn list_policies(&self, user_id: Uuid, filter: &PolicyFilter) -> Result<(Vec<Policy>, usize)> {
        let conn = self.conn.lock();

        // coverage_start is YYYY-MM-DD text, so the year filter is a prefix
        // compare; empty filter strings disable their clause
        let where_clause = "WHERE user_id = ?1 AND is_deleted = 0 \
             AND (?2 = '' OR status = ?2) \
             AND (?3 = '' OR substr(coverage_start, 1, 4) = ?3)";

        let status = filter.status.map(|s| s.as_str().to_string()).unwrap_or_default();
        let year = filter.year.map(|y| format!("{:04}", y)).unwrap_or_default();

        let total: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM policies {}", where_clause),
                params![user_id.to_string(), status, year],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("Failed to count policies: {}", e)))?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT * FROM policies {} ORDER BY uploaded_at DESC LIMIT ?4 OFFSET ?5",
                where_clause
            ))
            .map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))?;

        let policies = stmt
            .query_map(
                params![user_id.to_string(), status, year, filter.limit, filter.offset],
                row_to_policy,
            )
            .map_err(|e| Error::Database(format!("Failed to list policies: {}", e)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok((policies, total as usize))
    }

    /// Soft delete a policy
    pub fn mark_policy_deleted(&self, id: Uuid) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "UPDATE policies SET is_deleted = 1, updated_at = ?2 WHERE id = ?1",
            params![id.to_string(), Utc::now().to_rfc3339()],
        )
        .map_err(|e| Error::Database(format!("Failed to delete policy: {}", e)))?;

        Ok(())
    }

    /// Flip a policy's lifecycle status
    pub fn set_policy_status(
        &self,
        id: Uuid,
        status: PolicyStatus,
        processed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            UPDATE policies
            SET status = ?2,
                processed_at = COALESCE(?3, processed_at),
                updated_at = ?4
            WHERE id = ?1
            "#,
            params![
                id.to_string(),
                status.as_str(),
                processed_at.map(|t| t.to_rfc3339()),
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Database(format!("Failed to update policy status: {}", e)))?;

        Ok(())
    }

    // ==================== Analyses ====================

    /// Insert an analysis; fails with a validation error if one already exists
    /// for the policy
    pub fn insert_analysis(&self, analysis: &Analysis) -> Result<()> {
        let conn = self.conn.lock();

        let inserted = conn.execute(
            r#"
            INSERT INTO analyses (
                id, policy_id, ai_model, ai_tokens_used, analysis_result, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                analysis.id.to_string(),
                analysis.policy_id.to_string(),
                analysis.ai_model,
                analysis.ai_tokens_used,
                analysis.analysis_result,
                analysis.created_at.to_rfc3339(),
                analysis.updated_at.to_rfc3339(),
            ],
        );

        match inserted {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                Err(Error::validation("Analysis already exists for this policy"))
            }
            Err(e) => Err(Error::Database(format!("Failed to insert analysis: {}", e))),
        }
    }

    /// Get the analysis for a policy, if any
    pub fn get_analysis_for_policy(&self, policy_id: Uuid) -> Result<Option<Analysis>> {
        let conn = self.conn.lock();

        conn.query_row(
            "SELECT * FROM analyses WHERE policy_id = ?1",
            params![policy_id.to_string()],
            row_to_analysis,
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get analysis: {}", e)))
    }

    /// List all analyses over a user's non-deleted policies, newest first
    pub fn list_analyses(&self, user_id: Uuid) -> Result<Vec<(Analysis, Policy)>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare(
                r#"
                SELECT a.id, a.policy_id, a.ai_model, a.ai_tokens_used, a.analysis_result,
                       a.created_at, a.updated_at, p.*
                FROM analyses a
                JOIN policies p ON p.id = a.policy_id
                WHERE p.user_id = ?1 AND p.is_deleted = 0
                ORDER BY a.created_at DESC
                "#,
            )
            .map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![user_id.to_string()], |row| {
                let analysis = row_to_analysis(row)?;
                let policy = row_to_policy_at(row, 7)?;
                Ok((analysis, policy))
            })
            .map_err(|e| Error::Database(format!("Failed to list analyses: {}", e)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(rows)
    }

    /// Get one analysis (with its policy) owned by the given user
    pub fn get_analysis(&self, id: Uuid, user_id: Uuid) -> Result<Option<(Analysis, Policy)>> {
        let conn = self.conn.lock();

        conn.query_row(
            r#"
            SELECT a.id, a.policy_id, a.ai_model, a.ai_tokens_used, a.analysis_result,
                   a.created_at, a.updated_at, p.*
            FROM analyses a
            JOIN policies p ON p.id = a.policy_id
            WHERE a.id = ?1 AND p.user_id = ?2 AND p.is_deleted = 0
            "#,
            params![id.to_string(), user_id.to_string()],
            |row| {
                let analysis = row_to_analysis(row)?;
                let policy = row_to_policy_at(row, 7)?;
                Ok((analysis, policy))
            },
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get analysis: {}", e)))
    }

    // ==================== Comparisons ====================

    /// Insert a comparison record
    pub fn insert_comparison(&self, comparison: &Comparison) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT INTO comparisons (
                id, user_id, previous_policy_id, new_policy_id, changes_detected,
                summary, ai_model, ai_tokens_used, comparison_result, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                comparison.id.to_string(),
                comparison.user_id.to_string(),
                comparison.previous_policy_id.to_string(),
                comparison.new_policy_id.to_string(),
                comparison.changes_detected.to_string(),
                comparison.summary,
                comparison.ai_model,
                comparison.ai_tokens_used,
                comparison.comparison_result,
                comparison.created_at.to_rfc3339(),
                comparison.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Database(format!("Failed to insert comparison: {}", e)))?;

        Ok(())
    }

    /// List a user's comparisons, newest first
    pub fn list_comparisons(&self, user_id: Uuid) -> Result<Vec<Comparison>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare("SELECT * FROM comparisons WHERE user_id = ?1 ORDER BY created_at DESC")
            .map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))?;

        let comparisons = stmt
            .query_map(params![user_id.to_string()], row_to_comparison)
            .map_err(|e| Error::Database(format!("Failed to list comparisons: {}", e)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(comparisons)
    }

    /// Get one comparison owned by the given user
    pub fn get_comparison(&self, id: Uuid, user_id: Uuid) -> Result<Option<Comparison>> {
        let conn = self.conn.lock();

        conn.query_row(
            "SELECT * FROM comparisons WHERE id = ?1 AND user_id = ?2",
            params![id.to_string(), user_id.to_string()],
            row_to_comparison,
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get comparison: {}", e)))
    }

    // ==================== Human reviews ====================

    /// Insert a review request
    pub fn insert_human_review(&self, review: &HumanReview) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT INTO human_reviews (
                id, user_id, policy_id, analysis_id, comparison_id, status,
                requested_at, completed_at, reviewer_notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                review.id.to_string(),
                review.user_id.to_string(),
                review.policy_id.map(|id| id.to_string()),
                review.analysis_id.map(|id| id.to_string()),
                review.comparison_id.map(|id| id.to_string()),
                review.status.as_str(),
                review.requested_at.to_rfc3339(),
                review.completed_at.map(|t| t.to_rfc3339()),
                review.reviewer_notes,
                review.created_at.to_rfc3339(),
                review.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Database(format!("Failed to insert human review: {}", e)))?;

        Ok(())
    }

    /// List a user's review requests, newest first
    pub fn list_human_reviews(&self, user_id: Uuid) -> Result<Vec<HumanReview>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare("SELECT * FROM human_reviews WHERE user_id = ?1 ORDER BY requested_at DESC")
            .map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))?;

        let reviews = stmt
            .query_map(params![user_id.to_string()], row_to_human_review)
            .map_err(|e| Error::Database(format!("Failed to list human reviews: {}", e)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(reviews)
    }

    /// Update a review's status
    pub fn set_human_review_status(&self, id: Uuid, status: HumanReviewStatus) -> Result<()> {
        let conn = self.conn.lock();

        let completed_at = matches!(status, HumanReviewStatus::Completed)
            .then(|| Utc::now().to_rfc3339());

        conn.execute(
            r#"
            UPDATE human_reviews
            SET status = ?2, completed_at = COALESCE(?3, completed_at), updated_at = ?4
            WHERE id = ?1
            "#,
            params![id.to_string(), status.as_str(), completed_at, Utc::now().to_rfc3339()],
        )
        .map_err(|e| Error::Database(format!("Failed to update human review: {}", e)))?;

        Ok(())
    }

    // ==================== Subscriptions ====================

    /// Insert or update the mirrored subscription
    pub fn upsert_subscription(&self, sub: &Subscription) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT INTO subscriptions (
                id, user_id, stripe_subscription_id, stripe_customer_id, status, plan,
                current_period_start, current_period_end, cancel_at_period_end,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(stripe_subscription_id) DO UPDATE SET
                status = excluded.status,
                plan = excluded.plan,
                current_period_start = excluded.current_period_start,
                current_period_end = excluded.current_period_end,
                cancel_at_period_end = excluded.cancel_at_period_end,
                updated_at = excluded.updated_at
            "#,
            params![
                sub.id.to_string(),
                sub.user_id.to_string(),
                sub.stripe_subscription_id,
                sub.stripe_customer_id,
                sub.status.as_str(),
                sub.plan.as_str(),
                sub.current_period_start.to_rfc3339(),
                sub.current_period_end.to_rfc3339(),
                sub.cancel_at_period_end as i64,
                sub.created_at.to_rfc3339(),
                sub.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Database(format!("Failed to upsert subscription: {}", e)))?;

        Ok(())
    }

    /// Get the user's mirrored subscription, if any
    pub fn get_subscription_for_user(&self, user_id: Uuid) -> Result<Option<Subscription>> {
        let conn = self.conn.lock();

        conn.query_row(
            "SELECT * FROM subscriptions WHERE user_id = ?1",
            params![user_id.to_string()],
            row_to_subscription,
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get subscription: {}", e)))
    }

    /// Find a subscription by its provider ID
    pub fn get_subscription_by_stripe_id(&self, stripe_id: &str) -> Result<Option<Subscription>> {
        let conn = self.conn.lock();

        conn.query_row(
            "SELECT * FROM subscriptions WHERE stripe_subscription_id = ?1",
            params![stripe_id],
            row_to_subscription,
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get subscription: {}", e)))
    }

    /// Resolve a Stripe customer ID back to a user
    pub fn user_id_for_stripe_customer(&self, customer_id: &str) -> Result<Option<Uuid>> {
        let conn = self.conn.lock();

        let row: Option<String> = conn
            .query_row(
                "SELECT user_id FROM user_profiles WHERE stripe_customer_id = ?1",
                params![customer_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::Database(format!("Failed to look up customer: {}", e)))?;

        Ok(row.and_then(|s| Uuid::parse_str(&s).ok()))
    }

    // ==================== Payments ====================

    /// Insert or update a payment mirrored from the provider
    pub fn upsert_payment(&self, payment: &Payment) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT INTO payments (
                id, user_id, stripe_payment_intent_id, amount, currency, status, type,
                human_review_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(stripe_payment_intent_id) DO UPDATE SET
                status = excluded.status,
                amount = excluded.amount,
                updated_at = excluded.updated_at
            "#,
            params![
                payment.id.to_string(),
                payment.user_id.to_string(),
                payment.stripe_payment_intent_id,
                payment.amount,
                payment.currency,
                payment.status.as_str(),
                payment.payment_type.as_str(),
                payment.human_review_id.map(|id| id.to_string()),
                payment.created_at.to_rfc3339(),
                payment.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Database(format!("Failed to upsert payment: {}", e)))?;

        Ok(())
    }

    /// Find a payment by its provider intent ID
    pub fn get_payment_by_intent(&self, intent_id: &str) -> Result<Option<Payment>> {
        let conn = self.conn.lock();

        conn.query_row(
            "SELECT * FROM payments WHERE stripe_payment_intent_id = ?1",
            params![intent_id],
            row_to_payment,
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get payment: {}", e)))
    }

    /// Update a payment's status by provider intent ID
    pub fn set_payment_status(&self, intent_id: &str, status: PaymentStatus) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "UPDATE payments SET status = ?2, updated_at = ?3 WHERE stripe_payment_intent_id = ?1",
            params![intent_id, status.as_str(), Utc::now().to_rfc3339()],
        )
        .map_err(|e| Error::Database(format!("Failed to update payment: {}", e)))?;

        Ok(())
    }

    // ==================== Email notifications ====================

    /// Log an outbound email as pending
    pub fn insert_email_notification(&self, notification: &EmailNotification) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT INTO email_notifications (
                id, user_id, type, policy_id, analysis_id, comparison_id,
                resend_email_id, status, sent_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                notification.id.to_string(),
                notification.user_id.to_string(),
                notification.notification_type.as_str(),
                notification.policy_id.map(|id| id.to_string()),
                notification.analysis_id.map(|id| id.to_string()),
                notification.comparison_id.map(|id| id.to_string()),
                notification.resend_email_id,
                notification.status.as_str(),
                notification.sent_at.map(|t| t.to_rfc3339()),
                notification.created_at.to_rfc3339(),
                notification.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Database(format!("Failed to insert email notification: {}", e)))?;

        Ok(())
    }

    /// Mark a logged email as sent
    pub fn mark_email_sent(&self, id: Uuid, resend_email_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r#"
            UPDATE email_notifications
            SET status = 'sent', resend_email_id = ?2, sent_at = ?3, updated_at = ?3
            WHERE id = ?1
            "#,
            params![id.to_string(), resend_email_id, now],
        )
        .map_err(|e| Error::Database(format!("Failed to mark email sent: {}", e)))?;

        Ok(())
    }

    /// Mark a logged email as failed
    pub fn mark_email_failed(&self, id: Uuid) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "UPDATE email_notifications SET status = 'failed', updated_at = ?2 WHERE id = ?1",
            params![id.to_string(), Utc::now().to_rfc3339()],
        )
        .map_err(|e| Error::Database(format!("Failed to mark email failed: {}", e)))?;

        Ok(())
    }

    /// List a user's logged notifications, newest first
    pub fn list_email_notifications(&self, user_id: Uuid) -> Result<Vec<EmailNotification>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare("SELECT * FROM email_notifications WHERE user_id = ?1 ORDER BY created_at DESC")
            .map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))?;

        let notifications = stmt
            .query_map(params![user_id.to_string()], row_to_email_notification)
            .map_err(|e| Error::Database(format!("Failed to list email notifications: {}", e)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(notifications)
    }

    /// Get a logged notification (used in tests and admin tooling)
    pub fn get_email_notification(&self, id: Uuid) -> Result<Option<EmailNotification>> {
        let conn = self.conn.lock();

        conn.query_row(
            "SELECT * FROM email_notifications WHERE id = ?1",
            params![id.to_string()],
            row_to_email_notification,
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get email notification: {}", e)))
    }
}

// Helper functions

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_opt_ts(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|d| d.with_timezone(&Utc))
            .ok()
    })
}

fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_default()
}

fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_default()
}

fn parse_opt_uuid(s: Option<String>) -> Option<Uuid> {
    s.and_then(|s| Uuid::parse_str(&s).ok())
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let email: String = row.get(1)?;
    let name: Option<String> = row.get(2)?;
    let created_at: String = row.get(3)?;

    Ok(User {
        id: parse_uuid(&id),
        email,
        name,
        created_at: parse_ts(&created_at),
    })
}

fn row_to_profile(row: &rusqlite::Row) -> rusqlite::Result<UserProfile> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let stripe_customer_id: Option<String> = row.get(2)?;
    let subscription_status: Option<String> = row.get(3)?;
    let subscription_plan: Option<String> = row.get(4)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;

    Ok(UserProfile {
        id: parse_uuid(&id),
        user_id: parse_uuid(&user_id),
        stripe_customer_id,
        subscription_status: subscription_status.as_deref().and_then(SubscriptionStatus::parse),
        subscription_plan: subscription_plan.as_deref().and_then(SubscriptionPlan::parse),
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

fn row_to_policy(row: &rusqlite::Row) -> rusqlite::Result<Policy> {
    row_to_policy_at(row, 0)
}

/// Map a policy from a row, starting at the given column offset (for joins)
fn row_to_policy_at(row: &rusqlite::Row, at: usize) -> rusqlite::Result<Policy> {
    let id: String = row.get(at)?;
    let user_id: String = row.get(at + 1)?;
    let file_name: String = row.get(at + 2)?;
    let original_file_name: String = row.get(at + 3)?;
    let s3_key: String = row.get(at + 4)?;
    let s3_bucket: String = row.get(at + 5)?;
    let file_size: i64 = row.get(at + 6)?;
    let mime_type: String = row.get(at + 7)?;
    let coverage_start: String = row.get(at + 8)?;
    let coverage_end: String = row.get(at + 9)?;
    let description: Option<String> = row.get(at + 10)?;
    let status: String = row.get(at + 11)?;
    let is_deleted: i64 = row.get(at + 12)?;
    let uploaded_at: String = row.get(at + 13)?;
    let processed_at: Option<String> = row.get(at + 14)?;
    let updated_at: String = row.get(at + 15)?;

    Ok(Policy {
        id: parse_uuid(&id),
        user_id: parse_uuid(&user_id),
        file_name,
        original_file_name,
        s3_key,
        s3_bucket,
        file_size,
        mime_type,
        coverage_start: parse_date(&coverage_start),
        coverage_end: parse_date(&coverage_end),
        description,
        status: PolicyStatus::parse(&status).unwrap_or(PolicyStatus::Failed),
        is_deleted: is_deleted != 0,
        uploaded_at: parse_ts(&uploaded_at),
        processed_at: parse_opt_ts(processed_at),
        updated_at: parse_ts(&updated_at),
    })
}

fn row_to_analysis(row: &rusqlite::Row) -> rusqlite::Result<Analysis> {
    let id: String = row.get(0)?;
    let policy_id: String = row.get(1)?;
    let ai_model: String = row.get(2)?;
    let ai_tokens_used: i64 = row.get(3)?;
    let analysis_result: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;

    Ok(Analysis {
        id: parse_uuid(&id),
        policy_id: parse_uuid(&policy_id),
        ai_model,
        ai_tokens_used,
        analysis_result,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

fn row_to_comparison(row: &rusqlite::Row) -> rusqlite::Result<Comparison> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let previous_policy_id: String = row.get(2)?;
    let new_policy_id: String = row.get(3)?;
    let changes_detected: String = row.get(4)?;
    let summary: String = row.get(5)?;
    let ai_model: String = row.get(6)?;
    let ai_tokens_used: i64 = row.get(7)?;
    let comparison_result: String = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(Comparison {
        id: parse_uuid(&id),
        user_id: parse_uuid(&user_id),
        previous_policy_id: parse_uuid(&previous_policy_id),
        new_policy_id: parse_uuid(&new_policy_id),
        changes_detected: serde_json::from_str(&changes_detected)
            .unwrap_or(serde_json::Value::Null),
        summary,
        ai_model,
        ai_tokens_used,
        comparison_result,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

fn row_to_human_review(row: &rusqlite::Row) -> rusqlite::Result<HumanReview> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let policy_id: Option<String> = row.get(2)?;
    let analysis_id: Option<String> = row.get(3)?;
    let comparison_id: Option<String> = row.get(4)?;
    let status: String = row.get(5)?;
    let requested_at: String = row.get(6)?;
    let completed_at: Option<String> = row.get(7)?;
    let reviewer_notes: Option<String> = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(HumanReview {
        id: parse_uuid(&id),
        user_id: parse_uuid(&user_id),
        policy_id: parse_opt_uuid(policy_id),
        analysis_id: parse_opt_uuid(analysis_id),
        comparison_id: parse_opt_uuid(comparison_id),
        status: HumanReviewStatus::parse(&status).unwrap_or(HumanReviewStatus::Pending),
        requested_at: parse_ts(&requested_at),
        completed_at: parse_opt_ts(completed_at),
        reviewer_notes,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

fn row_to_subscription(row: &rusqlite::Row) -> rusqlite::Result<Subscription> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let stripe_subscription_id: String = row.get(2)?;
    let stripe_customer_id: String = row.get(3)?;
    let status: String = row.get(4)?;
    let plan: String = row.get(5)?;
    let current_period_start: String = row.get(6)?;
    let current_period_end: String = row.get(7)?;
    let cancel_at_period_end: i64 = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(Subscription {
        id: parse_uuid(&id),
        user_id: parse_uuid(&user_id),
        stripe_subscription_id,
        stripe_customer_id,
        status: SubscriptionStatus::parse(&status).unwrap_or(SubscriptionStatus::Canceled),
        plan: SubscriptionPlan::parse(&plan).unwrap_or(SubscriptionPlan::AiAnalyzer),
        current_period_start: parse_ts(&current_period_start),
        current_period_end: parse_ts(&current_period_end),
        cancel_at_period_end: cancel_at_period_end != 0,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

fn row_to_payment(row: &rusqlite::Row) -> rusqlite::Result<Payment> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let stripe_payment_intent_id: String = row.get(2)?;
    let amount: i64 = row.get(3)?;
    let currency: String = row.get(4)?;
    let status: String = row.get(5)?;
    let payment_type: String = row.get(6)?;
    let human_review_id: Option<String> = row.get(7)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;

    Ok(Payment {
        id: parse_uuid(&id),
        user_id: parse_uuid(&user_id),
        stripe_payment_intent_id,
        amount,
        currency,
        status: PaymentStatus::parse(&status).unwrap_or(PaymentStatus::Failed),
        payment_type: PaymentType::parse(&payment_type).unwrap_or(PaymentType::OneTime),
        human_review_id: parse_opt_uuid(human_review_id),
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

fn row_to_email_notification(row: &rusqlite::Row) -> rusqlite::Result<EmailNotification> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let notification_type: String = row.get(2)?;
    let policy_id: Option<String> = row.get(3)?;
    let analysis_id: Option<String> = row.get(4)?;
    let comparison_id: Option<String> = row.get(5)?;
    let resend_email_id: Option<String> = row.get(6)?;
    let status: String = row.get(7)?;
    let sent_at: Option<String> = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(EmailNotification {
        id: parse_uuid(&id),
        user_id: parse_uuid(&user_id),
        notification_type: EmailNotificationType::parse(&notification_type)
            .unwrap_or(EmailNotificationType::Billing),
        policy_id: parse_opt_uuid(policy_id),
        analysis_id: parse_opt_uuid(analysis_id),
        comparison_id: parse_opt_uuid(comparison_id),
        resend_email_id,
        status: EmailNotificationStatus::parse(&status).unwrap_or(EmailNotificationStatus::Failed),
        sent_at: parse_opt_ts(sent_at),
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_policy(user_id: Uuid, start: &str) -> Policy {
        let file_id = Uuid::new_v4();
        Policy::new(
            user_id,
            file_id,
            "home.pdf".to_string(),
            format!("policies/{}/{}/home.pdf", user_id, file_id),
            "policy-docs".to_string(),
            2048,
            parse_date(start),
            parse_date(start).checked_add_months(chrono::Months::new(12)).unwrap(),
            None,
        )
    }

    #[test]
    fn test_create_user_and_profile() {
        let db = Database::in_memory().unwrap();

        let user = db.create_user("Alice@Example.com", "hash", Some("Alice")).unwrap();
        assert_eq!(user.email, "alice@example.com");

        let profile = db.get_profile(user.id).unwrap().unwrap();
        assert!(profile.stripe_customer_id.is_none());
        assert!(profile.subscription_status.is_none());

        // Duplicate email is a validation error
        let err = db.create_user("alice@example.com", "hash2", None).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_session_lifecycle() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("bob@example.com", "hash", None).unwrap();

        db.create_session(user.id, "digest", Utc::now() + Duration::hours(1)).unwrap();
        let resolved = db.session_user("digest").unwrap().unwrap();
        assert_eq!(resolved.id, user.id);

        // Expired session resolves to nothing
        db.create_session(user.id, "stale", Utc::now() - Duration::hours(1)).unwrap();
        assert!(db.session_user("stale").unwrap().is_none());

        assert!(db.delete_session("digest").unwrap());
        assert!(db.session_user("digest").unwrap().is_none());
    }

    #[test]
    fn test_password_reset_single_use() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("carol@example.com", "hash", None).unwrap();

        db.create_password_reset(user.id, "reset-digest", Utc::now() + Duration::hours(1))
            .unwrap();

        assert_eq!(db.consume_password_reset("reset-digest").unwrap(), Some(user.id));
        // Second consume fails: the token was deleted
        assert_eq!(db.consume_password_reset("reset-digest").unwrap(), None);
    }

    #[test]
    fn test_policy_listing_and_filters() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("dave@example.com", "hash", None).unwrap();

        let p2025 = test_policy(user.id, "2025-03-01");
        let p2026 = test_policy(user.id, "2026-03-01");
        db.insert_policy(&p2025).unwrap();
        db.insert_policy(&p2026).unwrap();

        let filter = PolicyFilter { limit: 50, ..Default::default() };
        let (all, total) = db.list_policies(user.id, &filter).unwrap();
        assert_eq!(total, 2);
        assert_eq!(all.len(), 2);

        let filter = PolicyFilter { year: Some(2026), limit: 50, ..Default::default() };
        let (by_year, total) = db.list_policies(user.id, &filter).unwrap();
        assert_eq!(total, 1);
        assert_eq!(by_year[0].id, p2026.id);

        db.set_policy_status(p2025.id, PolicyStatus::Analyzed, Some(Utc::now())).unwrap();
        let filter = PolicyFilter {
            status: Some(PolicyStatus::Analyzed),
            limit: 50,
            ..Default::default()
        };
        let (analyzed, _) = db.list_policies(user.id, &filter).unwrap();
        assert_eq!(analyzed.len(), 1);
        assert!(analyzed[0].processed_at.is_some());

        // Soft-deleted policies disappear from lists and lookups
        db.mark_policy_deleted(p2026.id).unwrap();
        let filter = PolicyFilter { limit: 50, ..Default::default() };
        let (_, total) = db.list_policies(user.id, &filter).unwrap();
        assert_eq!(total, 1);
        assert!(db.get_policy(p2026.id, user.id).unwrap().is_none());
    }

    #[test]
    fn test_policy_owner_scoping() {
        let db = Database::in_memory().unwrap();
        let alice = db.create_user("alice2@example.com", "hash", None).unwrap();
        let mallory = db.create_user("mallory@example.com", "hash", None).unwrap();

        let policy = test_policy(alice.id, "2026-01-01");
        db.insert_policy(&policy).unwrap();

        assert!(db.get_policy(policy.id, alice.id).unwrap().is_some());
        assert!(db.get_policy(policy.id, mallory.id).unwrap().is_none());
    }

    #[test]
    fn test_analysis_uniqueness_and_join() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("erin@example.com", "hash", None).unwrap();
        let policy = test_policy(user.id, "2026-01-01");
        db.insert_policy(&policy).unwrap();

        let analysis = Analysis::new(policy.id, "gpt-4o-mini".to_string(), 1234, "# Report".to_string());
        db.insert_analysis(&analysis).unwrap();

        // Second analysis for the same policy is rejected
        let dup = Analysis::new(policy.id, "gpt-4o-mini".to_string(), 99, "# Again".to_string());
        let err = db.insert_analysis(&dup).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let listed = db.list_analyses(user.id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0.id, analysis.id);
        assert_eq!(listed[0].1.id, policy.id);

        let (fetched, _) = db.get_analysis(analysis.id, user.id).unwrap().unwrap();
        assert_eq!(fetched.analysis_result, "# Report");

        // Deleting the policy hides the analysis
        db.mark_policy_deleted(policy.id).unwrap();
        assert!(db.list_analyses(user.id).unwrap().is_empty());
        assert!(db.get_analysis(analysis.id, user.id).unwrap().is_none());
    }

    #[test]
    fn test_subscription_upsert_and_profile_mirror() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("frank@example.com", "hash", None).unwrap();
        db.set_stripe_customer_id(user.id, "cus_123").unwrap();
        assert_eq!(db.user_id_for_stripe_customer("cus_123").unwrap(), Some(user.id));

        let now = Utc::now();
        let mut sub = Subscription {
            id: Uuid::new_v4(),
            user_id: user.id,
            stripe_subscription_id: "sub_123".to_string(),
            stripe_customer_id: "cus_123".to_string(),
            status: SubscriptionStatus::Trialing,
            plan: SubscriptionPlan::AiAnalyzer,
            current_period_start: now,
            current_period_end: now + Duration::days(30),
            cancel_at_period_end: false,
            created_at: now,
            updated_at: now,
        };
        db.upsert_subscription(&sub).unwrap();

        sub.status = SubscriptionStatus::Active;
        db.upsert_subscription(&sub).unwrap();

        let stored = db.get_subscription_for_user(user.id).unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Active);

        db.set_profile_subscription(user.id, Some(SubscriptionStatus::Active), Some(SubscriptionPlan::AiAnalyzer))
            .unwrap();
        let profile = db.get_profile(user.id).unwrap().unwrap();
        assert_eq!(profile.subscription_status, Some(SubscriptionStatus::Active));
    }

    #[test]
    fn test_payment_upsert() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("grace@example.com", "hash", None).unwrap();

        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            user_id: user.id,
            stripe_payment_intent_id: "pi_123".to_string(),
            amount: 15_000,
            currency: "usd".to_string(),
            status: PaymentStatus::Pending,
            payment_type: PaymentType::HumanReview,
            human_review_id: None,
            created_at: now,
            updated_at: now,
        };
        db.upsert_payment(&payment).unwrap();
        db.set_payment_status("pi_123", PaymentStatus::Succeeded).unwrap();

        let stored = db.get_payment_by_intent("pi_123").unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Succeeded);
        assert_eq!(stored.payment_type, PaymentType::HumanReview);
    }

    #[test]
    fn test_email_notification_log() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("heidi@example.com", "hash", None).unwrap();
        let policy = test_policy(user.id, "2026-01-01");
        db.insert_policy(&policy).unwrap();

        let notification = EmailNotification::pending(
            user.id,
            EmailNotificationType::AnalysisReady,
            Some(policy.id),
            None,
            None,
        );
        db.insert_email_notification(&notification).unwrap();

        db.mark_email_sent(notification.id, "re_abc").unwrap();
        let stored = db.get_email_notification(notification.id).unwrap().unwrap();
        assert_eq!(stored.status, EmailNotificationStatus::Sent);
        assert_eq!(stored.resend_email_id.as_deref(), Some("re_abc"));
        assert!(stored.sent_at.is_some());
    }

    #[test]
    fn test_human_review_status_update() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("ivan@example.com", "hash", None).unwrap();

        let review = HumanReview::new(user.id, None, None);
        db.insert_human_review(&review).unwrap();

        db.set_human_review_status(review.id, HumanReviewStatus::Completed).unwrap();
        let listed = db.list_human_reviews(user.id).unwrap();
        assert_eq!(listed[0].status, HumanReviewStatus::Completed);
        assert!(listed[0].completed_at.is_some());
    }
}
