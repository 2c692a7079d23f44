//! Application state for the API server

use std::sync::Arc;

use crate::config::AppConfig;
use crate::email::Mailer;
use crate::error::Result;
use crate::providers::{
    EmailProvider, LlmProvider, ObjectStoreProvider, OpenAiClient, ResendClient, S3ObjectStore,
    StripeClient,
};
use crate::server::rate_limit::RateLimiter;
use crate::storage::Database;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: AppConfig,
    /// Relational store
    db: Arc<Database>,
    /// Raw document storage
    object_store: Arc<dyn ObjectStoreProvider>,
    /// Chat completion provider
    llm: Arc<dyn LlmProvider>,
    /// Payment provider client
    stripe: Arc<StripeClient>,
    /// Outbound email
    mailer: Arc<Mailer>,
    /// Fixed-window request limiter
    rate_limiter: RateLimiter,
}

impl AppState {
    /// Create application state with the production providers
    pub async fn new(config: AppConfig) -> Result<Self> {
        tracing::info!("Initializing application state...");

        let db = Arc::new(Database::open(&config.database.path)?);
        tracing::info!("Database ready at {}", config.database.path.display());

        let object_store: Arc<dyn ObjectStoreProvider> =
            Arc::new(S3ObjectStore::new(&config.s3).await?);
        tracing::info!("Object store ready (bucket: {})", object_store.bucket());

        let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiClient::new(&config.llm));
        tracing::info!("LLM client ready (model: {})", llm.model());

        let email: Arc<dyn EmailProvider> = Arc::new(ResendClient::new(&config.email));

        Self::with_providers(config, db, object_store, llm, email)
    }

    /// Create application state with explicit providers (used by tests and
    /// embeddings)
    pub fn with_providers(
        config: AppConfig,
        db: Arc<Database>,
        object_store: Arc<dyn ObjectStoreProvider>,
        llm: Arc<dyn LlmProvider>,
        email: Arc<dyn EmailProvider>,
    ) -> Result<Self> {
        let stripe = Arc::new(StripeClient::new(&config.stripe));
        let mailer = Arc::new(Mailer::new(
            email,
            Arc::clone(&db),
            config.email.from_address.clone(),
            config.server.frontend_origin.clone(),
        ));
        let rate_limiter = RateLimiter::new(&config.rate_limit);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                object_store,
                llm,
                stripe,
                mailer,
                rate_limiter,
            }),
        })
    }

    /// Get configuration
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get the database
    pub fn db(&self) -> &Arc<Database> {
        &self.inner.db
    }

    /// Get the object store
    pub fn object_store(&self) -> &Arc<dyn ObjectStoreProvider> {
        &self.inner.object_store
    }

    /// Get the LLM provider
    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.inner.llm
    }

    /// Get the payment client
    pub fn stripe(&self) -> &Arc<StripeClient> {
        &self.inner.stripe
    }

    /// Get the mailer
    pub fn mailer(&self) -> &Arc<Mailer> {
        &self.inner.mailer
    }

    /// Get the rate limiter
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.inner.rate_limiter
    }
}
