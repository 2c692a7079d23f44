//! Configuration for the policylens service
//!
//! Defaults cover local development; `AppConfig::from_env` overlays the
//! environment and fails fast on missing vendor credentials.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Object storage (S3) configuration
    pub s3: S3Config,
    /// LLM (OpenAI) configuration
    pub llm: LlmConfig,
    /// Payment provider (Stripe) configuration
    pub stripe: StripeConfig,
    /// Email provider (Resend) configuration
    pub email: EmailConfig,
    /// Session configuration
    pub auth: AuthConfig,
    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 10MB)
    pub max_upload_size: usize,
    /// Frontend origin used in emails and checkout redirect URLs
    pub frontend_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            enable_cors: true,
            max_upload_size: 10 * 1024 * 1024, // 10MB
            frontend_origin: "http://localhost:5173".to_string(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("policylens.db"),
        }
    }
}

/// Object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// Bucket for uploaded policy documents
    pub bucket: String,
    /// Region override (falls back to the ambient AWS config)
    pub region: Option<String>,
    /// Key prefix for policy objects (default: "policies/")
    #[serde(default = "default_s3_prefix")]
    pub key_prefix: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: None,
            key_prefix: default_s3_prefix(),
        }
    }
}

fn default_s3_prefix() -> String {
    "policies/".to_string()
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API base URL
    pub base_url: String,
    /// API key
    pub api_key: String,
    /// Chat completion model
    pub model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Maximum output tokens per completion
    pub max_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3, // Lower for more factual reports
            max_tokens: 4000,
            timeout_secs: 120,
        }
    }
}

/// Payment provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeConfig {
    /// Secret API key
    pub secret_key: String,
    /// Webhook signing secret
    pub webhook_secret: String,
    /// Price ID for the ai_analyzer plan
    pub price_ai_analyzer: String,
    /// Price ID for the ai_analyzer_plus plan
    pub price_ai_analyzer_plus: String,
    /// Price of a human review in cents (default: 15000 = $150)
    pub human_review_price_cents: i64,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            webhook_secret: String::new(),
            price_ai_analyzer: String::new(),
            price_ai_analyzer_plus: String::new(),
            human_review_price_cents: 15_000,
        }
    }
}

/// Email provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// API key
    pub api_key: String,
    /// Sender address
    pub from_address: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            from_address: "Policylens <onboarding@resend.dev>".to_string(),
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Session lifetime in hours
    pub session_ttl_hours: i64,
    /// Password reset token lifetime in seconds (default: 1 hour)
    pub reset_token_ttl_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: 24 * 7,
            reset_token_ttl_secs: 3600,
        }
    }
}

/// Fixed-window rate limit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per window
    pub max_requests: u32,
    /// Window length in seconds
    pub window_secs: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_secs: 60,
        }
    }
}

impl AppConfig {
    /// Load configuration from the environment
    ///
    /// Returns a `Config` error listing the first missing required variable.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(port) = env::var("PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| Error::Config(format!("Invalid PORT: {}", port)))?;
        }
        if let Ok(host) = env::var("HOST") {
            config.server.host = host;
        }
        if let Ok(origin) = env::var("FRONTEND_ORIGIN") {
            config.server.frontend_origin = origin;
        }
        if let Ok(path) = env::var("DATABASE_PATH") {
            config.database.path = PathBuf::from(path);
        }

        config.s3.bucket = require("S3_BUCKET_NAME")?;
        config.s3.region = env::var("AWS_REGION").ok();

        config.llm.api_key = require("OPENAI_API_KEY")?;
        if let Ok(model) = env::var("OPENAI_MODEL") {
            config.llm.model = model;
        }

        config.stripe.secret_key = require("STRIPE_SECRET_KEY")?;
        config.stripe.webhook_secret = require("STRIPE_WEBHOOK_SECRET")?;
        if let Ok(price) = env::var("STRIPE_PRICE_AI_ANALYZER") {
            config.stripe.price_ai_analyzer = price;
        }
        if let Ok(price) = env::var("STRIPE_PRICE_AI_ANALYZER_PLUS") {
            config.stripe.price_ai_analyzer_plus = price;
        }
        if let Ok(price) = env::var("HUMAN_REVIEW_PRICE_CENTS") {
            config.stripe.human_review_price_cents = price
                .parse()
                .map_err(|_| Error::Config(format!("Invalid HUMAN_REVIEW_PRICE_CENTS: {}", price)))?;
        }

        config.email.api_key = require("RESEND_API_KEY")?;
        if let Ok(from) = env::var("EMAIL_FROM") {
            config.email.from_address = from;
        }

        Ok(config)
    }
}

fn require(name: &str) -> Result<String> {
    env::var(name)
        .map_err(|_| Error::Config(format!("Missing required environment variable: {}", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.server.max_upload_size, 10 * 1024 * 1024);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.stripe.human_review_price_cents, 15_000);
        assert_eq!(config.rate_limit.max_requests, 100);
    }
}
