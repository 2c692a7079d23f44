//! LLM provider trait for report generation

use async_trait::async_trait;

use crate::error::Result;

/// A chat completion result
#[derive(Debug, Clone)]
pub struct Completion {
    /// Generated text
    pub text: String,
    /// Model that produced it
    pub model: String,
    /// Total tokens consumed (prompt + completion)
    pub tokens_used: i64,
}

/// Trait for LLM-based report generation
///
/// Implementations:
/// - `OpenAiClient`: OpenAI chat completions (gpt-4o-mini by default)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one chat completion with a system instruction and a user prompt
    async fn complete(&self, system: &str, prompt: &str) -> Result<Completion>;

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model being used
    fn model(&self) -> &str;
}
