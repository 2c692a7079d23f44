//! Provider abstractions for object storage, LLM completion, payments, and email
//!
//! Trait seams keep vendor SDKs out of the domain logic and let the pipeline
//! be tested against mocks.

pub mod email;
pub mod llm;
pub mod object_store;
pub mod openai;
pub mod resend;
pub mod s3;
pub mod stripe;

pub use email::EmailProvider;
pub use llm::{Completion, LlmProvider};
pub use object_store::ObjectStoreProvider;
pub use openai::OpenAiClient;
pub use resend::ResendClient;
pub use s3::S3ObjectStore;
pub use stripe::StripeClient;
