//! policylens: insurance policy upload, AI analysis, and billing API
//!
//! Users upload policy PDFs, the service stores them in object storage,
//! extracts their text, produces a markdown analysis through a chat
//! completion API, and serves the result alongside billing and notification
//! features over a JSON API.

pub mod analysis;
pub mod auth;
pub mod config;
pub mod email;
pub mod error;
pub mod extraction;
pub mod providers;
pub mod server;
pub mod storage;
pub mod types;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use server::{state::AppState, ApiServer};
