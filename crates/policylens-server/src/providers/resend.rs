//! Resend transactional email client

use async_trait::async_trait;

use crate::config::EmailConfig;
use crate::error::{Error, Result};

use super::email::EmailProvider;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Resend API client
pub struct ResendClient {
    client: reqwest::Client,
    api_key: String,
}

impl ResendClient {
    /// Create a new Resend client
    pub fn new(config: &EmailConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
        }
    }
}

#[derive(serde::Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
}

#[derive(serde::Deserialize)]
struct SendResponse {
    id: String,
}

#[async_trait]
impl EmailProvider for ResendClient {
    async fn send(&self, from: &str, to: &str, subject: &str, html: &str) -> Result<String> {
        let request = SendRequest {
            from,
            to: vec![to],
            subject,
            html,
        };

        let response = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Email(format!("Resend request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Email(format!(
                "Resend send failed ({}): {}",
                status, body
            )));
        }

        let sent: SendResponse = response
            .json()
            .await
            .map_err(|e| Error::Email(format!("Failed to parse Resend response: {}", e)))?;

        Ok(sent.id)
    }

    fn name(&self) -> &str {
        "resend"
    }
}
