//! Stripe payment client
//!
//! Form-encoded calls against the Stripe REST API plus webhook signature
//! verification (HMAC-SHA256 over `{timestamp}.{payload}`).

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::StripeConfig;
use crate::error::{Error, Result};

const STRIPE_API_URL: &str = "https://api.stripe.com/v1";

/// Accepted clock skew between the webhook timestamp and our clock
const WEBHOOK_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

/// Stripe API client
pub struct StripeClient {
    client: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
}

/// A created Checkout Session
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CheckoutSession {
    /// Session ID
    pub id: String,
    /// Hosted payment page URL
    pub url: Option<String>,
}

/// A parsed webhook event
#[derive(Debug, Clone, serde::Deserialize)]
pub struct WebhookEvent {
    /// Event ID
    pub id: String,
    /// Event type, e.g. `checkout.session.completed`
    #[serde(rename = "type")]
    pub kind: String,
    /// Event payload
    pub data: WebhookEventData,
}

/// Payload wrapper of a webhook event
#[derive(Debug, Clone, serde::Deserialize)]
pub struct WebhookEventData {
    /// The object the event describes (shape depends on `kind`)
    pub object: serde_json::Value,
}

#[derive(serde::Deserialize)]
struct Customer {
    id: String,
}

impl StripeClient {
    /// Create a new Stripe client
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }

    async fn post_form(&self, path: &str, params: &[(&str, &str)]) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}{}", STRIPE_API_URL, path))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(params)
            .send()
            .await
            .map_err(|e| Error::Payment(format!("Stripe request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Payment(format!(
                "Stripe call {} failed ({}): {}",
                path, status, body
            )));
        }

        Ok(response)
    }

    /// Create a customer for a user
    pub async fn create_customer(&self, email: &str, name: Option<&str>) -> Result<String> {
        let mut params = vec![("email", email)];
        if let Some(name) = name {
            params.push(("name", name));
        }

        let customer: Customer = self
            .post_form("/customers", &params)
            .await?
            .json()
            .await
            .map_err(|e| Error::Payment(format!("Failed to parse Stripe customer: {}", e)))?;

        Ok(customer.id)
    }

    /// Create a subscription-mode Checkout Session for a plan price
    pub async fn create_subscription_checkout(
        &self,
        customer_id: &str,
        price_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession> {
        let params = [
            ("mode", "subscription"),
            ("customer", customer_id),
            ("line_items[0][price]", price_id),
            ("line_items[0][quantity]", "1"),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
        ];

        self.post_form("/checkout/sessions", &params)
            .await?
            .json()
            .await
            .map_err(|e| Error::Payment(format!("Failed to parse checkout session: {}", e)))
    }

    /// Create a payment-mode Checkout Session for a one-off charge
    pub async fn create_payment_checkout(
        &self,
        customer_id: &str,
        product_name: &str,
        amount_cents: i64,
        success_url: &str,
        cancel_url: &str,
        metadata: &[(&str, &str)],
    ) -> Result<CheckoutSession> {
        let amount = amount_cents.to_string();
        let mut params = vec![
            ("mode", "payment"),
            ("customer", customer_id),
            ("line_items[0][price_data][currency]", "usd"),
            ("line_items[0][price_data][product_data][name]", product_name),
            ("line_items[0][price_data][unit_amount]", amount.as_str()),
            ("line_items[0][quantity]", "1"),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
        ];

        let metadata: Vec<(String, &str)> = metadata
            .iter()
            .map(|(k, v)| (format!("metadata[{}]", k), *v))
            .collect();
        for (key, value) in &metadata {
            params.push((key.as_str(), *value));
        }

        self.post_form("/checkout/sessions", &params)
            .await?
            .json()
            .await
            .map_err(|e| Error::Payment(format!("Failed to parse checkout session: {}", e)))
    }

    /// Verify a webhook payload against its `Stripe-Signature` header
    pub fn verify_webhook_signature(&self, payload: &[u8], signature_header: &str) -> Result<()> {
        verify_signature_at(
            &self.webhook_secret,
            payload,
            signature_header,
            Utc::now().timestamp(),
        )
    }

    /// Parse a verified webhook payload into an event
    pub fn parse_webhook_event(&self, payload: &[u8]) -> Result<WebhookEvent> {
        serde_json::from_slice(payload)
            .map_err(|e| Error::Payment(format!("Failed to parse webhook event: {}", e)))
    }
}

/// Verify the `t=...,v1=...` signature header at a fixed point in time
fn verify_signature_at(secret: &str, payload: &[u8], header: &str, now: i64) -> Result<()> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| Error::Payment("Webhook signature header has no timestamp".to_string()))?;

    if (now - timestamp).abs() > WEBHOOK_TOLERANCE_SECS {
        return Err(Error::Payment("Webhook timestamp outside tolerance".to_string()));
    }

    if signatures.is_empty() {
        return Err(Error::Payment("Webhook signature header has no v1 signature".to_string()));
    }

    for signature in &signatures {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| Error::Internal(format!("Failed to build HMAC: {}", e)))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);

        if mac.verify_slice(signature).is_ok() {
            return Ok(());
        }
    }

    Err(Error::Payment("Webhook signature mismatch".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, payload: &[u8], timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_signature() {
        let payload = br#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;
        let header = sign("whsec_test", payload, 1_700_000_000);
        assert!(verify_signature_at("whsec_test", payload, &header, 1_700_000_010).is_ok());
    }

    #[test]
    fn test_tampered_payload() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign("whsec_test", payload, 1_700_000_000);
        let result = verify_signature_at("whsec_test", br#"{"id":"evt_2"}"#, &header, 1_700_000_010);
        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign("whsec_test", payload, 1_700_000_000);
        assert!(verify_signature_at("whsec_other", payload, &header, 1_700_000_010).is_err());
    }

    #[test]
    fn test_stale_timestamp() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign("whsec_test", payload, 1_700_000_000);
        let result =
            verify_signature_at("whsec_test", payload, &header, 1_700_000_000 + 3600);
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_header() {
        assert!(verify_signature_at("whsec_test", b"{}", "garbage", 0).is_err());
        assert!(verify_signature_at("whsec_test", b"{}", "t=notanumber,v1=00", 0).is_err());
    }

    #[test]
    fn test_event_parsing() {
        let payload = br#"{
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {"id": "cs_123", "mode": "subscription"}}
        }"#;

        let client = StripeClient::new(&StripeConfig::default());
        let event = client.parse_webhook_event(payload).unwrap();
        assert_eq!(event.kind, "checkout.session.completed");
        assert_eq!(event.data.object["id"], "cs_123");
    }
}
