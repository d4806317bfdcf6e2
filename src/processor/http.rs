//! HTTP client for the payment processor API.

use super::{CheckoutSession, PaymentProcessor, ProcessorError};
use crate::domain::{ContributionId, Decimal};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Processor client speaking JSON over HTTPS.
///
/// Transient failures (network, 429, 5xx) are retried with exponential
/// backoff. Every request carries an `Idempotency-Key`, so a retried request
/// that did reach the processor is not executed twice.
#[derive(Debug, Clone)]
pub struct HttpProcessor {
    client: Client,
    base_url: String,
    api_key: String,
    return_url: String,
    max_retry: Duration,
}

impl HttpProcessor {
    pub fn new(base_url: String, api_key: String, return_url: String, max_retry: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            return_url,
            max_retry,
        }
    }

    async fn post_json(
        &self,
        path: &str,
        payload: serde_json::Value,
        idempotency_key: &str,
    ) -> Result<serde_json::Value, ProcessorError> {
        let url = format!("{}{}", self.base_url, path);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_retry),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .header("Idempotency-Key", idempotency_key)
                .json(&payload)
                .send()
                .await
                .map_err(|e| {
                    warn!(url = %url, error = %e, "Processor request failed, retrying");
                    backoff::Error::transient(ProcessorError::NetworkError(e.to_string()))
                })?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(ProcessorError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(ProcessorError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(backoff::Error::permanent(ProcessorError::HttpError {
                    status: status.as_u16(),
                    message: error_message(&body),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(ProcessorError::ParseError(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl PaymentProcessor for HttpProcessor {
    async fn create_checkout_session(
        &self,
        contribution_id: &ContributionId,
        amount: Decimal,
        payer_contact: Option<&str>,
    ) -> Result<CheckoutSession, ProcessorError> {
        debug!(contribution_id = %contribution_id, amount = %amount, "Creating checkout session");

        let payload = serde_json::json!({
            "amount": amount.to_canonical_string(),
            "customer_email": payer_contact,
            "success_url": self.return_url,
            "metadata": { "contribution_id": contribution_id.to_string() },
        });
        let idempotency_key = format!("checkout:{}:{}", contribution_id, Uuid::new_v4());

        let response = self
            .post_json("/v1/checkout/sessions", payload, &idempotency_key)
            .await?;
        parse_checkout_session(&response)
    }

    async fn create_transfer(
        &self,
        destination_account_id: &str,
        amount: Decimal,
        correlation_key: &str,
    ) -> Result<String, ProcessorError> {
        debug!(
            destination = destination_account_id,
            amount = %amount,
            correlation_key,
            "Creating transfer"
        );

        let payload = serde_json::json!({
            "amount": amount.to_canonical_string(),
            "destination": destination_account_id,
            "metadata": { "correlation_key": correlation_key },
        });

        let response = self
            .post_json("/v1/transfers", payload, correlation_key)
            .await?;
        parse_transfer_reference(&response)
    }
}

fn parse_checkout_session(json: &serde_json::Value) -> Result<CheckoutSession, ProcessorError> {
    let session_ref = json
        .get("id")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProcessorError::ParseError("Missing session id".to_string()))?;
    let redirect_url = json
        .get("url")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ProcessorError::ParseError("Missing session url".to_string()))?;

    Ok(CheckoutSession {
        session_ref: session_ref.to_string(),
        redirect_url: redirect_url.to_string(),
    })
}

fn parse_transfer_reference(json: &serde_json::Value) -> Result<String, ProcessorError> {
    json.get("id")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProcessorError::ParseError("Missing transfer id".to_string()))
}

/// Pull `error.message` out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_checkout_session() {
        let json = serde_json::json!({
            "id": "cs_test_123",
            "url": "https://pay.example.com/c/cs_test_123",
        });
        let session = parse_checkout_session(&json).unwrap();
        assert_eq!(session.session_ref, "cs_test_123");
        assert_eq!(session.redirect_url, "https://pay.example.com/c/cs_test_123");
    }

    #[test]
    fn test_parse_checkout_session_missing_fields() {
        let json = serde_json::json!({ "url": "https://pay.example.com" });
        assert!(matches!(
            parse_checkout_session(&json),
            Err(ProcessorError::ParseError(_))
        ));

        let json = serde_json::json!({ "id": "cs_1" });
        assert!(parse_checkout_session(&json).is_err());
    }

    #[test]
    fn test_parse_transfer_reference() {
        let json = serde_json::json!({ "id": "tr_42", "status": "pending" });
        assert_eq!(parse_transfer_reference(&json).unwrap(), "tr_42");

        let json = serde_json::json!({ "id": "" });
        assert!(parse_transfer_reference(&json).is_err());
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"error": {"message": "No such destination"}}"#;
        assert_eq!(error_message(body), "No such destination");
        assert_eq!(error_message("  plain failure \n"), "plain failure");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let processor = HttpProcessor::new(
            "https://api.example.com/".to_string(),
            "sk_test".to_string(),
            "https://app.example.com/done".to_string(),
            Duration::from_secs(1),
        );
        assert_eq!(processor.base_url, "https://api.example.com");
    }
}
