//! Transactional email client used for report delivery.
//!
//! Speaks the Resend-style JSON API: `POST {api_url}` with a bearer key and
//! `{ from, to, subject, html }`. Transient failures are retried with
//! exponential backoff; client errors are returned immediately.

use anyhow::{Context, Result};
use backoff::ExponentialBackoff;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};
use validator::validate_email;

use crate::error::ApiError;

#[derive(Clone)]
pub struct EmailClient {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
    max_elapsed: Duration,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmailErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

/// Outcome of a delivered message
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReceipt {
    pub message_id: Option<String>,
    pub recipients: usize,
}

/// Trims, lowercases and validates recipient addresses
pub fn normalize_recipients(recipients: &[String]) -> Result<Vec<String>, ApiError> {
    if recipients.is_empty() {
        return Err(ApiError::bad_request("At least one recipient is required"));
    }

    let mut out: Vec<String> = Vec::with_capacity(recipients.len());
    for raw in recipients {
        let address = raw.trim().to_lowercase();
        if !validate_email(address.as_str()) {
            return Err(ApiError::bad_request(format!(
                "Invalid email address: {}",
                raw.trim()
            )));
        }
        if !out.contains(&address) {
            out.push(address);
        }
    }
    Ok(out)
}

impl EmailClient {
    pub fn new(
        api_url: &str,
        api_key: Option<String>,
        from: &str,
        timeout_seconds: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        tracing::info!(
            api_url = api_url,
            enabled = api_key.is_some(),
            "Email client initialized"
        );

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            api_key,
            from: from.to_string(),
            max_elapsed: Duration::from_secs(30),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Send an HTML message to validated recipients
    #[instrument(skip(self, html), fields(recipients = to.len()))]
    pub async fn send(
        &self,
        to: &[String],
        subject: &str,
        html: &str,
        request_id: Option<&str>,
    ) -> Result<DeliveryReceipt, ApiError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ApiError::unavailable("Email delivery is not configured"));
        };

        let body = SendRequest {
            from: &self.from,
            to,
            subject,
            html,
        };

        let policy = ExponentialBackoff {
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        let client = &self.client;
        let api_url = self.api_url.as_str();
        let body = &body;

        let response: SendResponse = backoff::future::retry(policy, move || async move {
            let mut req = client.post(api_url).bearer_auth(api_key).json(body);
            if let Some(rid) = request_id {
                req = req.header("x-request-id", rid);
            }

            debug!(url = %api_url, "Email API request");

            let response = req.send().await.map_err(|e| {
                warn!(error = %e, "Email API request failed, retrying");
                backoff::Error::transient(ApiError::unavailable("Email service unreachable"))
            })?;

            let status = response.status();
            if status.is_success() {
                return response.json::<SendResponse>().await.map_err(|e| {
                    error!(error = %e, "Failed to parse email API response");
                    backoff::Error::permanent(ApiError::internal(format!(
                        "Invalid email API response: {}",
                        e
                    )))
                });
            }

            let message = response
                .json::<EmailErrorResponse>()
                .await
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("Email API error: {}", status));

            Err(classify_failure(status, message))
        })
        .await?;

        tracing::info!(
            recipients = to.len(),
            message_id = ?response.id,
            "Email delivered"
        );

        Ok(DeliveryReceipt {
            message_id: response.id,
            recipients: to.len(),
        })
    }
}

fn classify_failure(status: StatusCode, message: String) -> backoff::Error<ApiError> {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        warn!(status = %status, message = %message, "Transient email API error");
        return backoff::Error::transient(ApiError::unavailable(message));
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            error!(status = %status, "Email API rejected credentials");
            backoff::Error::permanent(ApiError::internal("Email API authentication failed"))
        }
        _ => backoff::Error::permanent(ApiError::bad_request(message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipients_are_validated_and_deduplicated() {
        let list = vec![
            " Estimating@HVAC.test ".to_string(),
            "estimating@hvac.test".to_string(),
            "pm@hvac.test".to_string(),
        ];
        assert_eq!(
            normalize_recipients(&list).unwrap(),
            vec!["estimating@hvac.test".to_string(), "pm@hvac.test".to_string()]
        );
    }

    #[test]
    fn malformed_recipient_is_rejected() {
        let err = normalize_recipients(&["pm@hvac.test".into(), "pm at hvac".into()]).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(normalize_recipients(&[]).is_err());
    }

    #[test]
    fn failure_classification() {
        assert!(matches!(
            classify_failure(StatusCode::BAD_GATEWAY, "down".into()),
            backoff::Error::Transient { .. }
        ));
        assert!(matches!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, "slow down".into()),
            backoff::Error::Transient { .. }
        ));
        assert!(matches!(
            classify_failure(StatusCode::UNPROCESSABLE_ENTITY, "bad to".into()),
            backoff::Error::Permanent(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            classify_failure(StatusCode::UNAUTHORIZED, "nope".into()),
            backoff::Error::Permanent(ApiError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn unconfigured_client_reports_unavailable() {
        let client = EmailClient::new("https://email.test/send", None, "Bids <b@hvac.test>", 5)
            .unwrap();
        assert!(!client.is_configured());
        let err = client
            .send(&["pm@hvac.test".into()], "Report", "<p>hi</p>", None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
