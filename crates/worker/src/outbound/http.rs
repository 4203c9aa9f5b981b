//! HTTP gateway clients for the outbound transports.
//!
//! Both downstream transports sit behind JSON-over-HTTP gateways. The
//! publisher retries transient failures with exponential backoff before
//! giving up on a subject; the batch delivery client does not retry, the
//! transfer job handles a failed batch through record status instead.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;

use super::{ChangePublisher, DeliveryClient, DeliveryError, PublishError};

/// HTTP request timeout for a single gateway call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Batch delivery to the legacy-queue gateway.
pub struct HttpDeliveryClient {
    client: reqwest::Client,
    url: String,
}

impl HttpDeliveryClient {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client, url }
    }
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn send(&self, destination: &str, payloads: &[String]) -> Result<(), DeliveryError> {
        let body = serde_json::json!({
            "destination": destination,
            "messages": payloads,
        });
        let response = self.client.post(&self.url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(DeliveryError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Per-subject publishing to the internal-topic gateway, with retry.
pub struct HttpChangePublisher {
    client: reqwest::Client,
    url: String,
    attempts: u32,
    base_delay: Duration,
}

impl HttpChangePublisher {
    pub fn new(url: String, attempts: u32, base_delay: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            url,
            attempts: attempts.max(1),
            base_delay,
        }
    }

    async fn try_send(&self, body: &serde_json::Value) -> Result<(), PublishError> {
        let response = self.client.post(&self.url).json(body).send().await?;
        if !response.status().is_success() {
            return Err(PublishError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChangePublisher for HttpChangePublisher {
    async fn publish(
        &self,
        subject_id: &str,
        identifiers: &BTreeSet<String>,
    ) -> Result<(), PublishError> {
        let body = serde_json::json!({
            "subject_id": subject_id,
            "identifiers": identifiers,
        });

        let mut last_err = None;
        for attempt in 0..self.attempts {
            if attempt > 0 {
                // Exponential backoff: base, 2*base, 4*base, ...
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                tokio::time::sleep(delay).await;
            }
            match self.try_send(&body).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        error = %e,
                        "Publish attempt failed"
                    );
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.expect("at least one attempt was made"))
    }
}
