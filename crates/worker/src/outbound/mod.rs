//! Outbound delivery seams for the two downstream consumers.
//!
//! The transfer job hands whole batches to a [`DeliveryClient`]; the publish
//! job sends one notification per subject through a [`ChangePublisher`].
//! The HTTP gateway implementations live in [`http`]; tests inject
//! recording fakes.

pub mod http;

use std::collections::BTreeSet;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("delivery gateway returned HTTP {0}")]
    HttpStatus(u16),
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("publish request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("publish gateway returned HTTP {0}")]
    HttpStatus(u16),
}

/// Legacy-queue delivery. One call carries a whole batch; there is no
/// partial acknowledgement within a call.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    async fn send(&self, destination: &str, payloads: &[String]) -> Result<(), DeliveryError>;
}

/// Change-notification publishing, one subject per call.
#[async_trait]
pub trait ChangePublisher: Send + Sync {
    async fn publish(
        &self,
        subject_id: &str,
        identifiers: &BTreeSet<String>,
    ) -> Result<(), PublishError>;
}
