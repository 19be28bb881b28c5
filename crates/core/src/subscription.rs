//! External subscription-creation client.
//!
//! Every persisted care recipient is correlated with a subscription in the
//! external notification system. The subscription system is a collaborator the
//! registry only ever calls through the [`SubscriptionService`] trait, which
//! keeps the import pipeline testable and lets deployments without the
//! external system fall back to locally issued correlation IDs.

use hans_uuid::Sha256Hash;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Errors raised while creating a subscription.
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("subscription request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("subscription endpoint returned status {0}")]
    Status(u16),
}

/// Creates notification subscriptions for care recipients.
///
/// Implementations must issue exactly one subscription per call; the import
/// pipeline relies on the call count staying one-to-one with persisted rows.
pub trait SubscriptionService: Send + Sync {
    /// Creates a subscription correlated with the given pseudonymized
    /// identifier and returns the subscription ID.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError`] when the external system rejects or
    /// fails the request.
    fn create_subscription(&self, pseudo_id: &Sha256Hash) -> Result<Uuid, SubscriptionError>;
}

/// Issues subscription IDs locally, without an external system.
///
/// Used in development and by the CLI when no subscription endpoint is
/// configured. The IDs are still opaque UUIDs, so records created this way
/// are indistinguishable from externally subscribed ones.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalSubscriptionIssuer;

impl SubscriptionService for LocalSubscriptionIssuer {
    fn create_subscription(&self, _pseudo_id: &Sha256Hash) -> Result<Uuid, SubscriptionError> {
        Ok(Uuid::new_v4())
    }
}

#[derive(Serialize)]
struct CreateSubscriptionRequest<'a> {
    #[serde(rename = "careRecipientPseudoId")]
    pseudo_id: &'a str,
}

#[derive(Deserialize)]
struct CreateSubscriptionResponse {
    id: Uuid,
}

/// HTTP client for the external subscription system.
///
/// Synchronous, like the rest of the import pipeline; the HTTP layer runs it
/// on a blocking task. The client is constructed per call, so this type is
/// safe to hold in async application state.
#[derive(Clone, Debug)]
pub struct HttpSubscriptionClient {
    endpoint: String,
}

impl HttpSubscriptionClient {
    /// Creates a client posting to the given endpoint URL.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl SubscriptionService for HttpSubscriptionClient {
    fn create_subscription(&self, pseudo_id: &Sha256Hash) -> Result<Uuid, SubscriptionError> {
        let client = reqwest::blocking::Client::new();
        let response = client
            .post(&self.endpoint)
            .json(&CreateSubscriptionRequest {
                pseudo_id: pseudo_id.as_str(),
            })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubscriptionError::Status(status.as_u16()));
        }

        let body: CreateSubscriptionResponse = response.json()?;
        Ok(body.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_issuer_returns_distinct_ids() {
        let issuer = LocalSubscriptionIssuer;
        let hash = Sha256Hash::parse(&"ab".repeat(32)).expect("valid hash");
        let first = issuer.create_subscription(&hash).expect("should issue");
        let second = issuer.create_subscription(&hash).expect("should issue");
        assert_ne!(first, second);
    }
}
