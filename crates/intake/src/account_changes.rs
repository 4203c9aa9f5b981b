//! Intake of account-change notifications.

use async_trait::async_trait;
use personfeed_core::event::AccountChangeNotification;
use personfeed_db::models::AccountChange;
use personfeed_db::store::EventStore;

use crate::processor::IntakeError;

/// Resolution of an arbitrary person identifier to the stable actor id.
///
/// Backed by the person-registry lookup service in production; tests inject
/// a stub.
#[async_trait]
pub trait SubjectResolver: Send + Sync {
    /// Returns `None` when the registry knows no actor id for the
    /// identifier.
    async fn resolve_actor_id(&self, identifier: &str) -> Result<Option<String>, ResolveError>;
}

#[derive(Debug, thiserror::Error)]
#[error("subject resolution failed: {0}")]
pub struct ResolveError(pub String);

/// Receives one account-change notification at a time, resolves the subject,
/// and stores the change for the publish cycle.
pub struct AccountChangeIntake<R> {
    store: EventStore,
    resolver: R,
}

impl<R: SubjectResolver> AccountChangeIntake<R> {
    pub fn new(store: EventStore, resolver: R) -> Self {
        Self { store, resolver }
    }

    /// Returns the stored record, or `None` when the subject could not be
    /// resolved (the notification is dropped with a warning).
    pub async fn process(
        &self,
        notification: AccountChangeNotification,
    ) -> Result<Option<AccountChange>, IntakeError> {
        match self
            .resolver
            .resolve_actor_id(&notification.subject_identifier)
            .await?
        {
            Some(actor_id) => {
                let change = self.store.store_account_change(&actor_id).await?;
                tracing::debug!("Account change stored for publish cycle");
                Ok(Some(change))
            }
            None => {
                tracing::warn!("No actor id for account-change subject, notification dropped");
                Ok(None)
            }
        }
    }
}
