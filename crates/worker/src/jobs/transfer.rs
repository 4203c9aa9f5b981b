//! Batched hand-over of debounced events to the legacy system.

use chrono::Utc;
use personfeed_core::types::DbId;
use personfeed_db::models::EventStatus;
use personfeed_db::repositories::JobLockRepo;
use personfeed_db::store::EventStore;
use personfeed_db::DbPool;
use tokio_util::sync::CancellationToken;

use crate::outbound::DeliveryClient;
use crate::settings::TransferSettings;

use super::JobError;

/// Lease name shared by every process in the fleet.
pub const JOB_NAME: &str = "transfer_events";

pub struct TransferJob<C> {
    pool: DbPool,
    store: EventStore,
    client: C,
    settings: TransferSettings,
    destination: String,
    holder: String,
}

impl<C: DeliveryClient> TransferJob<C> {
    pub fn new(
        pool: DbPool,
        client: C,
        settings: TransferSettings,
        destination: String,
        holder: String,
    ) -> Self {
        Self {
            store: EventStore::new(pool.clone()),
            pool,
            client,
            settings,
            destination,
            holder,
        }
    }

    /// Run the transfer loop until `cancel` is triggered.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.settings.interval.as_secs(),
            debounce_minutes = self.settings.debounce_minutes,
            batch_size = self.settings.batch_size,
            "Transfer job started"
        );
        let mut interval = tokio::time::interval(self.settings.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Transfer job stopping");
                    break;
                }
                _ = interval.tick() => {
                    match JobLockRepo::try_acquire(
                        &self.pool,
                        JOB_NAME,
                        &self.holder,
                        self.settings.lock_max_hold,
                    )
                    .await
                    {
                        Ok(true) => {
                            if let Err(e) = self.run_once().await {
                                tracing::error!(error = %e, "Transfer run failed");
                            }
                            if let Err(e) = JobLockRepo::release(
                                &self.pool,
                                JOB_NAME,
                                &self.holder,
                                self.settings.lock_min_hold,
                            )
                            .await
                            {
                                tracing::warn!(error = %e, "Transfer lock release failed");
                            }
                        }
                        Ok(false) => {
                            tracing::debug!("Transfer lock held elsewhere, skipping tick");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Transfer lock acquisition failed");
                        }
                    }
                }
            }
        }
    }

    /// One scheduled run: select debounced `received` events up to the batch
    /// cap, mark them `in_progress`, hand the whole batch to the delivery
    /// client, then mark every item `transferred` or, on a delivery error,
    /// `transfer_failed`. Failure is all-or-nothing per run; failed items
    /// are not reconsidered automatically.
    ///
    /// Returns how many events were handed over.
    pub async fn run_once(&self) -> Result<usize, JobError> {
        let older_than = Utc::now() - chrono::Duration::minutes(self.settings.debounce_minutes);
        let candidates = self
            .store
            .transfer_candidates(older_than, self.settings.batch_size)
            .await?;
        if candidates.is_empty() {
            tracing::debug!("No events ready for transfer");
            return Ok(0);
        }

        let ids: Vec<DbId> = candidates.iter().map(|record| record.id).collect();
        tracing::info!(count = ids.len(), "Transferring events to the legacy queue");
        self.store
            .mark_status_many(&ids, EventStatus::InProgress)
            .await?;

        let payloads: Vec<String> = candidates
            .iter()
            .map(|record| record.payload.to_string())
            .collect();

        match self.client.send(&self.destination, &payloads).await {
            Ok(()) => {
                self.store
                    .mark_status_many(&ids, EventStatus::Transferred)
                    .await?;
                tracing::info!(count = ids.len(), "Transfer completed");
                Ok(ids.len())
            }
            Err(e) => {
                self.store
                    .mark_status_many(&ids, EventStatus::TransferFailed)
                    .await?;
                tracing::error!(
                    error = %e,
                    count = ids.len(),
                    "Transfer failed, batch left for manual remediation"
                );
                Ok(0)
            }
        }
    }
}
