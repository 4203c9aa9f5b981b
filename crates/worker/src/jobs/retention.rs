//! Deletion of terminal-status events past the retention window.

use chrono::Utc;
use personfeed_core::types::DbId;
use personfeed_db::models::EventStatus;
use personfeed_db::repositories::JobLockRepo;
use personfeed_db::store::EventStore;
use personfeed_db::DbPool;
use tokio_util::sync::CancellationToken;

use crate::settings::RetentionSettings;

use super::JobError;

pub const JOB_NAME: &str = "delete_expired_events";

pub struct RetentionJob {
    pool: DbPool,
    store: EventStore,
    settings: RetentionSettings,
    holder: String,
}

impl RetentionJob {
    pub fn new(pool: DbPool, settings: RetentionSettings, holder: String) -> Self {
        Self {
            store: EventStore::new(pool.clone()),
            pool,
            settings,
            holder,
        }
    }

    /// Run the cleanup loop until `cancel` is triggered.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.settings.interval.as_secs(),
            retention_days = self.settings.retention_days,
            "Retention job started"
        );
        let mut interval = tokio::time::interval(self.settings.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Retention job stopping");
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
                                tracing::error!(error = %e, "Retention run failed");
                            }
                            if let Err(e) = JobLockRepo::release(
                                &self.pool,
                                JOB_NAME,
                                &self.holder,
                                self.settings.lock_min_hold,
                            )
                            .await
                            {
                                tracing::warn!(error = %e, "Retention lock release failed");
                            }
                        }
                        Ok(false) => {
                            tracing::debug!("Retention lock held elsewhere, skipping tick");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Retention lock acquisition failed");
                        }
                    }
                }
            }
        }
    }

    /// One scheduled run: select cancelled and transferred records whose
    /// last status change is past the retention window and delete both sets
    /// in bounded chunks.
    ///
    /// Returns how many rows were deleted.
    pub async fn run_once(&self) -> Result<u64, JobError> {
        let before = Utc::now() - chrono::Duration::days(self.settings.retention_days);
        tracing::info!(%before, "Looking for expired events to delete");

        let cancelled = self.store.expired_ids(EventStatus::Cancelled, before).await?;
        let transferred = self
            .store
            .expired_ids(EventStatus::Transferred, before)
            .await?;
        let identified = (cancelled.len() + transferred.len()) as u64;
        if identified == 0 {
            tracing::debug!("No expired events to delete");
            return Ok(0);
        }
        tracing::info!(
            cancelled = cancelled.len(),
            transferred = transferred.len(),
            "Found expired events to delete"
        );

        let mut deleted = self.delete_chunked(&cancelled, "cancelled").await?;
        deleted += self.delete_chunked(&transferred, "transferred").await?;

        if deleted == identified {
            tracing::info!(deleted, "All identified expired events were deleted");
        } else {
            tracing::warn!(identified, deleted, "Not every identified expired event was deleted");
        }
        Ok(deleted)
    }

    async fn delete_chunked(&self, ids: &[DbId], what: &str) -> Result<u64, JobError> {
        if ids.len() > self.settings.delete_chunk_size {
            tracing::info!(
                count = ids.len(),
                chunk_size = self.settings.delete_chunk_size,
                what,
                "Selection exceeds the chunk size, deleting in chunks"
            );
        }
        let mut total = 0;
        for (number, chunk) in ids.chunks(self.settings.delete_chunk_size).enumerate() {
            let deleted = self.store.delete_by_ids(chunk).await?;
            tracing::debug!(chunk = number + 1, deleted, what, "Deleted chunk");
            total += deleted;
        }
        Ok(total)
    }
}
