//! Change-notification publishing for subjects with recent changes.
//!
//! Merges two independent change sources, account changes and un-published
//! life events, into one subject set and publishes a single notification per
//! subject. Records are marked published only after the publish call has
//! returned success, so a crash mid-run can cause a duplicate notification
//! on a later run but never a lost one.

use chrono::Utc;
use personfeed_db::repositories::JobLockRepo;
use personfeed_db::store::{EventStore, SubjectMap};
use personfeed_db::DbPool;
use tokio_util::sync::CancellationToken;

use crate::outbound::ChangePublisher;
use crate::settings::PublishSettings;

use super::JobError;

pub const JOB_NAME: &str = "publish_changes";

/// What a single run did, for logging and tests.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Distinct subjects found across both sources.
    pub identified: usize,
    pub published: usize,
    pub failed: usize,
}

pub struct PublishJob<P> {
    pool: DbPool,
    store: EventStore,
    publisher: P,
    settings: PublishSettings,
    holder: String,
}

impl<P: ChangePublisher> PublishJob<P> {
    pub fn new(pool: DbPool, publisher: P, settings: PublishSettings, holder: String) -> Self {
        Self {
            store: EventStore::new(pool.clone()),
            pool,
            publisher,
            settings,
            holder,
        }
    }

    /// Run the publish loop until `cancel` is triggered.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.settings.interval.as_secs(),
            batch_size = self.settings.batch_size,
            "Publish job started"
        );
        let mut interval = tokio::time::interval(self.settings.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Publish job stopping");
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
                                tracing::error!(error = %e, "Publish run failed");
                            }
                            if let Err(e) = JobLockRepo::release(
                                &self.pool,
                                JOB_NAME,
                                &self.holder,
                                self.settings.lock_min_hold,
                            )
                            .await
                            {
                                tracing::warn!(error = %e, "Publish lock release failed");
                            }
                        }
                        Ok(false) => {
                            tracing::debug!("Publish lock held elsewhere, skipping tick");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Publish lock acquisition failed");
                        }
                    }
                }
            }
        }
    }

    /// One scheduled run: collect both subject sources, merge and cap the
    /// set, publish one notification per subject. A failed subject never
    /// stops the rest of the batch; its records stay pending for the next
    /// run.
    pub async fn run_once(&self) -> Result<PublishOutcome, JobError> {
        let now = Utc::now();
        let received_before = now - chrono::Duration::minutes(self.settings.debounce_minutes);
        let published_before = now - chrono::Duration::hours(self.settings.republish_hours);

        let account_subjects = self
            .store
            .account_change_subjects(received_before, published_before)
            .await?;
        let person_subjects = self.store.person_change_subjects().await?;
        tracing::info!(
            account = account_subjects.len(),
            person = person_subjects.len(),
            "Collected subjects with pending changes"
        );

        let merged = merge_subjects(account_subjects, person_subjects);
        let identified = merged.len();

        let mut outcome = PublishOutcome {
            identified,
            ..PublishOutcome::default()
        };
        for (subject, identifiers) in merged.into_iter().take(self.settings.batch_size) {
            match self.publisher.publish(&subject, &identifiers).await {
                Ok(()) => {
                    self.store.mark_subject_published(&subject).await?;
                    outcome.published += 1;
                }
                Err(e) => {
                    outcome.failed += 1;
                    tracing::warn!(error = %e, "Publish failed for one subject, continuing");
                }
            }
        }

        if identified > self.settings.batch_size {
            tracing::info!(
                published = outcome.published,
                identified,
                "Publish batch cap reached, remaining subjects wait for the next run"
            );
        } else if outcome.published > 0 || outcome.failed > 0 {
            tracing::info!(
                published = outcome.published,
                failed = outcome.failed,
                "Publish run completed"
            );
        }
        Ok(outcome)
    }
}

/// Union of both subject sources; identifier sets are merged on collision.
fn merge_subjects(account: SubjectMap, person: SubjectMap) -> SubjectMap {
    let mut merged = account;
    for (actor, identifiers) in person {
        merged.entry(actor).or_default().extend(identifiers);
    }
    merged
}
