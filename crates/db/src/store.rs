//! The event store: single owner of writes to `received_events` and
//! `account_changes`.
//!
//! All status transitions go through here. The reconciliation step in
//! [`EventStore::store_event`] links an incoming event to the predecessor it
//! corrects or annuls and derives the new record's initial status from the
//! outcome.

use std::collections::{BTreeMap, BTreeSet};

use personfeed_core::event::{ChangeKind, EventCategory, LifeEvent, MAX_SUBJECT_IDENTIFIERS};
use personfeed_core::types::{DbId, Timestamp};

use crate::models::account_change::AccountChange;
use crate::models::event_record::{EventRecord, EventStatus, NewEventRecord};
use crate::repositories::{AccountChangeRepo, EventRecordRepo};
use crate::DbPool;

/// Subjects keyed by actor id, each with the identifiers known for them.
///
/// Ordered maps so that batch truncation downstream is deterministic within
/// a run.
pub type SubjectMap = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database failure: {0}")]
    Db(#[from] sqlx::Error),

    #[error("event payload could not be serialized: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Persistence facade over both record tables.
#[derive(Debug, Clone)]
pub struct EventStore {
    pool: DbPool,
}

impl EventStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Dedup check on the (event id, category) identity. Read-only.
    pub async fn exists(
        &self,
        event_id: &str,
        category: EventCategory,
    ) -> Result<bool, StoreError> {
        Ok(EventRecordRepo::exists(&self.pool, event_id, category).await?)
    }

    /// Persist a life event, reconciling it against its predecessor.
    ///
    /// When the event names a previous event that is still `received`, that
    /// predecessor is cancelled. A correction then enters as `received` (it
    /// supersedes but must still be delivered); any other change kind enters
    /// as `cancelled` because both ends of the chain are void. A missing
    /// predecessor is a normal case: it was already delivered or never
    /// arrived, and the new record enters as `received`.
    ///
    /// Runs in one transaction with a row lock on the predecessor, so
    /// concurrent corrections and annulments racing on the same predecessor
    /// are serialized.
    pub async fn store_event(&self, event: &LifeEvent) -> Result<EventRecord, StoreError> {
        let mut tx = self.pool.begin().await?;

        let mut status = EventStatus::Received;
        if let Some(previous) = event.previous_event_id.as_deref() {
            match EventRecordRepo::find_received_for_update(&mut *tx, previous).await? {
                Some(predecessor) => {
                    EventRecordRepo::mark_status(&mut *tx, predecessor.id, EventStatus::Cancelled)
                        .await?;
                    status = match event.change_kind {
                        ChangeKind::Corrected => EventStatus::Received,
                        _ => EventStatus::Cancelled,
                    };
                    tracing::info!(
                        event_id = %event.event_id,
                        previous_event_id = %previous,
                        new_status = ?status,
                        "Predecessor cancelled by incoming event"
                    );
                }
                None => {
                    tracing::debug!(
                        event_id = %event.event_id,
                        previous_event_id = %previous,
                        "Previous event not in store, nothing to cancel"
                    );
                }
            }
        }

        let new = NewEventRecord {
            event_id: event.event_id.clone(),
            category: event.category(),
            change_kind: event.change_kind,
            subject_identifiers: capped_identifiers(event),
            actor_id: event.actor_id.clone(),
            previous_event_id: event.previous_event_id.clone(),
            master_source: event.master_source.clone(),
            source_offset: event.source_offset,
            payload: serde_json::to_value(event)?,
        };
        let record = EventRecordRepo::insert(&mut *tx, &new, status).await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Single-row status update with timestamp refresh. Atomic per row.
    pub async fn mark_status(&self, id: DbId, status: EventStatus) -> Result<(), StoreError> {
        EventRecordRepo::mark_status(&self.pool, id, status).await?;
        Ok(())
    }

    /// Status update for a whole batch, timestamp refreshed per row.
    pub async fn mark_status_many(
        &self,
        ids: &[DbId],
        status: EventStatus,
    ) -> Result<u64, StoreError> {
        Ok(EventRecordRepo::mark_status_many(&self.pool, ids, status).await?)
    }

    /// Received records whose debounce window elapsed before `older_than`,
    /// capped at `limit`.
    pub async fn transfer_candidates(
        &self,
        older_than: Timestamp,
        limit: i64,
    ) -> Result<Vec<EventRecord>, StoreError> {
        Ok(EventRecordRepo::transfer_candidates(&self.pool, older_than, limit).await?)
    }

    /// Ids of records in `status` whose last status change was before
    /// `before`. Used by retention.
    pub async fn expired_ids(
        &self,
        status: EventStatus,
        before: Timestamp,
    ) -> Result<Vec<DbId>, StoreError> {
        Ok(EventRecordRepo::expired_ids(&self.pool, status, before).await?)
    }

    /// Delete one chunk of a logical selection. Safe to call repeatedly with
    /// disjoint chunks.
    pub async fn delete_by_ids(&self, ids: &[DbId]) -> Result<u64, StoreError> {
        Ok(EventRecordRepo::delete_by_ids(&self.pool, ids).await?)
    }

    /// Store one account change for an already-resolved subject.
    pub async fn store_account_change(&self, actor_id: &str) -> Result<AccountChange, StoreError> {
        Ok(AccountChangeRepo::insert(&self.pool, actor_id).await?)
    }

    /// Subjects with a pending account change, each mapped to the identifier
    /// set the account stream knows for them (the actor id itself).
    pub async fn account_change_subjects(
        &self,
        received_before: Timestamp,
        published_before: Timestamp,
    ) -> Result<SubjectMap, StoreError> {
        let actors = AccountChangeRepo::subjects_pending_publish(
            &self.pool,
            received_before,
            published_before,
        )
        .await?;
        Ok(actors
            .into_iter()
            .map(|actor| {
                let identifiers = BTreeSet::from([actor.clone()]);
                (actor, identifiers)
            })
            .collect())
    }

    /// Subjects of event records not yet folded into a publish, with the
    /// union of all identifiers seen for each subject.
    pub async fn person_change_subjects(&self) -> Result<SubjectMap, StoreError> {
        let rows = EventRecordRepo::unpublished_subjects(&self.pool).await?;
        let mut subjects = SubjectMap::new();
        for (actor, identifiers) in rows {
            subjects.entry(actor).or_default().extend(identifiers);
        }
        Ok(subjects)
    }

    /// After a successful publish for a subject: mark its pending account
    /// changes published and move its `received` event records to the
    /// terminal `published` status, in one transaction.
    pub async fn mark_subject_published(&self, actor_id: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        AccountChangeRepo::mark_published(&mut *tx, actor_id).await?;
        EventRecordRepo::mark_subject_published(&mut *tx, actor_id).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// At most [`MAX_SUBJECT_IDENTIFIERS`] identifiers are stored per event.
fn capped_identifiers(event: &LifeEvent) -> Vec<String> {
    if event.subject_identifiers.len() > MAX_SUBJECT_IDENTIFIERS {
        tracing::warn!(
            event_id = %event.event_id,
            count = event.subject_identifiers.len(),
            kept = MAX_SUBJECT_IDENTIFIERS,
            "Event carries more subject identifiers than the cap, excess dropped"
        );
        event.subject_identifiers[..MAX_SUBJECT_IDENTIFIERS].to_vec()
    } else {
        event.subject_identifiers.clone()
    }
}
