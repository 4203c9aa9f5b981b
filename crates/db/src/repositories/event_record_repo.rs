//! Repository for the `received_events` table.

use personfeed_core::event::EventCategory;
use personfeed_core::types::{DbId, Timestamp};
use sqlx::PgExecutor;

use crate::models::event_record::{EventRecord, EventStatus, NewEventRecord};

/// Column list for `received_events` queries.
const COLUMNS: &str = "\
    id, event_id, category, change_kind, subject_identifiers, actor_id, \
    previous_event_id, master_source, source_offset, payload, \
    status, status_changed_at, created_at";

/// Provides read/write operations for stored event records.
pub struct EventRecordRepo;

impl EventRecordRepo {
    /// Dedup check on the (event id, category) identity.
    pub async fn exists(
        ex: impl PgExecutor<'_>,
        event_id: &str,
        category: EventCategory,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM received_events WHERE event_id = $1 AND category = $2)",
        )
        .bind(event_id)
        .bind(category.as_str())
        .fetch_one(ex)
        .await
    }

    /// Find the not-yet-transferred record with the given upstream event id,
    /// taking a row lock so concurrent corrections and annulments racing on
    /// the same predecessor are serialized.
    pub async fn find_received_for_update(
        ex: impl PgExecutor<'_>,
        event_id: &str,
    ) -> Result<Option<EventRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM received_events \
             WHERE event_id = $1 AND status = $2 \
             FOR UPDATE"
        );
        sqlx::query_as::<_, EventRecord>(&query)
            .bind(event_id)
            .bind(EventStatus::Received)
            .fetch_optional(ex)
            .await
    }

    /// Insert a new record with the status derived by reconciliation.
    ///
    /// The unique constraint on (event id, category) rejects a second insert
    /// for the same identity; callers dedup first, the constraint is the
    /// idempotency backstop.
    pub async fn insert(
        ex: impl PgExecutor<'_>,
        new: &NewEventRecord,
        status: EventStatus,
    ) -> Result<EventRecord, sqlx::Error> {
        let query = format!(
            "INSERT INTO received_events \
                (event_id, category, change_kind, subject_identifiers, actor_id, \
                 previous_event_id, master_source, source_offset, payload, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, EventRecord>(&query)
            .bind(&new.event_id)
            .bind(new.category.as_str())
            .bind(new.change_kind.as_str())
            .bind(&new.subject_identifiers)
            .bind(&new.actor_id)
            .bind(&new.previous_event_id)
            .bind(&new.master_source)
            .bind(new.source_offset)
            .bind(&new.payload)
            .bind(status)
            .fetch_one(ex)
            .await
    }

    /// Single-row status update with timestamp refresh.
    pub async fn mark_status(
        ex: impl PgExecutor<'_>,
        id: DbId,
        status: EventStatus,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE received_events SET status = $2, status_changed_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(ex)
        .await?;
        Ok(result.rows_affected())
    }

    /// Set-based status update with timestamp refresh.
    pub async fn mark_status_many(
        ex: impl PgExecutor<'_>,
        ids: &[DbId],
        status: EventStatus,
    ) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE received_events SET status = $2, status_changed_at = now() WHERE id = ANY($1)",
        )
        .bind(ids)
        .bind(status)
        .execute(ex)
        .await?;
        Ok(result.rows_affected())
    }

    /// Received records whose debounce window has elapsed, oldest first.
    pub async fn transfer_candidates(
        ex: impl PgExecutor<'_>,
        older_than: Timestamp,
        limit: i64,
    ) -> Result<Vec<EventRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM received_events \
             WHERE status = $1 AND status_changed_at < $2 \
             ORDER BY status_changed_at \
             LIMIT $3"
        );
        sqlx::query_as::<_, EventRecord>(&query)
            .bind(EventStatus::Received)
            .bind(older_than)
            .bind(limit)
            .fetch_all(ex)
            .await
    }

    /// Ids of records in the given status with a status change before `before`.
    pub async fn expired_ids(
        ex: impl PgExecutor<'_>,
        status: EventStatus,
        before: Timestamp,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT id FROM received_events WHERE status = $1 AND status_changed_at < $2 ORDER BY id",
        )
        .bind(status)
        .bind(before)
        .fetch_all(ex)
        .await
    }

    /// Delete a chunk of rows by id, returning how many went away.
    pub async fn delete_by_ids(
        ex: impl PgExecutor<'_>,
        ids: &[DbId],
    ) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM received_events WHERE id = ANY($1)")
            .bind(ids)
            .execute(ex)
            .await?;
        Ok(result.rows_affected())
    }

    /// Actor id and identifier list of every record still in `received`.
    pub async fn unpublished_subjects(
        ex: impl PgExecutor<'_>,
    ) -> Result<Vec<(String, Vec<String>)>, sqlx::Error> {
        sqlx::query_as(
            "SELECT actor_id, subject_identifiers FROM received_events WHERE status = $1",
        )
        .bind(EventStatus::Received)
        .fetch_all(ex)
        .await
    }

    /// Move a subject's `received` records to the terminal `published` status.
    pub async fn mark_subject_published(
        ex: impl PgExecutor<'_>,
        actor_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE received_events SET status = $2, status_changed_at = now() \
             WHERE actor_id = $1 AND status = $3",
        )
        .bind(actor_id)
        .bind(EventStatus::Published)
        .bind(EventStatus::Received)
        .execute(ex)
        .await?;
        Ok(result.rows_affected())
    }
}
