//! Repository for the `account_changes` table.

use personfeed_core::types::Timestamp;
use sqlx::PgExecutor;

use crate::models::account_change::{AccountChange, AccountChangeStatus};

const COLUMNS: &str = "id, actor_id, status, received_at, published_at";

/// Provides read/write operations for account-change records.
pub struct AccountChangeRepo;

impl AccountChangeRepo {
    pub async fn insert(
        ex: impl PgExecutor<'_>,
        actor_id: &str,
    ) -> Result<AccountChange, sqlx::Error> {
        let query = format!(
            "INSERT INTO account_changes (actor_id) VALUES ($1) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AccountChange>(&query)
            .bind(actor_id)
            .fetch_one(ex)
            .await
    }

    /// Distinct subjects with a pending account change: received before the
    /// debounce cutoff and not published more recently than the damping
    /// cutoff.
    pub async fn subjects_pending_publish(
        ex: impl PgExecutor<'_>,
        received_before: Timestamp,
        published_before: Timestamp,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT DISTINCT actor_id FROM account_changes \
             WHERE status = $1 AND received_at < $2 \
               AND (published_at IS NULL OR published_at < $3)",
        )
        .bind(AccountChangeStatus::Received)
        .bind(received_before)
        .bind(published_before)
        .fetch_all(ex)
        .await
    }

    /// Mark every pending change of a subject as published.
    pub async fn mark_published(
        ex: impl PgExecutor<'_>,
        actor_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE account_changes SET status = $2, published_at = now() \
             WHERE actor_id = $1 AND status = $3",
        )
        .bind(actor_id)
        .bind(AccountChangeStatus::Published)
        .bind(AccountChangeStatus::Received)
        .execute(ex)
        .await?;
        Ok(result.rows_affected())
    }
}
