//! Row model for the `account_changes` table.

use personfeed_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "account_change_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountChangeStatus {
    Received,
    Published,
}

/// A row from `account_changes`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AccountChange {
    pub id: DbId,
    pub actor_id: String,
    pub status: AccountChangeStatus,
    pub received_at: Timestamp,
    pub published_at: Option<Timestamp>,
}
