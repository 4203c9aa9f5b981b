//! Row model for the `received_events` inbox table.

use personfeed_core::event::{ChangeKind, EventCategory};
use personfeed_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Lifecycle of a stored event record.
///
/// `received` is the only entry state. The transfer path moves a record
/// through `in_progress` to `transferred` or `transfer_failed`; the
/// reconciliation step can move it to `cancelled`; the publish path can
/// move it to `published`. `cancelled`, `transferred` and `published` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "event_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Received,
    InProgress,
    Transferred,
    TransferFailed,
    Cancelled,
    Published,
}

/// A row from `received_events`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EventRecord {
    pub id: DbId,
    pub event_id: String,
    #[sqlx(try_from = "String")]
    pub category: EventCategory,
    #[sqlx(try_from = "String")]
    pub change_kind: ChangeKind,
    pub subject_identifiers: Vec<String>,
    pub actor_id: String,
    pub previous_event_id: Option<String>,
    pub master_source: String,
    pub source_offset: i64,
    pub payload: serde_json::Value,
    pub status: EventStatus,
    pub status_changed_at: Timestamp,
    pub created_at: Timestamp,
}

/// Insert payload for `received_events`; the status is derived by the
/// event store's reconciliation step, never chosen by callers.
#[derive(Debug, Clone)]
pub struct NewEventRecord {
    pub event_id: String,
    pub category: EventCategory,
    pub change_kind: ChangeKind,
    pub subject_identifiers: Vec<String>,
    pub actor_id: String,
    pub previous_event_id: Option<String>,
    pub master_source: String,
    pub source_offset: i64,
    pub payload: serde_json::Value,
}
