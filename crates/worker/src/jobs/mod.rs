//! Scheduled jobs, one per downstream obligation.
//!
//! Each job runs on its own `tokio::time::interval` and takes the
//! cluster-wide lease for its name before doing any work, so at most one
//! process in the fleet executes a given job at a time. Within a process
//! the loop itself serializes runs.

pub mod publish;
pub mod retention;
pub mod transfer;

use personfeed_db::store::StoreError;

pub use publish::PublishJob;
pub use retention::RetentionJob;
pub use transfer::TransferJob;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("database failure: {0}")]
    Db(#[from] sqlx::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}
