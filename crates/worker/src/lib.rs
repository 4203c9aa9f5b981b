//! Scheduled delivery and maintenance jobs on top of the event store.

pub mod jobs;
pub mod outbound;
pub mod settings;
