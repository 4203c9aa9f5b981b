//! Intake processors for the two upstream streams.
//!
//! [`processor::LifeEventProcessor`] handles the life-event stream,
//! [`account_changes::AccountChangeIntake`] the account-change stream. Both
//! are driven synchronously, one message at a time, by the upstream
//! consumer: storage must complete before the consumer acknowledges, and
//! errors propagate so the message is redelivered instead of lost.

pub mod account_changes;
pub mod processor;

pub use account_changes::{AccountChangeIntake, ResolveError, SubjectResolver};
pub use processor::{IntakeError, LifeEventProcessor};
