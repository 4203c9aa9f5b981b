//! Injected counter sink for intake observability.
//!
//! Every intake decision (received, ignored, duplicate) reports here, keyed
//! by category and change kind. The sink is injected so the processors carry
//! no process-wide mutable state; production wiring can adapt it to whatever
//! metrics backend the deployment uses.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::event::{ChangeKind, EventCategory};

/// Counter sink for intake decisions. Implementations must be cheap and
/// must not block.
pub trait IntakeMetrics: Send + Sync {
    /// An event of the given category and change kind passed the dedup check.
    fn event_received(&self, category: EventCategory, kind: ChangeKind);

    /// An event was dropped or flagged by a category rule.
    fn event_ignored(&self, category: EventCategory);

    /// An event was discarded as a duplicate of a stored record.
    fn duplicate(&self);
}

/// Sink that discards every increment.
#[derive(Debug, Default)]
pub struct NoopMetrics;

impl IntakeMetrics for NoopMetrics {
    fn event_received(&self, _category: EventCategory, _kind: ChangeKind) {}
    fn event_ignored(&self, _category: EventCategory) {}
    fn duplicate(&self) {}
}

/// In-memory sink that records every increment, for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    counts: Mutex<HashMap<String, u64>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter, zero if it never fired.
    ///
    /// Counter names are `<CATEGORY>.<KIND>`, `<CATEGORY>.ignored` and
    /// `duplicate`.
    pub fn count(&self, name: &str) -> u64 {
        self.counts
            .lock()
            .expect("metrics mutex poisoned")
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    fn bump(&self, name: String) {
        *self
            .counts
            .lock()
            .expect("metrics mutex poisoned")
            .entry(name)
            .or_insert(0) += 1;
    }
}

impl IntakeMetrics for RecordingMetrics {
    fn event_received(&self, category: EventCategory, kind: ChangeKind) {
        self.bump(format!("{category}.{kind}"));
    }

    fn event_ignored(&self, category: EventCategory) {
        self.bump(format!("{category}.ignored"));
    }

    fn duplicate(&self) {
        self.bump("duplicate".to_string());
    }
}
