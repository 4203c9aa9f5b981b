//! Per-category validation and dedup dispatch for incoming life events.

use std::sync::Arc;

use chrono::{Months, NaiveDate, Utc};
use personfeed_core::event::{ChangeKind, EventCategory, EventDetails, LifeEvent};
use personfeed_core::metrics::IntakeMetrics;
use personfeed_db::models::EventRecord;
use personfeed_db::store::{EventStore, StoreError};

/// Birth country code treated as domestic.
const DOMESTIC_COUNTRY: &str = "NOR";

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("storage failure: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Resolve(#[from] crate::account_changes::ResolveError),
}

/// Receives one typed life event at a time and decides whether it is stored.
pub struct LifeEventProcessor {
    store: EventStore,
    metrics: Arc<dyn IntakeMetrics>,
}

impl LifeEventProcessor {
    pub fn new(store: EventStore, metrics: Arc<dyn IntakeMetrics>) -> Self {
        Self { store, metrics }
    }

    /// Process one event: dedup, category rule, storage.
    ///
    /// Returns the stored record when the event was persisted, `None` when
    /// it was dropped as unsupported, duplicate, or by a category rule.
    /// Storage errors propagate so the consumer does not acknowledge the
    /// message.
    pub async fn process(&self, event: LifeEvent) -> Result<Option<EventRecord>, IntakeError> {
        let category = event.category();

        if category == EventCategory::Unsupported {
            tracing::info!(event_id = %event.event_id, "Unsupported category, event dropped");
            self.metrics.event_ignored(category);
            return Ok(None);
        }

        if self.store.exists(&event.event_id, category).await? {
            self.metrics.duplicate();
            tracing::debug!(
                event_id = %event.event_id,
                category = %category,
                "Duplicate event discarded"
            );
            return Ok(None);
        }

        self.metrics.event_received(category, event.change_kind);
        tracing::info!(
            event_id = %event.event_id,
            offset = event.source_offset,
            category = %category,
            change_kind = %event.change_kind,
            "Life event received"
        );

        if !self.applies_for_storage(&event) {
            return Ok(None);
        }

        let record = self.store.store_event(&event).await?;
        Ok(Some(record))
    }

    /// The per-category rule table. Returns `false` when the event must not
    /// be persisted; every drop is logged here, together with the advisory
    /// warnings for events that are kept anyway.
    fn applies_for_storage(&self, event: &LifeEvent) -> bool {
        let category = event.category();
        let kind = event.change_kind;
        match &event.details {
            EventDetails::Death { death_date } => match kind {
                ChangeKind::Created | ChangeKind::Corrected if death_date.is_none() => {
                    tracing::error!(
                        event_id = %event.event_id,
                        "Death date missing, event dropped"
                    );
                    self.metrics.event_ignored(category);
                    false
                }
                _ => true,
            },

            EventDetails::Birth {
                birth_date,
                birth_country,
            } => match kind {
                ChangeKind::Annulled | ChangeKind::Closed => true,
                ChangeKind::Created | ChangeKind::Corrected => match birth_date {
                    None => {
                        tracing::warn!(
                            event_id = %event.event_id,
                            "Birth date missing, event dropped"
                        );
                        self.metrics.event_ignored(category);
                        false
                    }
                    Some(date) if is_under_six_months(*date, Utc::now().date_naive()) => {
                        match birth_country.as_deref() {
                            Some(country) if country != DOMESTIC_COUNTRY => {
                                tracing::info!(
                                    event_id = %event.event_id,
                                    country,
                                    "Birth abroad under six months old, event dropped"
                                );
                            }
                            _ => {
                                tracing::info!(
                                    event_id = %event.event_id,
                                    "Child under six months old, event dropped"
                                );
                            }
                        }
                        self.metrics.event_ignored(category);
                        false
                    }
                    Some(_) => true,
                },
            },

            EventDetails::Name {
                first_name,
                last_name,
            } => match kind {
                ChangeKind::Created | ChangeKind::Corrected => {
                    if first_name.is_none() || last_name.is_none() {
                        let missing = if first_name.is_none() {
                            "first name"
                        } else {
                            "last name"
                        };
                        tracing::info!(
                            event_id = %event.event_id,
                            missing,
                            "Name part missing, event dropped"
                        );
                        false
                    } else {
                        true
                    }
                }
                _ => true,
            },

            EventDetails::NationalId { identifier_kind } => {
                // Validation is advisory here: the record is kept either way.
                if matches!(kind, ChangeKind::Created | ChangeKind::Corrected)
                    && identifier_kind.is_none()
                {
                    tracing::error!(
                        event_id = %event.event_id,
                        "National-id kind missing"
                    );
                    self.metrics.event_ignored(category);
                }
                true
            }

            EventDetails::Immigration { .. } | EventDetails::Emigration { .. } => match kind {
                ChangeKind::Created | ChangeKind::Annulled => true,
                _ => {
                    tracing::info!(
                        event_id = %event.event_id,
                        category = %category,
                        change_kind = %kind,
                        "Change kind not handled for this category, event dropped"
                    );
                    self.metrics.event_ignored(category);
                    false
                }
            },

            EventDetails::MaritalStatus { .. } => match kind {
                ChangeKind::Created | ChangeKind::Corrected | ChangeKind::Annulled => true,
                ChangeKind::Closed => {
                    tracing::info!(
                        event_id = %event.event_id,
                        change_kind = %kind,
                        "Change kind not handled for marital status, event dropped"
                    );
                    false
                }
            },

            EventDetails::AddressProtection
            | EventDetails::ResidentialAddress { .. }
            | EventDetails::Guardianship { .. } => {
                if kind != ChangeKind::Created {
                    tracing::warn!(
                        event_id = %event.event_id,
                        category = %category,
                        change_kind = %kind,
                        "Event was not of kind CREATED"
                    );
                }
                true
            }

            // Filtered out before the rule table is consulted.
            EventDetails::Unsupported => false,
        }
    }
}

/// Whether `today` falls before the six-month anniversary of `birth_date`.
fn is_under_six_months(birth_date: NaiveDate, today: NaiveDate) -> bool {
    match birth_date.checked_add_months(Months::new(6)) {
        Some(anniversary) => today < anniversary,
        None => false,
    }
}
