//! Typed life-event records from the population-registry stream.
//!
//! A [`LifeEvent`] is what the upstream deserializer hands us: one change to
//! one person's registry data. The category-specific payload is a closed
//! tagged union ([`EventDetails`]) so every consumer dispatches with an
//! exhaustive match.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Maximum number of subject identifiers retained per event. Excess
/// identifiers are dropped at storage time with a warning.
pub const MAX_SUBJECT_IDENTIFIERS: usize = 20;

/// Length of the stable actor-identifier class.
pub const ACTOR_ID_LENGTH: usize = 13;

/// A value that does not map to any known enum variant.
#[derive(Debug, thiserror::Error)]
#[error("unknown {what} value: {value}")]
pub struct UnknownVariant {
    pub what: &'static str,
    pub value: String,
}

// ---------------------------------------------------------------------------
// EventCategory
// ---------------------------------------------------------------------------

/// The closed set of life-event categories the service recognizes.
///
/// Anything the upstream deserializer cannot map lands in `Unsupported` and
/// is dropped at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCategory {
    AddressProtection,
    ResidentialAddress,
    Death,
    Birth,
    NationalId,
    Immigration,
    Name,
    Emigration,
    MaritalStatus,
    Guardianship,
    Unsupported,
}

impl EventCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            EventCategory::AddressProtection => "ADDRESS_PROTECTION",
            EventCategory::ResidentialAddress => "RESIDENTIAL_ADDRESS",
            EventCategory::Death => "DEATH",
            EventCategory::Birth => "BIRTH",
            EventCategory::NationalId => "NATIONAL_ID",
            EventCategory::Immigration => "IMMIGRATION",
            EventCategory::Name => "NAME",
            EventCategory::Emigration => "EMIGRATION",
            EventCategory::MaritalStatus => "MARITAL_STATUS",
            EventCategory::Guardianship => "GUARDIANSHIP",
            EventCategory::Unsupported => "UNSUPPORTED",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventCategory {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADDRESS_PROTECTION" => Ok(EventCategory::AddressProtection),
            "RESIDENTIAL_ADDRESS" => Ok(EventCategory::ResidentialAddress),
            "DEATH" => Ok(EventCategory::Death),
            "BIRTH" => Ok(EventCategory::Birth),
            "NATIONAL_ID" => Ok(EventCategory::NationalId),
            "IMMIGRATION" => Ok(EventCategory::Immigration),
            "NAME" => Ok(EventCategory::Name),
            "EMIGRATION" => Ok(EventCategory::Emigration),
            "MARITAL_STATUS" => Ok(EventCategory::MaritalStatus),
            "GUARDIANSHIP" => Ok(EventCategory::Guardianship),
            "UNSUPPORTED" => Ok(EventCategory::Unsupported),
            other => Err(UnknownVariant {
                what: "event category",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for EventCategory {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// ChangeKind
// ---------------------------------------------------------------------------

/// How the upstream registry changed the underlying data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Created,
    Corrected,
    Annulled,
    Closed,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Created => "CREATED",
            ChangeKind::Corrected => "CORRECTED",
            ChangeKind::Annulled => "ANNULLED",
            ChangeKind::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(ChangeKind::Created),
            "CORRECTED" => Ok(ChangeKind::Corrected),
            "ANNULLED" => Ok(ChangeKind::Annulled),
            "CLOSED" => Ok(ChangeKind::Closed),
            other => Err(UnknownVariant {
                what: "change kind",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for ChangeKind {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Sensitivity level attached to an event's subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    StrictlyConfidentialAbroad,
    StrictlyConfidential,
    Confidential,
    #[default]
    Unclassified,
}

// ---------------------------------------------------------------------------
// EventDetails
// ---------------------------------------------------------------------------

/// Category-specific payload, exactly one variant per category.
///
/// Fields are optional where the upstream source may omit them; the intake
/// rules decide what a missing field means per category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventDetails {
    AddressProtection,
    ResidentialAddress {
        move_date: Option<NaiveDate>,
    },
    Death {
        death_date: Option<NaiveDate>,
    },
    Birth {
        birth_date: Option<NaiveDate>,
        birth_country: Option<String>,
    },
    NationalId {
        identifier_kind: Option<String>,
    },
    Immigration {
        from_country: Option<String>,
    },
    Name {
        first_name: Option<String>,
        last_name: Option<String>,
    },
    Emigration {
        emigration_date: Option<NaiveDate>,
    },
    MaritalStatus {
        changed_at: Option<NaiveDate>,
    },
    Guardianship {
        scope: Option<String>,
    },
    Unsupported,
}

impl EventDetails {
    pub fn category(&self) -> EventCategory {
        match self {
            EventDetails::AddressProtection => EventCategory::AddressProtection,
            EventDetails::ResidentialAddress { .. } => EventCategory::ResidentialAddress,
            EventDetails::Death { .. } => EventCategory::Death,
            EventDetails::Birth { .. } => EventCategory::Birth,
            EventDetails::NationalId { .. } => EventCategory::NationalId,
            EventDetails::Immigration { .. } => EventCategory::Immigration,
            EventDetails::Name { .. } => EventCategory::Name,
            EventDetails::Emigration { .. } => EventCategory::Emigration,
            EventDetails::MaritalStatus { .. } => EventCategory::MaritalStatus,
            EventDetails::Guardianship { .. } => EventCategory::Guardianship,
            EventDetails::Unsupported => EventCategory::Unsupported,
        }
    }
}

// ---------------------------------------------------------------------------
// LifeEvent
// ---------------------------------------------------------------------------

/// One life-event notification as produced by the upstream deserializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeEvent {
    /// Globally unique per upstream partition and category.
    pub event_id: String,
    pub change_kind: ChangeKind,
    /// Every person identifier the event applies to.
    pub subject_identifiers: Vec<String>,
    /// The stable subject key (13-character identifier class).
    pub actor_id: String,
    /// Links to a prior event this one corrects or annuls.
    pub previous_event_id: Option<String>,
    pub created_at: Timestamp,
    pub source_offset: i64,
    pub master_source: String,
    #[serde(default)]
    pub classification: Classification,
    pub details: EventDetails,
}

impl LifeEvent {
    pub fn category(&self) -> EventCategory {
        self.details.category()
    }
}

/// One account-change notification from the account registry stream.
///
/// Carries an arbitrary person identifier; intake resolves it to the stable
/// actor id before storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountChangeNotification {
    pub subject_identifier: String,
}
