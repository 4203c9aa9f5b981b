//! Environment-driven service configuration.
//!
//! Every option has an in-code default except `DATABASE_URL` and the two
//! gateway URLs, which must be set.

use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    /// Destination name passed to the legacy delivery client.
    pub legacy_queue: String,
    pub legacy_gateway_url: String,
    pub publish_gateway_url: String,
    pub transfer: TransferSettings,
    pub publish: PublishSettings,
    pub retention: RetentionSettings,
}

#[derive(Debug, Clone)]
pub struct TransferSettings {
    /// Minimum minutes a received event sits before it becomes eligible,
    /// letting corrections and annulments arrive first.
    pub debounce_minutes: i64,
    pub batch_size: i64,
    pub interval: Duration,
    pub lock_min_hold: Duration,
    pub lock_max_hold: Duration,
}

#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub batch_size: usize,
    /// Minimum minutes an account change sits before it is published.
    pub debounce_minutes: i64,
    /// Subjects published within this many hours are skipped.
    pub republish_hours: i64,
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
    pub interval: Duration,
    pub lock_min_hold: Duration,
    pub lock_max_hold: Duration,
}

#[derive(Debug, Clone)]
pub struct RetentionSettings {
    pub retention_days: i64,
    pub delete_chunk_size: usize,
    pub interval: Duration,
    pub lock_min_hold: Duration,
    pub lock_max_hold: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            legacy_queue: required("LEGACY_QUEUE_NAME")?,
            legacy_gateway_url: required("LEGACY_GATEWAY_URL")?,
            publish_gateway_url: required("PUBLISH_GATEWAY_URL")?,
            transfer: TransferSettings {
                debounce_minutes: parsed("TRANSFER_DEBOUNCE_MINUTES", 120)?,
                batch_size: parsed("TRANSFER_BATCH_SIZE", 6500)?,
                interval: Duration::from_secs(parsed("TRANSFER_INTERVAL_SECS", 600)?),
                lock_min_hold: Duration::from_secs(parsed("TRANSFER_LOCK_MIN_SECS", 600)?),
                lock_max_hold: Duration::from_secs(parsed("TRANSFER_LOCK_MAX_SECS", 3600)?),
            },
            publish: PublishSettings {
                batch_size: parsed("PUBLISH_BATCH_SIZE", 2000)?,
                debounce_minutes: parsed("PUBLISH_DEBOUNCE_MINUTES", 120)?,
                republish_hours: parsed("PUBLISH_REPUBLISH_HOURS", 24)?,
                retry_attempts: parsed("PUBLISH_RETRY_ATTEMPTS", 3)?,
                retry_base_delay: Duration::from_secs(parsed("PUBLISH_RETRY_BASE_SECS", 1)?),
                interval: Duration::from_secs(parsed("PUBLISH_INTERVAL_SECS", 600)?),
                lock_min_hold: Duration::from_secs(parsed("PUBLISH_LOCK_MIN_SECS", 60)?),
                lock_max_hold: Duration::from_secs(parsed("PUBLISH_LOCK_MAX_SECS", 600)?),
            },
            retention: RetentionSettings {
                retention_days: parsed("RETENTION_DAYS", 7)?,
                delete_chunk_size: parsed("RETENTION_DELETE_CHUNK_SIZE", 65_000)?,
                interval: Duration::from_secs(parsed("RETENTION_INTERVAL_SECS", 3600)?),
                lock_min_hold: Duration::from_secs(parsed("RETENTION_LOCK_MIN_SECS", 30)?),
                lock_max_hold: Duration::from_secs(parsed("RETENTION_LOCK_MAX_SECS", 300)?),
            },
        })
    }
}

fn required(key: &'static str) -> Result<String, SettingsError> {
    std::env::var(key).map_err(|_| SettingsError::Missing(key))
}

fn parsed<T: FromStr>(key: &'static str, default: T) -> Result<T, SettingsError> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|_| SettingsError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}
