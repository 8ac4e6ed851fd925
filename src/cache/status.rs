//! Read-only cache diagnostics.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::time::Duration;

/// State of one cached inventory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryStatus {
    pub is_cached: bool,
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_secs", rename = "ttl_secs")]
    pub ttl: Duration,
    #[serde(serialize_with = "serialize_opt_secs", rename = "age_secs")]
    pub age: Option<Duration>,
    pub is_valid: bool,
    pub entity_count: usize,
    /// Completed refreshes since the cache was built
    pub refresh_count: u64,
    /// Error of the most recent failed refresh, cleared on success
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheSettings {
    pub background_refresh_enabled: bool,
    pub background_refresh_running: bool,
    #[serde(serialize_with = "serialize_secs", rename = "refresh_interval_secs")]
    pub refresh_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatus {
    pub tenants: InventoryStatus,
    pub components: InventoryStatus,
    pub config: CacheSettings,
}

fn serialize_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

fn serialize_opt_secs<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => s.serialize_some(&d.as_secs()),
        None => s.serialize_none(),
    }
}
