//! The persisted location slot
//!
//! Holds the last accepted device fix so the next session can start with a
//! provisional coordinate before any source answers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{CacheError, CacheManager};
use crate::data::Coordinate;

/// Key of the single location slot
pub const LOCATION_CACHE_KEY: &str = "andago_geo_cache";

/// How long a captured fix stays usable
pub const DEFAULT_LOCATION_TTL: Duration = Duration::from_secs(5 * 60);

/// One persisted fix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub latitude: f64,
    pub longitude: f64,
    pub captured_at_epoch_ms: i64,
}

impl CacheEntry {
    /// Stamps `coordinate` with the capture time
    pub fn capture(coordinate: Coordinate, now: DateTime<Utc>) -> Self {
        Self {
            latitude: coordinate.latitude(),
            longitude: coordinate.longitude(),
            captured_at_epoch_ms: now.timestamp_millis(),
        }
    }

    /// Fresh iff `now - captured_at < ttl`
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let age_ms = now.timestamp_millis() - self.captured_at_epoch_ms;
        i128::from(age_ms) < ttl.as_millis() as i128
    }
}

/// Typed access to the location slot with a freshness window
#[derive(Debug, Clone)]
pub struct LocationCache {
    manager: CacheManager,
    ttl: Duration,
}

impl LocationCache {
    pub fn new(manager: CacheManager, ttl: Duration) -> Self {
        Self { manager, ttl }
    }

    /// Returns the cached coordinate if the slot holds a fresh, valid fix
    ///
    /// Missing, stale and corrupt slots all read as a miss. Stale slots are
    /// left in place for the next device fix to overwrite.
    pub fn load_fresh(&self, now: DateTime<Utc>) -> Option<Coordinate> {
        let entry = match self.manager.read::<CacheEntry>(LOCATION_CACHE_KEY) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                tracing::debug!("no cached location");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable location cache");
                return None;
            }
        };

        if !entry.is_fresh(now, self.ttl) {
            tracing::debug!(
                captured_at_epoch_ms = entry.captured_at_epoch_ms,
                "cached location is stale"
            );
            return None;
        }

        let coordinate = Coordinate::new(entry.latitude, entry.longitude);
        if coordinate.is_none() {
            tracing::warn!(
                latitude = entry.latitude,
                longitude = entry.longitude,
                "ignoring cached location with invalid coordinates"
            );
        }
        coordinate
    }

    /// Persists `coordinate` as the latest fix
    pub fn store(&self, coordinate: Coordinate, now: DateTime<Utc>) -> Result<(), CacheError> {
        self.manager
            .write(LOCATION_CACHE_KEY, &CacheEntry::capture(coordinate, now))
    }

    /// Writes a raw entry, bypassing capture stamping
    pub fn store_entry(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        self.manager.write(LOCATION_CACHE_KEY, entry)
    }

    /// Reads the raw entry regardless of freshness
    pub fn peek(&self) -> Option<CacheEntry> {
        self.manager.read(LOCATION_CACHE_KEY).ok().flatten()
    }
}
