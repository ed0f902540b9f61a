//! Cache module for persisting the last device fix to disk
//!
//! `CacheManager` stores one JSON value per key; `LocationCache` layers the
//! location slot and its freshness window on top. Unreadable slots degrade to a
//! cache miss rather than an error.

mod location;
mod manager;

pub use location::{CacheEntry, LocationCache, DEFAULT_LOCATION_TTL, LOCATION_CACHE_KEY};
pub use manager::{CacheError, CacheManager};
