//! Time-boxed snapshot cache.
//!
//! Entries live in a [`KeyValueStore`] under `wx:<lat>,<lon>` (4 decimals) as
//! `{"time": <epoch millis>, "data": <raw payload>}`. Freshness is checked on
//! read; stale entries are left in place and overwritten by the next write.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::store::KeyValueStore;
use crate::types::{GeoLocation, WeatherError};

/// Default time-to-live of a cached snapshot.
pub const DEFAULT_TTL_MINUTES: i64 = 30;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    /// Epoch millis of the fetch
    time: i64,
    data: Value,
}

/// Cache key for a location: coordinates quantized to 4 decimal places.
pub fn cache_key(location: &GeoLocation) -> String {
    format!("wx:{:.4},{:.4}", location.latitude, location.longitude)
}

pub struct WeatherCache<K> {
    store: K,
    ttl: Duration,
    corrupt_reads: AtomicU64,
}

impl<K: KeyValueStore> WeatherCache<K> {
    pub fn new(store: K) -> Self {
        Self {
            store,
            ttl: Duration::minutes(DEFAULT_TTL_MINUTES),
            corrupt_reads: AtomicU64::new(0),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh payload for a location, if any.
    ///
    /// Unparseable entries are logged, counted and reported as a miss.
    /// Only store failures are returned as errors.
    pub fn read(&self, location: &GeoLocation, now: DateTime<Utc>) -> Result<Option<Value>, WeatherError> {
        let key = cache_key(location);
        let Some(raw) = self.store.get(&key)? else {
            return Ok(None);
        };

        match parse_entry(&key, &raw) {
            Ok(entry) if now.timestamp_millis() - entry.time < self.ttl.num_milliseconds() => {
                debug!("Cache hit for {}", key);
                Ok(Some(entry.data))
            }
            Ok(_) => {
                debug!("Cache entry for {} is stale", key);
                Ok(None)
            }
            Err(e) => {
                self.corrupt_reads.fetch_add(1, Ordering::Relaxed);
                warn!("Ignoring cache entry: {}", e);
                Ok(None)
            }
        }
    }

    /// Store a payload fetched at `now`.
    pub fn write(&self, location: &GeoLocation, payload: &Value, now: DateTime<Utc>) -> Result<(), WeatherError> {
        let entry = CacheEntry {
            time: now.timestamp_millis(),
            data: payload.clone(),
        };
        let raw = serde_json::to_string(&entry).map_err(|e| WeatherError::Cache(e.to_string()))?;
        self.store.set(&cache_key(location), &raw)
    }

    pub fn evict(&self, location: &GeoLocation) -> Result<(), WeatherError> {
        self.store.remove(&cache_key(location))
    }

    /// Number of unparseable entries seen since creation.
    pub fn corrupt_reads(&self) -> u64 {
        self.corrupt_reads.load(Ordering::Relaxed)
    }
}

fn parse_entry(key: &str, raw: &str) -> Result<CacheEntry, WeatherError> {
    serde_json::from_str(raw).map_err(|e| WeatherError::CacheCorrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use crate::store::MemoryKeyValueStore;
    use chrono::TimeZone;
    use serde_json::json;

    fn patna() -> GeoLocation {
        GeoLocation::new("Bihar", "Patna", 25.5941, 85.1376)
    }

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_750_000_000, 0).unwrap()
    }

    #[test]
    fn test_cache_key_quantized() {
        assert_eq!(cache_key(&patna()), "wx:25.5941,85.1376");
        let loc = GeoLocation::new("X", "Y", 19.076, -72.1);
        assert_eq!(cache_key(&loc), "wx:19.0760,-72.1000");
    }

    #[test]
    fn test_entry_shape() {
        let cache = WeatherCache::new(MemoryKeyValueStore::new());
        cache.write(&patna(), &json!({"main": {"temp": 30}}), t0()).unwrap();

        let raw = cache.store.get("wx:25.5941,85.1376").unwrap().unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["time"], t0().timestamp_millis());
        assert_eq!(value["data"]["main"]["temp"], 30);
    }

    #[test]
    fn test_ttl_boundaries() {
        let cache = WeatherCache::new(MemoryKeyValueStore::new());
        let payload = json!({"main": {"temp": 30}});
        cache.write(&patna(), &payload, t0()).unwrap();

        assert_eq!(cache.read(&patna(), t0() + Duration::minutes(29)).unwrap(), Some(payload));
        assert_eq!(cache.read(&patna(), t0() + Duration::minutes(30)).unwrap(), None);
        assert_eq!(cache.read(&patna(), t0() + Duration::minutes(31)).unwrap(), None);
    }

    #[test]
    fn test_corrupt_entry_is_a_counted_miss() {
        let cache = WeatherCache::new(MemoryKeyValueStore::new());
        cache.store.set(&cache_key(&patna()), "{not json").unwrap();

        assert_eq!(cache.read(&patna(), t0()).unwrap(), None);
        assert_eq!(cache.corrupt_reads(), 1);
    }

    #[test]
    fn test_evict() {
        let cache = WeatherCache::new(MemoryKeyValueStore::new());
        cache.write(&patna(), &json!({}), t0()).unwrap();
        cache.evict(&patna()).unwrap();
        assert_eq!(cache.read(&patna(), t0()).unwrap(), None);
        assert_eq!(cache.corrupt_reads(), 0);
    }
}
