//! Weather board: refreshes a snapshot for every configured location.

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::cache::WeatherCache;
use crate::clock::{Clock, SystemClock};
use crate::provider::WeatherProvider;
use crate::state::RefreshStatus;
use crate::store::KeyValueStore;
use crate::types::{AlertThresholds, GeoLocation, LocationWeather, WeatherError, WeatherReport, WeatherSnapshot};

/// Tuning for a refresh batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardOptions {
    /// Upstream requests in flight at once. 1 means strictly sequential.
    pub max_concurrent: usize,
    pub thresholds: AlertThresholds,
}

impl Default for BoardOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 1,
            thresholds: AlertThresholds::default(),
        }
    }
}

pub struct WeatherBoard<K, C = SystemClock> {
    provider: WeatherProvider,
    cache: WeatherCache<K>,
    clock: C,
    locations: Vec<GeoLocation>,
    options: BoardOptions,
    status: Mutex<RefreshStatus>,
    last_report: Mutex<Option<WeatherReport>>,
}

/// Marks the board as loading; restores the previous status if the refresh
/// is dropped before it finishes.
struct RefreshGuard<'a> {
    status: &'a Mutex<RefreshStatus>,
    previous: RefreshStatus,
    outcome: Option<RefreshStatus>,
}

impl<'a> RefreshGuard<'a> {
    fn acquire(status: &'a Mutex<RefreshStatus>) -> Result<Self, WeatherError> {
        let mut current = status.lock();
        if !current.can_start_refresh() {
            return Err(WeatherError::RefreshInProgress);
        }
        let previous = *current;
        *current = RefreshStatus::Loading;
        Ok(Self {
            status,
            previous,
            outcome: None,
        })
    }

    fn finish(mut self, outcome: RefreshStatus) {
        self.outcome = Some(outcome);
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        *self.status.lock() = self.outcome.unwrap_or(self.previous);
    }
}

impl<K: KeyValueStore, C: Clock> WeatherBoard<K, C> {
    pub fn new(provider: WeatherProvider, cache: WeatherCache<K>, clock: C, locations: Vec<GeoLocation>) -> Self {
        Self {
            provider,
            cache,
            clock,
            locations,
            options: BoardOptions::default(),
            status: Mutex::new(RefreshStatus::Idle),
            last_report: Mutex::new(None),
        }
    }

    pub fn with_options(mut self, options: BoardOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &BoardOptions {
        &self.options
    }

    pub fn locations(&self) -> &[GeoLocation] {
        &self.locations
    }

    pub fn cache(&self) -> &WeatherCache<K> {
        &self.cache
    }

    pub fn status(&self) -> RefreshStatus {
        *self.status.lock()
    }

    /// Report of the most recent completed refresh.
    pub fn last_report(&self) -> Option<WeatherReport> {
        self.last_report.lock().clone()
    }

    /// Refresh every location, in list order.
    ///
    /// With `force`, each location's cache entry is evicted and refetched.
    /// A failing location becomes an unavailable entry; the batch always
    /// returns one entry per location.
    ///
    /// # Errors
    /// `NoLocations` if the board has no locations, `RefreshInProgress` if
    /// another refresh is still running.
    pub async fn refresh(&self, force: bool) -> Result<WeatherReport, WeatherError> {
        if self.locations.is_empty() {
            return Err(WeatherError::NoLocations);
        }
        let guard = RefreshGuard::acquire(&self.status)?;
        info!(
            "Refreshing weather for {} locations (force: {})",
            self.locations.len(),
            force
        );

        let entries: Vec<LocationWeather> = stream::iter(&self.locations)
            .map(|location| self.load_location(location, force))
            .buffered(self.options.max_concurrent.max(1))
            .collect()
            .await;

        let available = entries.iter().filter(|e| e.snapshot.is_some()).count();
        let status = RefreshStatus::after_batch(available > 0);
        if available == 0 {
            error!("Weather refresh failed for all {} locations", entries.len());
        } else {
            info!("Weather refresh done: {}/{} available", available, entries.len());
        }

        let report = WeatherReport {
            entries,
            completed_at: self.clock.now(),
            status,
        };
        *self.last_report.lock() = Some(report.clone());
        guard.finish(status);
        Ok(report)
    }

    async fn load_location(&self, location: &GeoLocation, force: bool) -> LocationWeather {
        match self.payload_for(location, force).await {
            Ok((payload, from_cache)) => {
                let snapshot = WeatherSnapshot::from_payload(&payload);
                LocationWeather {
                    alert: self.options.thresholds.is_alert(&snapshot),
                    location: location.clone(),
                    snapshot: Some(snapshot),
                    from_cache,
                }
            }
            Err(e) => {
                warn!("Weather fetch failed for {}: {}", location.name, e);
                LocationWeather::unavailable(location.clone())
            }
        }
    }

    /// Raw payload for a location and whether it came from the cache.
    async fn payload_for(&self, location: &GeoLocation, force: bool) -> Result<(Value, bool), WeatherError> {
        if force {
            if let Err(e) = self.cache.evict(location) {
                warn!("Failed to evict cached weather for {}: {}", location.name, e);
            }
        } else {
            match self.cache.read(location, self.clock.now()) {
                Ok(Some(payload)) => return Ok((payload, true)),
                Ok(None) => {}
                Err(e) => warn!("Weather cache read failed for {}: {}", location.name, e),
            }
        }

        let payload = self.provider.fetch_current(location).await?;
        if let Err(e) = self.cache.write(location, &payload, self.clock.now()) {
            warn!("Failed to cache weather for {}: {}", location.name, e);
        }
        Ok((payload, false))
    }
}
