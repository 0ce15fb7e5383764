use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::RefreshStatus;

/// A fixed point on the weather board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    /// State or territory the point represents
    pub state: String,
    /// Display name (usually the capital city)
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    pub fn new(state: impl Into<String>, name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            state: state.into(),
            name: name.into(),
            latitude,
            longitude,
        }
    }
}

/// Current conditions at one location, read from an OpenWeather payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Celsius
    pub temperature: Option<f64>,
    /// Hectopascals
    pub pressure: Option<f64>,
    /// Percent
    pub humidity: Option<f64>,
    pub condition: String,
    /// Millimetres of rain in the last hour
    pub rain_1h: f64,
}

impl WeatherSnapshot {
    /// Extract a snapshot from a raw payload. Missing readings stay `None`;
    /// rainfall falls back from `rain.1h` to `rain.3h` to 0.
    pub fn from_payload(payload: &Value) -> Self {
        let main = &payload["main"];
        let rain = &payload["rain"];

        Self {
            temperature: main["temp"].as_f64(),
            pressure: main["pressure"].as_f64(),
            humidity: main["humidity"].as_f64(),
            condition: payload["weather"][0]["description"]
                .as_str()
                .unwrap_or("N/A")
                .to_string(),
            rain_1h: rain["1h"]
                .as_f64()
                .or_else(|| rain["3h"].as_f64())
                .unwrap_or(0.0),
        }
    }
}

/// Limits above/below which a location is flagged
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Alert when hourly rainfall exceeds this (mm)
    pub rain_mm: f64,
    /// Alert when pressure drops below this (hPa)
    pub pressure_hpa: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            rain_mm: 20.0,
            pressure_hpa: 1000.0,
        }
    }
}

impl AlertThresholds {
    /// Missing pressure never triggers the pressure rule.
    pub fn is_alert(&self, snapshot: &WeatherSnapshot) -> bool {
        snapshot.rain_1h > self.rain_mm
            || snapshot
                .pressure
                .is_some_and(|pressure| pressure < self.pressure_hpa)
    }
}

/// One row of a refresh report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationWeather {
    pub location: GeoLocation,
    /// `None` when the location could not be fetched
    pub snapshot: Option<WeatherSnapshot>,
    pub alert: bool,
    /// Served from the snapshot cache rather than the upstream API
    pub from_cache: bool,
}

impl LocationWeather {
    pub fn unavailable(location: GeoLocation) -> Self {
        Self {
            location,
            snapshot: None,
            alert: false,
            from_cache: false,
        }
    }
}

/// Result of one refresh batch, in location-list order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub entries: Vec<LocationWeather>,
    pub completed_at: DateTime<Utc>,
    pub status: RefreshStatus,
}

impl WeatherReport {
    pub fn available_count(&self) -> usize {
        self.entries.iter().filter(|e| e.snapshot.is_some()).count()
    }

    pub fn alert_count(&self) -> usize {
        self.entries.iter().filter(|e| e.alert).count()
    }
}

/// Weather errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Upstream fetch failed: HTTP {0}")]
    UpstreamFetchFailed(u16),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Cache error: {0}")]
    Cache(String),
    #[error("Corrupt cache entry {key}: {reason}")]
    CacheCorrupt { key: String, reason: String },
    #[error("A weather refresh is already running")]
    RefreshInProgress,
    #[error("No locations configured")]
    NoLocations,
}

impl WeatherError {
    /// Whether the caller may retry the operation unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::RefreshInProgress => true,
            Self::UpstreamFetchFailed(status) => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Network(_) => "Unable to reach the weather service. Check your connection.",
            Self::UpstreamFetchFailed(401) => "The weather API key was rejected.",
            Self::UpstreamFetchFailed(_) => "The weather service returned an error.",
            Self::Parse(_) => "Weather data could not be read.",
            Self::Cache(_) | Self::CacheCorrupt { .. } => "The local weather cache is unavailable.",
            Self::RefreshInProgress => "Weather is already refreshing.",
            Self::NoLocations => "No weather locations are configured.",
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use serde_json::json;

    fn snapshot(rain_1h: f64, pressure: Option<f64>) -> WeatherSnapshot {
        WeatherSnapshot {
            temperature: Some(28.0),
            pressure,
            humidity: Some(70.0),
            condition: "haze".into(),
            rain_1h,
        }
    }

    #[test]
    fn test_alert_classification() {
        let t = AlertThresholds::default();
        assert!(t.is_alert(&snapshot(21.0, Some(1010.0))));
        assert!(t.is_alert(&snapshot(5.0, Some(995.0))));
        assert!(!t.is_alert(&snapshot(5.0, Some(1010.0))));
        assert!(!t.is_alert(&snapshot(0.0, None)));
        // Thresholds are strict
        assert!(!t.is_alert(&snapshot(20.0, Some(1000.0))));
    }

    #[test]
    fn test_snapshot_from_full_payload() {
        let payload = json!({
            "main": {"temp": 31.2, "pressure": 1004, "humidity": 66},
            "weather": [{"description": "light rain"}],
            "rain": {"1h": 2.5, "3h": 6.0}
        });
        let s = WeatherSnapshot::from_payload(&payload);
        assert_eq!(s.temperature, Some(31.2));
        assert_eq!(s.pressure, Some(1004.0));
        assert_eq!(s.humidity, Some(66.0));
        assert_eq!(s.condition, "light rain");
        assert_eq!(s.rain_1h, 2.5);
    }

    #[test]
    fn test_snapshot_fallbacks() {
        let s = WeatherSnapshot::from_payload(&json!({"rain": {"3h": 4.0}}));
        assert_eq!(s.temperature, None);
        assert_eq!(s.pressure, None);
        assert_eq!(s.condition, "N/A");
        assert_eq!(s.rain_1h, 4.0);

        let s = WeatherSnapshot::from_payload(&json!({"main": {"pressure": 1012}}));
        assert_eq!(s.rain_1h, 0.0);
    }

    #[test]
    fn test_error_retryability() {
        assert!(WeatherError::UpstreamFetchFailed(503).is_retryable());
        assert!(!WeatherError::UpstreamFetchFailed(404).is_retryable());
        assert!(!WeatherError::NoLocations.is_retryable());
        assert!(WeatherError::UpstreamFetchFailed(401)
            .user_message()
            .contains("API key"));
    }
}
