//! OpenWeather current-conditions client.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::instrument;

use crate::retry::{with_retry, RetryConfig};
use crate::types::{GeoLocation, WeatherError};

pub const OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Arc<Client>,
    base_url: String,
    api_key: String,
    retry: RetryConfig,
}

impl WeatherProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, WeatherError> {
        Self::with_timeout(api_key, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Result<Self, WeatherError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client: Arc::new(client),
            base_url: OPENWEATHER_BASE_URL.to_string(),
            api_key: api_key.into(),
            retry: RetryConfig::default(),
        })
    }

    /// Point the provider at another server (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Fetch the raw current-conditions payload for a location, metric units.
    ///
    /// # Errors
    /// `UpstreamFetchFailed` for any non-2xx status, `Network` for transport
    /// failures, `Parse` if the body is not a JSON object.
    #[instrument(skip(self), fields(name = %location.name))]
    pub async fn fetch_current(&self, location: &GeoLocation) -> Result<Value, WeatherError> {
        let url = format!("{}/data/2.5/weather", self.base_url);
        let query = [
            ("lat", location.latitude.to_string()),
            ("lon", location.longitude.to_string()),
            ("appid", self.api_key.clone()),
            ("units", "metric".to_string()),
        ];

        let response = with_retry(&self.retry, || self.client.get(&url).query(&query).send()).await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Weather API returned {} for {}", status, location.name);
            return Err(WeatherError::UpstreamFetchFailed(status.as_u16()));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| WeatherError::Parse(e.to_string()))?;
        if !payload.is_object() {
            return Err(WeatherError::Parse("expected a JSON object".to_string()));
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn goa() -> GeoLocation {
        GeoLocation::new("Goa", "Panaji", 15.4909, 73.8278)
    }

    #[tokio::test]
    async fn test_fetch_sends_coordinates_and_key() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("lat", "15.4909"))
            .and(query_param("lon", "73.8278"))
            .and(query_param("appid", "test-key"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "main": {"temp": 29.5, "pressure": 1008, "humidity": 80}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = WeatherProvider::new("test-key")
            .unwrap()
            .with_base_url(mock_server.uri());
        let payload = provider.fetch_current(&goa()).await.unwrap();
        assert_eq!(payload["main"]["temp"], 29.5);
    }

    #[tokio::test]
    async fn test_non_success_is_upstream_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = WeatherProvider::new("bad-key")
            .unwrap()
            .with_base_url(mock_server.uri());
        let err = provider.fetch_current(&goa()).await.unwrap_err();
        assert!(matches!(err, WeatherError::UpstreamFetchFailed(401)));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&mock_server)
            .await;

        let provider = WeatherProvider::new("k")
            .unwrap()
            .with_base_url(mock_server.uri())
            .with_retry(RetryConfig::new(2, 1, 5));
        let err = provider.fetch_current(&goa()).await.unwrap_err();
        assert!(matches!(err, WeatherError::UpstreamFetchFailed(503)));
    }

    #[tokio::test]
    async fn test_non_object_body_is_parse_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[1, 2]"))
            .mount(&mock_server)
            .await;

        let provider = WeatherProvider::new("k")
            .unwrap()
            .with_base_url(mock_server.uri());
        assert!(matches!(
            provider.fetch_current(&goa()).await,
            Err(WeatherError::Parse(_))
        ));
    }
}
