use std::sync::Arc;

use chrono::Duration;
use edu_catalog::{CatalogClient, SqliteDocumentStore};
use edu_weather::{
    indian_capitals, BoardOptions, RetryConfig, SqliteKeyValueStore, WeatherBoard, WeatherCache,
    WeatherProvider, WeatherReport,
};

use crate::error::{AppError, ConfigError};
use crate::Config;

/// Weather board as wired by the application: SQLite cache, wall clock.
pub type AppWeatherBoard = WeatherBoard<SqliteKeyValueStore>;

/// Main application state: config plus the two data subsystems
pub struct App {
    config: Arc<Config>,
    catalog: CatalogClient,
    weather: Option<Arc<AppWeatherBoard>>,
}

impl App {
    /// Create a new application instance from the user's config file
    pub fn new() -> Result<Self, AppError> {
        let (config, _warnings) = Config::load_validated().map_err(AppError::from_load)?;
        Self::from_config(config)
    }

    /// Build the application from an already loaded config
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        std::fs::create_dir_all(&config.config_dir)?;

        let store = SqliteDocumentStore::open(config.catalog_db_path())?;
        let catalog = CatalogClient::new(store);
        tracing::info!("Catalog store at {}", config.catalog_db_path().display());

        let weather = match config.weather.api_key() {
            Some(api_key) => Some(Arc::new(build_weather_board(&config, api_key)?)),
            None => {
                tracing::warn!("No weather API key configured; weather board disabled");
                None
            }
        };

        Ok(Self {
            config: Arc::new(config),
            catalog,
            weather,
        })
    }

    /// Get reference to application config
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &CatalogClient {
        &self.catalog
    }

    /// The weather board, if an API key is configured
    pub fn weather(&self) -> Option<Arc<AppWeatherBoard>> {
        self.weather.clone()
    }

    /// Refresh the weather board.
    ///
    /// # Errors
    /// `ConfigError::MissingSetting` when no API key is configured, otherwise
    /// whatever the board reports (`RefreshInProgress`, `NoLocations`).
    pub async fn refresh_weather(&self, force: bool) -> Result<WeatherReport, AppError> {
        let board = self
            .weather
            .as_ref()
            .ok_or_else(|| ConfigError::MissingSetting("weather.api_key".to_string()))?;
        Ok(board.refresh(force).await?)
    }
}

fn build_weather_board(config: &Config, api_key: &str) -> Result<AppWeatherBoard, AppError> {
    let weather = &config.weather;

    let provider = WeatherProvider::with_timeout(
        api_key,
        std::time::Duration::from_secs(weather.timeout_secs),
    )?
    .with_base_url(weather.base_url.clone())
    .with_retry(RetryConfig {
        max_retries: weather.max_retries,
        ..RetryConfig::default()
    });

    let store = SqliteKeyValueStore::open(config.weather_cache_path())?;
    let cache = WeatherCache::new(store).with_ttl(Duration::minutes(i64::from(weather.cache_ttl_minutes)));

    Ok(WeatherBoard::new(provider, cache, Default::default(), indian_capitals()).with_options(
        BoardOptions {
            max_concurrent: weather.max_concurrent,
            thresholds: weather.alerts,
        },
    ))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use edu_catalog::{Difficulty, NewModule, Subject};

    fn test_config(dir: &std::path::Path, api_key: Option<&str>) -> Config {
        let mut config = Config::default();
        config.config_dir = dir.join("data");
        config.weather.api_key = api_key.map(str::to_string);
        config
    }

    #[tokio::test]
    async fn test_app_without_api_key_disables_weather() {
        let dir = tempfile::tempdir().unwrap();
        let app = App::from_config(test_config(dir.path(), None)).unwrap();

        assert!(app.weather().is_none());
        let err = app.refresh_weather(false).await.unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::MissingSetting(_))));
    }

    #[tokio::test]
    async fn test_app_wires_catalog_store() {
        let dir = tempfile::tempdir().unwrap();
        let app = App::from_config(test_config(dir.path(), Some("key"))).unwrap();

        let id = app
            .catalog()
            .create_module(NewModule {
                title: "Fractions".into(),
                description: String::new(),
                subject: Subject::Mathematics,
                grade: "Grade 4".into(),
                difficulty: Difficulty::Beginner,
                duration: 45,
                thumbnail: String::new(),
                lessons: vec![],
                is_published: true,
                author_id: "t1".into(),
                tags: vec![],
                rating: 0.0,
                enrolled_students: 0,
            })
            .await
            .unwrap();

        let published = app.catalog().list_published_modules().await.unwrap();
        assert_eq!(published[0].id, id);
        assert!(app.config().catalog_db_path().exists());

        let board = app.weather().unwrap();
        assert_eq!(board.locations().len(), 37);
        assert!(app.config().weather_cache_path().exists());
    }
}
