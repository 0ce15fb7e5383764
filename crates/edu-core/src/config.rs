use anyhow::{Context, Result};
use edu_weather::provider::{DEFAULT_TIMEOUT_SECS, OPENWEATHER_BASE_URL};
use edu_weather::AlertThresholds;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable consulted when no API key is configured
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application data directory (databases live here)
    pub config_dir: PathBuf,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub weather: WeatherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// SQLite document store file, relative to `config_dir`
    #[serde(default = "default_catalog_file")]
    pub database_file: String,
}

fn default_catalog_file() -> String {
    "catalog.db".to_string()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database_file: default_catalog_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// OpenWeather API key. Falls back to `OPENWEATHER_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Key read from the environment at load time; never written back.
    #[serde(skip)]
    pub env_api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Snapshot cache file, relative to `config_dir`
    #[serde(default = "default_cache_file")]
    pub cache_file: String,

    #[serde(default = "default_ttl_minutes")]
    pub cache_ttl_minutes: u32,

    /// Upstream requests in flight per refresh (1 = sequential)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub alerts: AlertThresholds,
}

fn default_base_url() -> String {
    OPENWEATHER_BASE_URL.to_string()
}

fn default_cache_file() -> String {
    "weather_cache.db".to_string()
}

fn default_ttl_minutes() -> u32 {
    30
}

fn default_max_concurrent() -> usize {
    1
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_retries() -> u32 {
    2
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            env_api_key: None,
            base_url: default_base_url(),
            cache_file: default_cache_file(),
            cache_ttl_minutes: default_ttl_minutes(),
            max_concurrent: default_max_concurrent(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            alerts: AlertThresholds::default(),
        }
    }
}

impl WeatherConfig {
    /// The API key, if one is set and non-blank. The config file wins over
    /// the environment.
    pub fn api_key(&self) -> Option<&str> {
        [self.api_key.as_deref(), self.env_api_key.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|k| !k.is_empty())
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("edu-portal");

        Self {
            config_dir,
            catalog: CatalogConfig::default(),
            weather: WeatherConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific file, creating it with defaults if missing
    ///
    /// `OPENWEATHER_API_KEY` is picked up on every load but never saved.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str::<Config>(&contents)
                .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?
        } else {
            let config = Self::default();
            config.save_to(path)?;
            config
        };

        config.weather.env_api_key = std::env::var(API_KEY_ENV).ok();
        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        Self::load_validated_from(&Self::config_path()?)
    }

    /// Load and validate a specific config file
    pub fn load_validated_from(path: &Path) -> Result<(Self, ValidationResult)> {
        let config = Self::load_from(path)?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.catalog.database_file.trim().is_empty() {
            result.add_error("catalog.database_file", "Database file name cannot be empty");
        }

        let weather = &self.weather;
        validate_url(&weather.base_url, "weather.base_url", &mut result);

        if weather.api_key().is_none() {
            result.add_warning(
                "weather.api_key",
                format!("No API key configured (set {}); weather board disabled", API_KEY_ENV),
            );
        }

        if weather.cache_file.trim().is_empty() {
            result.add_error("weather.cache_file", "Cache file name cannot be empty");
        }

        if weather.cache_ttl_minutes == 0 {
            result.add_warning(
                "weather.cache_ttl_minutes",
                "Snapshot caching disabled (0 minutes)",
            );
        } else if weather.cache_ttl_minutes > 1440 {
            result.add_warning(
                "weather.cache_ttl_minutes",
                "Cache TTL is more than 24 hours",
            );
        }

        if weather.max_concurrent == 0 {
            result.add_error("weather.max_concurrent", "Must be at least 1");
        } else if weather.max_concurrent > 16 {
            result.add_warning(
                "weather.max_concurrent",
                "More than 16 parallel requests may hit upstream rate limits",
            );
        }

        if weather.timeout_secs == 0 {
            result.add_error("weather.timeout_secs", "Timeout must be greater than 0");
        }

        if weather.alerts.rain_mm < 0.0 {
            result.add_error("weather.alerts.rain_mm", "Rainfall threshold cannot be negative");
        }
        if weather.alerts.pressure_hpa <= 0.0 {
            result.add_error("weather.alerts.pressure_hpa", "Pressure threshold must be positive");
        }

        result
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }

    pub fn catalog_db_path(&self) -> PathBuf {
        self.config_dir.join(&self.catalog.database_file)
    }

    pub fn weather_cache_path(&self) -> PathBuf {
        self.config_dir.join(&self.weather.cache_file)
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("edu-portal");

        Ok(config_dir.join("config.toml"))
    }
}

fn validate_url(url_str: &str, field_name: &str, result: &mut ValidationResult) {
    match Url::parse(url_str) {
        Ok(url) => {
            if url.scheme() != "http" && url.scheme() != "https" {
                result.add_error(
                    field_name,
                    format!("URL must use http or https scheme, got: {}", url.scheme()),
                );
            }
            if url.host().is_none() {
                result.add_error(field_name, "URL must have a host");
            }
        }
        Err(e) => result.add_error(field_name, format!("Invalid URL: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_invalid_base_url_scheme() {
        let mut config = Config::default();
        config.weather.base_url = "ftp://weather.example".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_zero_concurrency_is_error() {
        let mut config = Config::default();
        config.weather.max_concurrent = 0;
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "weather.max_concurrent"));
    }

    #[test]
    fn test_missing_api_key_is_warning() {
        let mut config = Config::default();
        config.weather.api_key = Some("   ".to_string());
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "weather.api_key"));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.config_dir = dir.path().to_path_buf();
        config.weather.api_key = Some("abc123".to_string());
        config.weather.max_concurrent = 4;
        config.weather.alerts.rain_mm = 15.0;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.weather.api_key(), Some("abc123"));
        assert_eq!(loaded.weather.max_concurrent, 4);
        assert_eq!(loaded.weather.alerts.rain_mm, 15.0);
        assert_eq!(loaded.catalog_db_path(), dir.path().join("catalog.db"));
    }

    #[test]
    fn test_env_api_key_is_used_but_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::env::set_var(API_KEY_ENV, "secret-from-env");
        let first = Config::load_from(&path).unwrap();
        assert_eq!(first.weather.api_key(), Some("secret-from-env"));
        first.save_to(&path).unwrap();
        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert!(!on_disk.contains("secret-from-env"));

        std::env::set_var(API_KEY_ENV, "rotated-key");
        let second = Config::load_from(&path).unwrap();
        std::env::remove_var(API_KEY_ENV);
        assert_eq!(second.weather.api_key(), Some("rotated-key"));
    }

    #[test]
    fn test_file_api_key_wins_over_env() {
        let mut config = Config::default();
        config.weather.api_key = Some("from-file".to_string());
        config.weather.env_api_key = Some("from-env".to_string());
        assert_eq!(config.weather.api_key(), Some("from-file"));

        config.weather.api_key = Some("  ".to_string());
        assert_eq!(config.weather.api_key(), Some("from-env"));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "config_dir = [not toml").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_invalid_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "config_dir = \"/tmp/edu\"\n[weather]\nmax_concurrent = 0\n").unwrap();

        let err = Config::load_validated_from(&path).unwrap_err();
        match err.downcast_ref::<ConfigError>() {
            Some(ConfigError::Invalid(summary)) => assert!(summary.contains("weather.max_concurrent")),
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "config_dir = \"/tmp/edu\"\n[weather]\ncache_ttl_minutes = 10\n").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.weather.cache_ttl_minutes, 10);
        assert_eq!(loaded.weather.max_concurrent, 1);
        assert_eq!(loaded.weather.alerts.pressure_hpa, 1000.0);
        assert_eq!(loaded.catalog.database_file, "catalog.db");
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
