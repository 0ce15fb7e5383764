//! Centralized error types for the Edu Portal application.
//!
//! Subsystem errors keep their own taxonomy; `AppError` wraps them so the
//! presentation layer can pick a user-facing message and decide on fallbacks.

use edu_catalog::CatalogError;
use edu_weather::WeatherError;
use thiserror::Error;

/// Top-level application error type.
///
/// Use `user_message()` to get a UI-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Weather service error: {0}")]
    Weather(#[from] WeatherError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display in the UI.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Catalog(e) => e.user_message(),
            AppError::Weather(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }

    /// Classify an error from `Config` loading.
    pub fn from_load(err: anyhow::Error) -> Self {
        match err.downcast::<ConfigError>() {
            Ok(config) => AppError::Config(config),
            Err(other) => AppError::Other(other),
        }
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Catalog(e) => e.is_retryable(),
            AppError::Weather(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Configuration errors.
///
/// `Config` loading returns these inside `anyhow::Error`; `AppError::from_load`
/// recovers them.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
            ConfigError::MissingSetting(_) => "A required setting is missing. Check your settings.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_conversion() {
        let app_err: AppError = CatalogError::not_found("Module", "m1").into();
        assert!(matches!(app_err, AppError::Catalog(CatalogError::NotFound { .. })));
        assert!(!app_err.is_retryable());
    }

    #[test]
    fn test_user_message_propagation() {
        let app_err = AppError::Catalog(CatalogError::StoreUnavailable("offline".into()));
        assert_eq!(
            app_err.user_message(),
            "Course data is unavailable right now. Please try again."
        );
        assert!(app_err.is_retryable());

        let app_err = AppError::from(ConfigError::MissingSetting("weather.api_key".into()));
        assert!(app_err.user_message().contains("setting is missing"));
    }

    #[test]
    fn test_config_load_errors_are_recovered() {
        let err = anyhow::Error::from(ConfigError::ParseError("bad toml".into()));
        let app_err = AppError::from_load(err);
        assert!(matches!(app_err, AppError::Config(ConfigError::ParseError(_))));
        assert!(app_err.user_message().contains("malformed"));

        let app_err = AppError::from_load(anyhow::anyhow!("disk full"));
        assert!(matches!(app_err, AppError::Other(_)));
    }

    #[test]
    fn test_weather_errors_keep_their_classification() {
        let app_err = AppError::from(WeatherError::RefreshInProgress);
        assert!(app_err.is_retryable());
        assert_eq!(app_err.user_message(), "Weather is already refreshing.");
    }
}
