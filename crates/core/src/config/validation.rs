//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an absolute http(s) URL
    /// - `cache_prefix` or `cache_version` is empty or contains whitespace
    /// - `stale_after_ms` is 0
    /// - a static extension does not start with `.`
    /// - a precache URL is not origin-relative
    /// - `max_bytes` is 0 or exceeds 100MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin = url::Url::parse(&self.origin).map_err(|e| invalid("origin", e.to_string()))?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(invalid("origin", format!("unsupported scheme: {}", origin.scheme())));
        }

        for (field, value) in [("cache_prefix", &self.cache_prefix), ("cache_version", &self.cache_version)] {
            if value.is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
            if value.chars().any(char::is_whitespace) {
                return Err(invalid(field, "must not contain whitespace"));
            }
        }

        if self.stale_after_ms == 0 {
            return Err(invalid("stale_after_ms", "must be greater than 0"));
        }

        if let Some(ext) = self.static_extensions.iter().find(|ext| !ext.starts_with('.') || ext.len() < 2) {
            return Err(invalid("static_extensions", format!("'{ext}' must look like '.js'")));
        }

        if let Some(path) = self.precache_urls.iter().find(|path| !path.starts_with('/')) {
            return Err(invalid("precache_urls", format!("'{path}' must start with '/'")));
        }

        if self.passthrough_patterns.iter().any(String::is_empty) {
            return Err(invalid("passthrough_patterns", "empty pattern would match every URL"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 100 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 100MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.precache_urls.is_empty() {
            tracing::warn!("precache_urls is empty; install will succeed without an offline shell");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(config: &AppConfig) -> Option<String> {
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => Some(field),
            _ => None,
        }
    }

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_origin() {
        let config = AppConfig { origin: "not a url".into(), ..Default::default() };
        assert_eq!(field_of(&config).as_deref(), Some("origin"));

        let config = AppConfig { origin: "ftp://files.example".into(), ..Default::default() };
        assert_eq!(field_of(&config).as_deref(), Some("origin"));
    }

    #[test]
    fn test_validate_version_tag() {
        let config = AppConfig { cache_version: String::new(), ..Default::default() };
        assert_eq!(field_of(&config).as_deref(), Some("cache_version"));

        let config = AppConfig { cache_prefix: "my cache".into(), ..Default::default() };
        assert_eq!(field_of(&config).as_deref(), Some("cache_prefix"));
    }

    #[test]
    fn test_validate_stale_after_zero() {
        let config = AppConfig { stale_after_ms: 0, ..Default::default() };
        assert_eq!(field_of(&config).as_deref(), Some("stale_after_ms"));
    }

    #[test]
    fn test_validate_static_extension_shape() {
        let config = AppConfig { static_extensions: vec!["js".into()], ..Default::default() };
        assert_eq!(field_of(&config).as_deref(), Some("static_extensions"));
    }

    #[test]
    fn test_validate_precache_relative() {
        let config = AppConfig { precache_urls: vec!["index.html".into()], ..Default::default() };
        assert_eq!(field_of(&config).as_deref(), Some("precache_urls"));
    }

    #[test]
    fn test_validate_empty_pattern() {
        let config = AppConfig { passthrough_patterns: vec![String::new()], ..Default::default() };
        assert_eq!(field_of(&config).as_deref(), Some("passthrough_patterns"));
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        assert_eq!(field_of(&config).as_deref(), Some("timeout_ms"));

        let config = AppConfig { timeout_ms: 301_000, ..Default::default() };
        assert_eq!(field_of(&config).as_deref(), Some("timeout_ms"));

        let config = AppConfig { timeout_ms: 100, max_bytes: 1, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        assert_eq!(field_of(&config).as_deref(), Some("user_agent"));
    }
}
