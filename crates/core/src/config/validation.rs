//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Longest TTL accepted for any cache family: one year.
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

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

fn check_base_url(field: &str, raw: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(raw.trim()).map_err(|e| invalid(field, format!("{raw}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(invalid(field, format!("{raw}: unsupported scheme {scheme}"))),
    }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - a source or the mirror URL is not an http(s) URL
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - a timeout is below 100ms or above 5 minutes
    /// - a TTL is 0 or longer than a year
    /// - a page size is outside 1..=100
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        for source in &self.sources {
            check_base_url("sources", source)?;
        }
        if let Some(mirror) = &self.mirror_url {
            check_base_url("mirror_url", mirror)?;
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        for (field, value) in [("timeout_ms", self.timeout_ms), ("probe_timeout_ms", self.probe_timeout_ms)] {
            if value < 100 {
                return Err(invalid(field, "must be at least 100ms"));
            }
            if value > 300_000 {
                return Err(invalid(field, "must not exceed 5 minutes (300000ms)"));
            }
        }

        for (field, value) in [
            ("page_ttl_secs", self.page_ttl_secs),
            ("posts_ttl_secs", self.posts_ttl_secs),
            ("availability_ttl_secs", self.availability_ttl_secs),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be greater than 0"));
            }
            if value > MAX_TTL_SECS {
                return Err(invalid(field, format!("must not exceed one year ({MAX_TTL_SECS}s)")));
            }
        }

        for (field, value) in [("default_per_page", self.default_per_page), ("preload_per_page", self.preload_per_page)] {
            if !(1..=100).contains(&value) {
                return Err(invalid(field, "must be between 1 and 100"));
            }
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.sources.is_empty() && self.mirror_url.is_none() {
            tracing::warn!("no content sources or mirror configured; only cached data will be served");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_sources() {
        let config = AppConfig {
            sources: vec!["https://a.example/wp-json/wp/v2".into(), "http://b.example/api".into()],
            mirror_url: Some("http://localhost:3000".into()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_source_not_a_url() {
        let config = AppConfig { sources: vec!["not a url".into()], ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "sources"));
    }

    #[test]
    fn test_validate_mirror_scheme() {
        let config = AppConfig { mirror_url: Some("file:///srv/mirror".into()), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "mirror_url"));
    }

    #[test]
    fn test_validate_max_bytes_zero() {
        let config = AppConfig { max_bytes: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_bytes"));
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_probe_timeout_exceeds_limit() {
        let config = AppConfig { probe_timeout_ms: 301_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "probe_timeout_ms"));
    }

    #[test]
    fn test_validate_zero_ttl() {
        let config = AppConfig { availability_ttl_secs: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "availability_ttl_secs"));
    }

    #[test]
    fn test_validate_ttl_upper_bound() {
        let config = AppConfig { page_ttl_secs: 100_000_000_000_000_000, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "page_ttl_secs"));

        let config = AppConfig { posts_ttl_secs: MAX_TTL_SECS + 1, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "posts_ttl_secs"));

        let config = AppConfig { availability_ttl_secs: MAX_TTL_SECS, ..Default::default() };
        assert!(config.validate().is_ok());
        assert!(config.cache_policy().is_ok());
    }

    #[test]
    fn test_validate_per_page_range() {
        let config = AppConfig { default_per_page: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "default_per_page"));

        let config = AppConfig { preload_per_page: 101, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "preload_per_page"));
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "user_agent"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig { max_bytes: 1, timeout_ms: 100, probe_timeout_ms: 300_000, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
