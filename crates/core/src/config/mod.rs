//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (FOLIO_*)
//! 2. TOML config file (if FOLIO_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::cache::CachePolicy;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (FOLIO_*)
/// 2. TOML config file (if FOLIO_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Candidate content API base URLs, tried in this order.
    ///
    /// Set via FOLIO_SOURCES (comma-separated).
    #[serde(default, deserialize_with = "list_or_csv")]
    pub sources: Vec<String>,

    /// Internal origin mirror consulted after every source failed.
    ///
    /// Set via FOLIO_MIRROR_URL.
    #[serde(default)]
    pub mirror_url: Option<String>,

    /// Path to SQLite cache database.
    ///
    /// Set via FOLIO_DB_PATH.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum response body size in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Timeout for content requests, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Timeout for availability probes, in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Lifetime of cached source pages, in seconds.
    #[serde(default = "default_page_ttl_secs")]
    pub page_ttl_secs: u64,

    /// Lifetime of cached display-ready pages, in seconds.
    #[serde(default = "default_page_ttl_secs")]
    pub posts_ttl_secs: u64,

    /// Lifetime of an availability probe result, in seconds.
    #[serde(default = "default_availability_ttl_secs")]
    pub availability_ttl_secs: u64,

    /// Maximum records kept in the local snapshot (0 = unbounded).
    #[serde(default = "default_snapshot_max_records")]
    pub snapshot_max_records: usize,

    /// Page size when a request does not give one.
    #[serde(default = "default_per_page")]
    pub default_per_page: u32,

    /// Page size used by the deferred preload refresh.
    #[serde(default = "default_preload_per_page")]
    pub preload_per_page: u32,

    /// Delay before the deferred preload refresh runs, in milliseconds.
    #[serde(default = "default_preload_delay_ms")]
    pub preload_delay_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./folio-cache.sqlite")
}

fn default_user_agent() -> String {
    "folio-sync/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_probe_timeout_ms() -> u64 {
    10_000
}

fn default_page_ttl_secs() -> u64 {
    30 * 60
}

fn default_availability_ttl_secs() -> u64 {
    5 * 60
}

fn default_snapshot_max_records() -> usize {
    500
}

fn default_per_page() -> u32 {
    10
}

fn default_preload_per_page() -> u32 {
    5
}

fn default_preload_delay_ms() -> u64 {
    2_000
}

/// Accept either a list or a comma-separated string.
fn list_or_csv<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrCsv {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match ListOrCsv::deserialize(deserializer)? {
        ListOrCsv::List(items) => items,
        ListOrCsv::Csv(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
    })
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            mirror_url: None,
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            page_ttl_secs: default_page_ttl_secs(),
            posts_ttl_secs: default_page_ttl_secs(),
            availability_ttl_secs: default_availability_ttl_secs(),
            snapshot_max_records: default_snapshot_max_records(),
            default_per_page: default_per_page(),
            preload_per_page: default_preload_per_page(),
            preload_delay_ms: default_preload_delay_ms(),
        }
    }
}

fn ttl(field: &str, secs: u64) -> Result<chrono::TimeDelta, ConfigError> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::TimeDelta::try_seconds)
        .ok_or_else(|| ConfigError::Invalid { field: field.into(), reason: format!("{secs}s is out of range") })
}

impl AppConfig {
    /// Content request timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn preload_delay(&self) -> Duration {
        Duration::from_millis(self.preload_delay_ms)
    }

    /// Per-family TTLs for the cache store.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a TTL does not fit a `chrono::TimeDelta`.
    pub fn cache_policy(&self) -> Result<CachePolicy, ConfigError> {
        Ok(CachePolicy {
            api_pages: ttl("page_ttl_secs", self.page_ttl_secs)?,
            posts: ttl("posts_ttl_secs", self.posts_ttl_secs)?,
            availability: ttl("availability_ttl_secs", self.availability_ttl_secs)?,
        })
    }

    /// Snapshot size cap, `None` when unbounded.
    pub fn snapshot_cap(&self) -> Option<usize> {
        (self.snapshot_max_records > 0).then_some(self.snapshot_max_records)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `FOLIO_`
    /// 2. TOML file from `FOLIO_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("FOLIO_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("FOLIO_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
