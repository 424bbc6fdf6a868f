//! Application configuration loaded from TOML.
//!
//! Every section is optional; omitted values take their defaults.
//!
//! ```toml
//! [query]
//! stale_time_secs = 30
//! cache_time_secs = 300
//!
//! [query.retry]
//! max_retries = 3
//! base_delay = 1000
//! max_delay = 30000
//!
//! [catalog]
//! movies_base_url = "https://api.themoviedb.org/3"
//! tv_base_url = "https://api.themoviedb.org/3"
//! api_key = "..."
//! timeout_secs = 10
//!
//! [storage]
//! path = "/var/lib/watchdeck/storage.json"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::query::{QueryConfig, RetryPolicy};

const DEFAULT_CATALOG_URL: &str = "https://api.themoviedb.org/3";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub query: QuerySettings,
    pub catalog: CatalogSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    pub stale_time_secs: u64,
    pub cache_time_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for QuerySettings {
    fn default() -> Self {
        let defaults = QueryConfig::default();
        Self {
            stale_time_secs: defaults.stale_time.as_secs(),
            cache_time_secs: defaults.cache_time.as_secs(),
            retry: defaults.retry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub movies_base_url: String,
    pub tv_base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            movies_base_url: DEFAULT_CATALOG_URL.to_string(),
            tv_base_url: DEFAULT_CATALOG_URL.to_string(),
            api_key: None,
            timeout_secs: 10,
        }
    }
}

impl CatalogSettings {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Defaults to the platform data directory.
    pub path: Option<PathBuf>,
}

impl AppConfig {
    /// Reads and validates the config file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "loaded config file");
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query.retry.base_delay > self.query.retry.max_delay {
            return Err(ConfigError::InvalidValue {
                field: "query.retry.base_delay",
                reason: "must not exceed max_delay".to_string(),
            });
        }
        if self.catalog.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "catalog.timeout_secs",
                reason: "must be positive".to_string(),
            });
        }
        for (field, url) in [
            ("catalog.movies_base_url", &self.catalog.movies_base_url),
            ("catalog.tv_base_url", &self.catalog.tv_base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("expected an http(s) URL, got '{url}'"),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn query_config(&self) -> QueryConfig {
        QueryConfig::new(
            Duration::from_secs(self.query.stale_time_secs),
            Duration::from_secs(self.query.cache_time_secs),
        )
        .with_retry(self.query.retry)
    }
}
