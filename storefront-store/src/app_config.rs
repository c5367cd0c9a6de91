use chrono::Duration;
use config::ConfigError;
use serde::Deserialize;
use std::env;
use std::sync::Arc;

use crate::bundle_cache::{DEFAULT_MAX_AGE_DAYS, DEFAULT_STORAGE_KEY};
use crate::cache_store::{CacheStore, FileStore, MemoryStore, StoreError};
use crate::redis_repo::RedisStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    File,
    Redis,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
    /// Directory for the file backend
    pub directory: Option<String>,
    /// Connection string for the redis backend
    pub redis_url: Option<String>,
}

fn default_storage_key() -> String { DEFAULT_STORAGE_KEY.to_string() }

fn default_max_age_days() -> i64 { DEFAULT_MAX_AGE_DAYS }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            storage_key: default_storage_key(),
            max_age_days: default_max_age_days(),
            directory: None,
            redis_url: None,
        }
    }
}

impl CacheConfig {
    /// Entry lifetime. At least one day, and small enough to count in milliseconds.
    pub fn max_age(&self) -> Result<Duration, ConfigError> {
        if self.max_age_days < 1 {
            return Err(ConfigError::Message(format!(
                "cache.max_age_days must be at least 1, got {}",
                self.max_age_days
            )));
        }
        Duration::try_days(self.max_age_days).ok_or_else(|| {
            ConfigError::Message(format!(
                "cache.max_age_days is too large: {}",
                self.max_age_days
            ))
        })
    }

    /// Build the configured persistence medium
    pub fn build_store(&self) -> Result<Arc<dyn CacheStore>, StoreError> {
        match self.backend {
            CacheBackend::Memory => Ok(Arc::new(MemoryStore::new())),
            CacheBackend::File => {
                let directory = self.directory.as_deref().unwrap_or("data/bundles");
                Ok(Arc::new(FileStore::new(directory)?))
            }
            CacheBackend::Redis => {
                let url = self.redis_url.as_deref().ok_or_else(|| {
                    StoreError::Unavailable("cache.redis_url is required for the redis backend".to_string())
                })?;
                Ok(Arc::new(RedisStore::new(url)?))
            }
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Environment specific overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `STOREFRONT__SERVER__PORT=9000`
            .add_source(config::Environment::with_prefix("STOREFRONT").separator("__"))
            .build()?;

        let config: Self = s.try_deserialize()?;
        config.cache.max_age()?;
        Ok(config)
    }
}
