use axum::http::HeaderMap;
use chrono::Duration;
use config::ConfigError;
use std::sync::Arc;
use storefront_cart::BundleCart;
use storefront_catalog::PricingEngine;
use storefront_store::app_config::CacheConfig;
use storefront_store::{CacheStore, LocalMetadataCache};

use crate::error::AppError;

pub const SESSION_HEADER: &str = "x-session-id";
pub const ANONYMOUS_SESSION: &str = "anonymous";

pub type SessionCart = BundleCart<Arc<dyn CacheStore>>;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CacheStore>,
    pub cache: CacheConfig,
    pub pricing: PricingEngine,
    max_age: Duration,
}

impl AppState {
    /// Fails when the cache settings carry an unusable entry lifetime
    pub fn new(store: Arc<dyn CacheStore>, cache: CacheConfig) -> Result<Self, ConfigError> {
        let max_age = cache.max_age()?;
        Ok(Self {
            store,
            cache,
            pricing: PricingEngine::default(),
            max_age,
        })
    }

    /// Bundle cart scoped to one browsing session's storage key
    pub fn cart_for(&self, session: &str) -> SessionCart {
        let cache = LocalMetadataCache::with_storage_key(
            self.store.clone(),
            format!("{}:{}", self.cache.storage_key, session),
        )
        .with_max_age(self.max_age);

        BundleCart::new(cache, self.pricing.clone())
    }

    /// Run `f` against the session's cart off the async runtime; stores may block.
    pub async fn with_cart<T, F>(&self, headers: &HeaderMap, f: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(SessionCart) -> T + Send + 'static,
    {
        let cart = self.cart_for(&session_id(headers));
        Ok(tokio::task::spawn_blocking(move || f(cart)).await?)
    }
}

/// Session id from the request, falling back to a shared anonymous session.
pub fn session_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .unwrap_or(ANONYMOUS_SESSION)
        .to_string()
}
