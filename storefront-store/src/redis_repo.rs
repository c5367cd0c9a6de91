use redis::Commands;
use tracing::info;

use crate::cache_store::{CacheStore, KeyLocks, StoreError};

/// Bundle metadata kept in redis, one string value per storage key.
///
/// Key locks serialize rewrites within this process only.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    key_prefix: String,
    locks: KeyLocks,
}

impl RedisStore {
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        info!("Redis bundle store configured");
        Ok(Self {
            client,
            key_prefix: "storefront".to_string(),
            locks: KeyLocks::default(),
        })
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn redis_key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }
}

impl CacheStore for RedisStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.client.get_connection()?;
        let value: Option<String> = conn.get(self.redis_key(key))?;
        Ok(value)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.client.get_connection()?;
        conn.set::<_, _, ()>(self.redis_key(key), value)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.client.get_connection()?;
        conn.del::<_, ()>(self.redis_key(key))?;
        Ok(())
    }

    fn key_locks(&self) -> &KeyLocks {
        &self.locks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_prefixed() {
        let store = RedisStore::new("redis://127.0.0.1/").unwrap().with_prefix("shop");
        assert_eq!(store.redis_key("bundle_data:abc"), "shop:bundle_data:abc");
    }

    #[test]
    fn test_rejects_malformed_url() {
        assert!(RedisStore::new("not a url").is_err());
    }
}
