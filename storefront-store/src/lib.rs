pub mod app_config;
pub mod bundle_cache;
pub mod cache_store;
pub mod redis_repo;
pub mod stored;

pub use bundle_cache::{BundleSnapshot, LocalMetadataCache};
pub use cache_store::{CacheStore, FileStore, KeyLocks, MemoryStore, StoreError};
pub use redis_repo::RedisStore;
pub use stored::StoredBundleData;
