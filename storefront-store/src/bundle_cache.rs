use chrono::{Duration, Utc};
use std::collections::BTreeMap;
use storefront_shared::ProductId;
use tracing::{debug, info, warn};

use crate::cache_store::{CacheStore, StoreError};
use crate::stored::{load_entries, StoredBundleData};

pub const DEFAULT_STORAGE_KEY: &str = "bundle_data";
pub const DEFAULT_MAX_AGE_DAYS: i64 = 7;

/// Why the persisted map could not be used. Never leaves this module.
#[derive(Debug, thiserror::Error)]
enum CacheError {
    #[error("bundle cache unavailable: {0}")]
    Unavailable(#[from] StoreError),

    #[error("bundle cache corrupt: {0}")]
    Corrupt(String),
}

type EntryMap = BTreeMap<String, StoredBundleData>;

/// Live entries as of a single load, for callers that look up many ids at once
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BundleSnapshot {
    entries: EntryMap,
}

impl BundleSnapshot {
    pub fn get(&self, product_id: ProductId) -> Option<&StoredBundleData> {
        self.entries.get(&product_id.to_string())
    }

    pub fn product_ids(&self) -> Vec<ProductId> {
        self.entries.keys().filter_map(|k| k.parse().ok()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Age-bounded bundle detail keyed by product id.
///
/// The whole map lives under a single storage key. Every read loads and
/// prunes it; every write replaces one entry and persists the full map.
/// Each operation holds the store's lock for the storage key, so caches
/// sharing a store and key never overwrite each other's entries.
/// Store faults degrade to an empty cache and are only logged.
pub struct LocalMetadataCache<S: CacheStore> {
    store: S,
    storage_key: String,
    max_age: Duration,
}

impl<S: CacheStore> LocalMetadataCache<S> {
    pub fn new(store: S) -> Self {
        Self::with_storage_key(store, DEFAULT_STORAGE_KEY)
    }

    pub fn with_storage_key(store: S, storage_key: impl Into<String>) -> Self {
        Self {
            store,
            storage_key: storage_key.into(),
            max_age: Duration::days(DEFAULT_MAX_AGE_DAYS),
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Replace the entry for `product_id`, stamping the current time.
    pub fn save(&self, product_id: ProductId, mut data: StoredBundleData) -> StoredBundleData {
        data.timestamp = Utc::now().timestamp_millis();

        let _guard = self.store.key_locks().lock(&self.storage_key);
        let mut entries = self.load_or_reset();
        entries.insert(product_id.to_string(), data.clone());
        self.persist(&entries);

        info!(product_id, items = data.bundle_items.len(), "Bundle detail cached");
        data
    }

    pub fn get(&self, product_id: ProductId) -> Option<StoredBundleData> {
        let _guard = self.store.key_locks().lock(&self.storage_key);
        self.load_or_reset().remove(&product_id.to_string())
    }

    pub fn remove(&self, product_id: ProductId) {
        let _guard = self.store.key_locks().lock(&self.storage_key);
        let mut entries = self.load_or_reset();
        if entries.remove(&product_id.to_string()).is_some() {
            self.persist(&entries);
            info!(product_id, "Bundle detail removed");
        }
    }

    pub fn clear(&self) {
        let _guard = self.store.key_locks().lock(&self.storage_key);
        match self.store.delete(&self.storage_key) {
            Ok(()) => info!(key = %self.storage_key, "Bundle cache cleared"),
            Err(e) => warn!(key = %self.storage_key, error = %e, "Failed to clear bundle cache"),
        }
    }

    /// Product ids with a live entry
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.snapshot().product_ids()
    }

    /// Every live entry from one load of the store
    pub fn snapshot(&self) -> BundleSnapshot {
        let _guard = self.store.key_locks().lock(&self.storage_key);
        BundleSnapshot {
            entries: self.load_or_reset(),
        }
    }

    fn load_or_reset(&self) -> EntryMap {
        match self.load() {
            Ok(entries) => entries,
            Err(CacheError::Corrupt(reason)) => {
                warn!(key = %self.storage_key, %reason, "Resetting corrupt bundle cache");
                if let Err(e) = self.store.delete(&self.storage_key) {
                    warn!(key = %self.storage_key, error = %e, "Failed to reset bundle cache");
                }
                EntryMap::new()
            }
            Err(e) => {
                warn!(key = %self.storage_key, error = %e, "Bundle cache unavailable, using empty cache");
                EntryMap::new()
            }
        }
    }

    fn load(&self) -> Result<EntryMap, CacheError> {
        let Some(raw) = self.store.read(&self.storage_key)? else {
            return Ok(EntryMap::new());
        };

        let value: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| CacheError::Corrupt(e.to_string()))?;
        let now = Utc::now().timestamp_millis();
        let loaded = load_entries(value, now, self.max_age.num_milliseconds())
            .ok_or_else(|| CacheError::Corrupt("top-level value is not an object".to_string()))?;

        if loaded.pruned > 0 {
            debug!(key = %self.storage_key, pruned = loaded.pruned, "Pruned bundle cache");
            self.persist(&loaded.entries);
        }
        Ok(loaded.entries)
    }

    fn persist(&self, entries: &EntryMap) {
        let serialized = match serde_json::to_string(entries) {
            Ok(s) => s,
            Err(e) => {
                warn!(key = %self.storage_key, error = %e, "Failed to serialize bundle cache");
                return;
            }
        };
        if let Err(e) = self.store.write(&self.storage_key, &serialized) {
            warn!(key = %self.storage_key, error = %e, "Failed to persist bundle cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_store::{KeyLocks, MemoryStore};
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use std::thread;
    use storefront_catalog::{BundleItemSpec, ItemRole, PricingMode};

    fn data(quantity: i32) -> StoredBundleData {
        StoredBundleData {
            bundle_items: vec![BundleItemSpec {
                product_id: 501,
                role: ItemRole::Required,
                is_free: false,
                quantity,
                unit_price: Some(Decimal::from(12)),
            }],
            bundle_total: Decimal::from(12 * quantity),
            box_price: None,
            products_total: Some(Decimal::from(12 * quantity)),
            required_items_total: Some(Decimal::from(12 * quantity)),
            addon_items_total: Some(Decimal::ZERO),
            pricing_mode: PricingMode::Sum,
            fixed_price: None,
            quantity: None,
            timestamp: 0,
        }
    }

    /// Store whose every operation fails
    #[derive(Default)]
    struct BrokenStore(KeyLocks);

    impl CacheStore for BrokenStore {
        fn read(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("storage disabled".to_string()))
        }
        fn write(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("storage disabled".to_string()))
        }
        fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("storage disabled".to_string()))
        }
        fn key_locks(&self) -> &KeyLocks {
            &self.0
        }
    }

    #[test]
    fn test_save_then_get_round_trip() {
        let cache = LocalMetadataCache::new(MemoryStore::new());
        let saved = cache.save(42, data(2));

        assert!(saved.timestamp > 0);
        assert_eq!(cache.get(42), Some(saved));
        assert_eq!(cache.get(43), None);
    }

    #[test]
    fn test_save_overwrites_whole_entry() {
        let cache = LocalMetadataCache::new(MemoryStore::new());
        let mut first = data(2);
        first.box_price = Some(Decimal::from(99));
        cache.save(42, first);

        let second = cache.save(42, data(3));
        let stored = cache.get(42).unwrap();
        assert_eq!(stored, second);
        assert_eq!(stored.box_price, None);
    }

    #[test]
    fn test_expired_entry_pruned_on_read() {
        let store = Arc::new(MemoryStore::new());
        let cache = LocalMetadataCache::new(store.clone());
        cache.save(1, data(1));

        let mut old = data(1);
        old.timestamp = (Utc::now() - Duration::days(8)).timestamp_millis();
        let raw = serde_json::json!({
            "1": cache.get(1).unwrap(),
            "2": old,
        });
        store.write(DEFAULT_STORAGE_KEY, &raw.to_string()).unwrap();

        // Any read prunes, and the store is rewritten without the expired entry
        assert!(cache.get(1).is_some());
        let persisted: serde_json::Value =
            serde_json::from_str(&store.read(DEFAULT_STORAGE_KEY).unwrap().unwrap()).unwrap();
        assert!(persisted.get("1").is_some());
        assert!(persisted.get("2").is_none());
        assert_eq!(cache.get(2), None);
    }

    #[test]
    fn test_custom_max_age() {
        let cache = LocalMetadataCache::new(MemoryStore::new()).with_max_age(Duration::milliseconds(-1));
        cache.save(9, data(1));
        assert_eq!(cache.get(9), None);
    }

    #[test]
    fn test_corrupt_store_reads_as_empty() {
        let store = Arc::new(MemoryStore::new());
        store.write(DEFAULT_STORAGE_KEY, "{not json").unwrap();
        let cache = LocalMetadataCache::new(store.clone());

        assert_eq!(cache.get(1), None);
        assert_eq!(cache.get(2), None);
        assert!(cache.product_ids().is_empty());
    }

    #[test]
    fn test_save_after_corruption_starts_fresh_store() {
        let store = Arc::new(MemoryStore::new());
        store.write(DEFAULT_STORAGE_KEY, "[1, 2, 3]").unwrap();
        let cache = LocalMetadataCache::new(store.clone());

        let saved = cache.save(5, data(1));
        assert_eq!(cache.get(5), Some(saved));
        assert_eq!(cache.product_ids(), vec![5]);
    }

    #[test]
    fn test_unavailable_store_never_raises() {
        let cache = LocalMetadataCache::new(BrokenStore::default());
        let saved = cache.save(1, data(1));
        assert_eq!(saved.bundle_items.len(), 1);
        assert_eq!(cache.get(1), None);
        cache.remove(1);
        cache.clear();
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = LocalMetadataCache::new(MemoryStore::new());
        cache.save(1, data(1));
        cache.save(2, data(1));

        cache.remove(1);
        assert_eq!(cache.product_ids(), vec![2]);

        cache.clear();
        assert!(cache.product_ids().is_empty());
    }

    #[test]
    fn test_storage_keys_are_isolated() {
        let store = Arc::new(MemoryStore::new());
        let a = LocalMetadataCache::with_storage_key(store.clone(), "bundle_data:a");
        let b = LocalMetadataCache::with_storage_key(store.clone(), "bundle_data:b");

        a.save(1, data(1));
        assert!(a.get(1).is_some());
        assert!(b.get(1).is_none());
    }

    #[test]
    fn test_concurrent_saves_keep_every_entry() {
        let store = Arc::new(MemoryStore::new());

        thread::scope(|scope| {
            for worker in 0..8u64 {
                let store = store.clone();
                scope.spawn(move || {
                    // Separate cache instances over one shared store and key
                    let cache = LocalMetadataCache::new(store);
                    for n in 0..10 {
                        cache.save(worker * 100 + n, data(1));
                    }
                });
            }
        });

        let cache = LocalMetadataCache::new(store);
        assert_eq!(cache.product_ids().len(), 80);
    }

    #[test]
    fn test_concurrent_save_and_remove() {
        let store = Arc::new(MemoryStore::new());
        let seed = LocalMetadataCache::new(store.clone());
        for id in 0..20 {
            seed.save(id, data(1));
        }

        thread::scope(|scope| {
            let remover = store.clone();
            scope.spawn(move || {
                let cache = LocalMetadataCache::new(remover);
                for id in 0..20 {
                    cache.remove(id);
                }
            });
            let saver = store.clone();
            scope.spawn(move || {
                let cache = LocalMetadataCache::new(saver);
                for id in 100..120 {
                    cache.save(id, data(1));
                }
            });
        });

        let ids = LocalMetadataCache::new(store).product_ids();
        assert_eq!(ids, (100..120).collect::<Vec<_>>());
    }

    #[test]
    fn test_snapshot_reads_once() {
        let cache = LocalMetadataCache::new(MemoryStore::new());
        cache.save(1, data(1));
        cache.save(2, data(2));

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.product_ids(), vec![1, 2]);
        assert_eq!(snapshot.get(2).map(|d| d.implied_quantity()), Some(Some(2)));
        assert!(snapshot.get(3).is_none());

        // Later writes do not leak into a taken snapshot
        cache.remove(1);
        assert!(snapshot.get(1).is_some());
        assert!(cache.snapshot().get(1).is_none());
    }
}
