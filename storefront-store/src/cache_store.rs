use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Redis operation failed: {0}")]
    Redis(#[from] redis::RedisError),
}

const LOCK_STRIPES: usize = 64;

/// Striped per-key mutexes serializing read-modify-write cycles on a store.
///
/// Two keys may share a stripe; that only costs contention. Clones share the
/// same stripes.
#[derive(Debug, Clone)]
pub struct KeyLocks {
    stripes: Arc<[Mutex<()>]>,
}

impl Default for KeyLocks {
    fn default() -> Self {
        Self {
            stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }
}

impl KeyLocks {
    pub fn lock(&self, key: &str) -> MutexGuard<'_, ()> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let stripe = (hasher.finish() % self.stripes.len() as u64) as usize;
        // The guarded value is (), so a poisoned stripe holds nothing to repair
        self.stripes[stripe]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Persistence medium for the bundle metadata map.
///
/// A store holds opaque string values under string keys, the same contract
/// browser storage offers. Implementations must not interpret the value.
/// Callers that rewrite a value from what they read hold `key_locks()` for
/// the key across the cycle.
pub trait CacheStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn delete(&self, key: &str) -> Result<(), StoreError>;

    fn key_locks(&self) -> &KeyLocks;
}

impl<T: CacheStore + ?Sized> CacheStore for Arc<T> {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).write(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key)
    }

    fn key_locks(&self) -> &KeyLocks {
        (**self).key_locks()
    }
}

/// In-process store, used by tests and single-node deployments
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    locks: KeyLocks,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.values
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl CacheStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn key_locks(&self) -> &KeyLocks {
        &self.locks
    }
}

/// One JSON file per storage key inside a directory.
///
/// File names are the hex encoding of the key, so distinct keys never share
/// a file whatever characters they contain.
#[derive(Debug, Clone)]
pub struct FileStore {
    directory: PathBuf,
    locks: KeyLocks,
}

impl FileStore {
    pub fn new(directory: impl AsRef<Path>) -> Result<Self, StoreError> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            locks: KeyLocks::default(),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.directory
            .join(format!("{}.json", hex::encode(key.as_bytes())))
    }
}

impl CacheStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        // Write beside the target then rename, so readers never see half a map
        let target = self.path_for(key);
        let staging = target.with_extension("json.tmp");
        fs::write(&staging, value)?;
        fs::rename(&staging, &target)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn key_locks(&self) -> &KeyLocks {
        &self.locks
    }
}
