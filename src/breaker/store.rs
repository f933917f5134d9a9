//! Persistence of breaker records.
//!
//! A [`StateStore`] is a map from system id to [`CircuitBreakerRecord`] with
//! last-writer-wins semantics. The guard reads a record, decides, and writes
//! it back without any compare-and-swap; concurrent callers for the same
//! system can overwrite each other's increments.
//!
//! Backends shipped here:
//!
//! - [`MemoryStore`]: process-local, shared between clones
//! - [`JsonFileStore`]: one JSON document per system in a directory (feature
//!   `serde`)
//! - [`RetryingStore`]: wraps any store and retries transient backend faults

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;

use super::error::StoreError;
use super::record::CircuitBreakerRecord;
use crate::retry::{RetryExecutor, RetryPolicy};

/// Durable storage for breaker records.
///
/// `load` returns `Ok(None)` when the system has no record. Implementations
/// must make a saved record visible to later loads by other callers.
pub trait StateStore: Send + Sync {
    /// Fetch the record for `system_id`.
    fn load(
        &self,
        system_id: &str,
    ) -> impl Future<Output = Result<Option<CircuitBreakerRecord>, StoreError>> + Send;

    /// Insert or replace the record keyed by its system id.
    fn save(
        &self,
        record: &CircuitBreakerRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

impl<S: StateStore> StateStore for Arc<S> {
    fn load(
        &self,
        system_id: &str,
    ) -> impl Future<Output = Result<Option<CircuitBreakerRecord>, StoreError>> + Send {
        (**self).load(system_id)
    }

    fn save(
        &self,
        record: &CircuitBreakerRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).save(record)
    }
}

/// In-process store. Clones share the same map.
///
/// ```rust
/// use floodgate::{BreakerSettings, CircuitBreakerRecord, MemoryStore, StateStore};
///
/// # tokio_test::block_on(async {
/// let store = MemoryStore::new();
/// let record = CircuitBreakerRecord::new("search", &BreakerSettings::default());
///
/// store.save(&record).await.unwrap();
/// assert_eq!(store.load("search").await.unwrap(), Some(record));
/// assert_eq!(store.load("missing").await.unwrap(), None);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<HashMap<String, CircuitBreakerRecord>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if no record is stored.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Copy of the record for `system_id`, without going through the trait.
    pub fn get(&self, system_id: &str) -> Option<CircuitBreakerRecord> {
        self.records.read().get(system_id).cloned()
    }

    /// Remove the record for `system_id`.
    pub fn remove(&self, system_id: &str) -> Option<CircuitBreakerRecord> {
        self.records.write().remove(system_id)
    }
}

impl StateStore for MemoryStore {
    async fn load(&self, system_id: &str) -> Result<Option<CircuitBreakerRecord>, StoreError> {
        Ok(self.get(system_id))
    }

    async fn save(&self, record: &CircuitBreakerRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .insert(record.system_id().to_string(), record.clone());
        Ok(())
    }
}

#[cfg(feature = "serde")]
pub use file::JsonFileStore;

#[cfg(feature = "serde")]
mod file {
    use std::io::ErrorKind;
    use std::path::{Path, PathBuf};

    use super::{CircuitBreakerRecord, StateStore, StoreError};

    /// Directory of JSON documents, one per system id.
    ///
    /// Writes go to a temporary sibling file that is renamed over the target,
    /// so readers never observe a half-written record.
    #[derive(Debug, Clone)]
    pub struct JsonFileStore {
        dir: PathBuf,
    }

    impl JsonFileStore {
        /// Store records under `dir`. The directory is created on first save.
        pub fn new(dir: impl Into<PathBuf>) -> Self {
            Self { dir: dir.into() }
        }

        /// The backing directory.
        pub fn dir(&self) -> &Path {
            &self.dir
        }

        /// Path of the document holding `system_id`.
        pub fn path_for(&self, system_id: &str) -> PathBuf {
            self.dir.join(format!("{}.json", encode_file_stem(system_id)))
        }
    }

    impl StateStore for JsonFileStore {
        async fn load(&self, system_id: &str) -> Result<Option<CircuitBreakerRecord>, StoreError> {
            let bytes = match tokio::fs::read(self.path_for(system_id)).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e.into()),
            };

            let record: CircuitBreakerRecord = serde_json::from_slice(&bytes)?;
            if record.system_id() != system_id {
                return Err(StoreError::Serialization(format!(
                    "document for {} holds record {}",
                    system_id,
                    record.system_id()
                )));
            }
            Ok(Some(record))
        }

        async fn save(&self, record: &CircuitBreakerRecord) -> Result<(), StoreError> {
            tokio::fs::create_dir_all(&self.dir).await?;

            let target = self.path_for(record.system_id());
            let staging = target.with_extension(format!("{:016x}.tmp", rand::random::<u64>()));
            let bytes = serde_json::to_vec_pretty(record)?;

            tokio::fs::write(&staging, bytes).await?;
            if let Err(e) = tokio::fs::rename(&staging, &target).await {
                let _ = tokio::fs::remove_file(&staging).await;
                return Err(e.into());
            }
            Ok(())
        }
    }

    /// Percent-encode everything outside `[A-Za-z0-9_-]` so any id maps to
    /// exactly one file name.
    fn encode_file_stem(system_id: &str) -> String {
        let mut stem = String::with_capacity(system_id.len());
        for byte in system_id.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                stem.push(byte as char);
            } else {
                stem.push_str(&format!("%{:02X}", byte));
            }
        }
        stem
    }

}

/// A store whose operations are retried on transient backend faults.
///
/// Only [`StoreError`]s carrying a retry marker are retried; everything else
/// fails on the first attempt, as with any [`RetryExecutor`] call.
#[derive(Debug, Clone)]
pub struct RetryingStore<S> {
    inner: S,
    executor: RetryExecutor,
}

impl<S: StateStore> RetryingStore<S> {
    /// Wrap `inner`, retrying under `policy`.
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self {
            inner,
            executor: RetryExecutor::new(policy),
        }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: StateStore> StateStore for RetryingStore<S> {
    async fn load(&self, system_id: &str) -> Result<Option<CircuitBreakerRecord>, StoreError> {
        let label = format!("load({})", system_id);
        let inner = &self.inner;
        self.executor
            .execute(&label, move || inner.load(system_id))
            .await
    }

    async fn save(&self, record: &CircuitBreakerRecord) -> Result<(), StoreError> {
        let label = format!("save({})", record.system_id());
        let inner = &self.inner;
        self.executor.execute(&label, move || inner.save(record)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::{BreakerSettings, CircuitState};
    use crate::testing::FaultyStore;
    use std::time::Duration;

    fn fast_retries() -> RetryPolicy {
        RetryPolicy::new()
            .with_max_retries(3)
            .with_base_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(2))
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip_and_overwrite() {
        let store = MemoryStore::new();
        let settings = BreakerSettings::default();
        assert!(store.is_empty());

        store
            .save(&CircuitBreakerRecord::new("a", &settings))
            .await
            .unwrap();
        let open = CircuitBreakerRecord::from_persisted("a", CircuitState::Open, 3, 10, &settings);
        store.save(&open).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.load("a").await.unwrap(), Some(open));
    }

    #[tokio::test]
    async fn test_memory_store_clones_share_state() {
        let store = MemoryStore::new();
        let handle = store.clone();

        store
            .save(&CircuitBreakerRecord::new("shared", &BreakerSettings::default()))
            .await
            .unwrap();

        assert!(handle.get("shared").is_some());
        assert!(handle.remove("shared").is_some());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_arc_store_delegates() {
        let store = Arc::new(MemoryStore::new());
        let record = CircuitBreakerRecord::new("arc", &BreakerSettings::default());

        store.save(&record).await.unwrap();
        assert_eq!(StateStore::load(&store, "arc").await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_retrying_store_recovers_from_transient_faults() {
        let faulty = FaultyStore::new(MemoryStore::new());
        faulty.fail_next_loads(2, || StoreError::transient("throttled by backend"));
        let store = RetryingStore::new(faulty, fast_retries());

        let loaded = store.load("anything").await.unwrap();

        assert!(loaded.is_none());
        assert_eq!(store.inner().load_calls(), 3);
    }

    #[tokio::test]
    async fn test_retrying_store_does_not_retry_fatal_faults() {
        let faulty = FaultyStore::new(MemoryStore::new());
        faulty.fail_next_saves(1, || StoreError::backend("access denied"));
        let store = RetryingStore::new(faulty, fast_retries());

        let record = CircuitBreakerRecord::new("svc", &BreakerSettings::default());
        let err = store.save(&record).await.unwrap_err();

        assert!(matches!(err, StoreError::Backend { .. }));
        assert_eq!(store.inner().save_calls(), 1);
    }
}
