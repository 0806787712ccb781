//! Synchronous Store
//!
//! Blocking Store Manager over `std::fs`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::{StoreOptions, WritePolicy};
use crate::error::Result;
use crate::record::RecordHandle;
use crate::storage::CollectionDir;

/// Blocking collection of JSON documents
///
/// ## Concurrency:
/// - `records`: held for the whole of every operation, so operations are
///   serialized even when the store is shared across threads
/// - `snapshot`: RwLock, always taken after `records`
/// - Counters are atomics (lock-free)
pub struct SplitStore {
    /// Collection options
    options: StoreOptions,

    /// `{base_dir}/{name}`
    dir: CollectionDir,

    /// Record Handles, created lazily per key
    records: Mutex<HashMap<String, RecordHandle>>,

    /// key → current in-memory value
    snapshot: RwLock<BTreeMap<String, Value>>,

    initialized: AtomicBool,

    /// Documents written since open
    disk_writes: AtomicU64,

    /// Document loads (including loads of absent documents) since open
    disk_loads: AtomicU64,
}

impl SplitStore {
    /// Open a collection
    ///
    /// On open:
    /// 1. Create `{base_dir}/{name}` if it doesn't exist
    /// 2. Scan it for `*.json` documents
    /// 3. Load each into a Record Handle and seed the snapshot
    pub fn open(options: StoreOptions) -> Result<Self> {
        let store = Self {
            dir: CollectionDir::new(options.collection_dir()),
            options,
            records: Mutex::new(HashMap::new()),
            snapshot: RwLock::new(BTreeMap::new()),
            initialized: AtomicBool::new(false),
            disk_writes: AtomicU64::new(0),
            disk_loads: AtomicU64::new(0),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Open `name` under `base_dir` with default options
    pub fn open_in(base_dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        let options = StoreOptions::builder()
            .name(name)
            .base_dir(base_dir.as_ref())
            .build()?;
        Self::open(options)
    }

    /// Create the directory and seed the snapshot. Repeated calls are no-ops.
    pub fn initialize(&self) -> Result<()> {
        let mut records = self.records.lock();
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.dir.ensure_exists()?;
        let seeded = self.reconcile(&mut records)?;
        self.initialized.store(true, Ordering::SeqCst);

        tracing::info!(
            collection = %self.options.name,
            dir = %self.dir.path().display(),
            records = seeded.len(),
            "opened collection"
        );
        Ok(())
    }

    // =========================================================================
    // Key Operations
    // =========================================================================

    /// Current value for a key; `{}` if the key has no document
    pub fn get(&self, key: &str) -> Result<Value> {
        CollectionDir::check_key(key)?;
        let mut records = self.records.lock();
        Ok(self.handle(&mut records, key).value().clone())
    }

    /// Update a key's value according to the write policy
    ///
    /// - `OnChange`: no-op if the value is deep-equal to the current one,
    ///   otherwise memory, snapshot and document are updated. If the write
    ///   fails, memory keeps the new value and `write(key)` may be retried.
    /// - `Deferred`: memory and snapshot only.
    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        CollectionDir::check_key(key)?;
        let mut records = self.records.lock();
        let handle = self.handle(&mut records, key);
        let changed = handle.replace(value);

        match self.options.write_policy {
            WritePolicy::OnChange => {
                if !changed {
                    tracing::trace!(key, "value unchanged, skipping write");
                    return Ok(());
                }
                self.snapshot.write().insert(key.to_string(), handle.value().clone());
                self.persist(handle)
            }
            WritePolicy::Deferred => {
                self.snapshot.write().insert(key.to_string(), handle.value().clone());
                Ok(())
            }
        }
    }

    /// Persist a key's current in-memory value, creating or overwriting its
    /// document
    pub fn write(&self, key: &str) -> Result<()> {
        CollectionDir::check_key(key)?;
        let mut records = self.records.lock();
        let handle = self.handle(&mut records, key);
        self.persist(handle)?;
        self.snapshot.write().insert(key.to_string(), handle.value().clone());
        Ok(())
    }

    /// Persist every cached handle
    pub fn flush_all(&self) -> Result<()> {
        let records = self.records.lock();
        for handle in records.values() {
            self.persist(handle)?;
        }
        Ok(())
    }

    /// Remove a key's document, handle and snapshot entry
    ///
    /// Deleting an absent key succeeds.
    pub fn delete(&self, key: &str) -> Result<()> {
        CollectionDir::check_key(key)?;
        let mut records = self.records.lock();

        let removed = self.dir.remove_record(key)?;
        records.remove(key);
        self.snapshot.write().remove(key);

        tracing::debug!(key, removed, "deleted record");
        Ok(())
    }

    /// Remove every file in the collection directory and forget all keys
    ///
    /// A missing directory counts as already empty. If the directory cannot
    /// be listed, the error is returned and memory is left as it was. If some
    /// removals fail, only the keys whose documents were removed are
    /// forgotten and `ClearFailed` is returned.
    pub fn clear(&self) -> Result<()> {
        let mut records = self.records.lock();

        let removal = self.dir.remove_all()?;
        let mut snapshot = self.snapshot.write();
        if removal.is_complete() {
            records.clear();
            snapshot.clear();
        } else {
            for key in removal.removed_keys() {
                records.remove(&key);
                snapshot.remove(&key);
            }
            tracing::warn!(
                collection = %self.options.name,
                removed = removal.removed(),
                failed = removal.failed(),
                "clear left files behind"
            );
        }
        drop(snapshot);

        let removed = removal.into_result()?;
        tracing::info!(collection = %self.options.name, removed, "cleared collection");
        Ok(())
    }

    /// Rescan the directory and return every key's current value
    ///
    /// Keys that only exist in memory (e.g. deferred writes) are included.
    pub fn get_all(&self) -> Result<BTreeMap<String, Value>> {
        let mut records = self.records.lock();
        self.reconcile(&mut records)
    }

    /// Number of keys in the snapshot
    pub fn size(&self) -> usize {
        self.snapshot.read().len()
    }

    // =========================================================================
    // Typed Helpers
    // =========================================================================

    /// Deserialize a key's current value into `T`
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        Ok(serde_json::from_value(self.get(key)?)?)
    }

    /// Serialize `value` and `set` it
    pub fn set_as<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set(key, serde_json::to_value(value)?)
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Collection name
    pub fn name(&self) -> &str {
        &self.options.name
    }

    /// Collection directory (`{base_dir}/{name}`)
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Copy of the snapshot
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.snapshot.read().clone()
    }

    /// Keys in the snapshot, sorted
    pub fn keys(&self) -> Vec<String> {
        self.snapshot.read().keys().cloned().collect()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.snapshot.read().contains_key(key)
    }

    /// Number of cached Record Handles
    pub fn cached_handles(&self) -> usize {
        self.records.lock().len()
    }

    pub fn disk_writes(&self) -> u64 {
        self.disk_writes.load(Ordering::SeqCst)
    }

    pub fn disk_loads(&self) -> u64 {
        self.disk_loads.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Cached handle for `key`, loading it on first access
    fn handle<'a>(&self, records: &'a mut HashMap<String, RecordHandle>, key: &str) -> &'a mut RecordHandle {
        records.entry(key.to_string()).or_insert_with(|| {
            self.disk_loads.fetch_add(1, Ordering::SeqCst);
            RecordHandle::load(&self.dir, key)
        })
    }

    fn persist(&self, handle: &RecordHandle) -> Result<()> {
        handle.persist(self.options.pretty, self.options.durable_writes)?;
        self.disk_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Scan the directory, load every document not yet cached, refresh the
    /// snapshot from the handles, and return it
    fn reconcile(&self, records: &mut HashMap<String, RecordHandle>) -> Result<BTreeMap<String, Value>> {
        let keys = self.dir.scan_keys()?;

        let mut snapshot = self.snapshot.write();
        for key in keys {
            let value = self.handle(records, &key).value().clone();
            snapshot.insert(key, value);
        }
        Ok(snapshot.clone())
    }
}
