//! Asynchronous Store
//!
//! Tokio Store Manager. Same contract as `SplitStore`; initialization is lazy
//! and happens at most once, on whichever call needs it first.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, OnceCell, OwnedMutexGuard};

use crate::config::{StoreOptions, WritePolicy};
use crate::error::Result;
use crate::record::RecordHandle;
use crate::storage::CollectionDir;

/// Per-key slot; `None` until the key's document has been loaded
type Slot = Arc<AsyncMutex<Option<RecordHandle>>>;

type SlotGuard = OwnedMutexGuard<Option<RecordHandle>>;

/// Async collection of JSON documents
///
/// ## Concurrency:
/// - `init`: one-time initialization guard awaited by every entry point
/// - `slots`: short synchronous lock, only to find, insert or remove a
///   key's slot
/// - each slot: async lock held across the key's disk I/O, so two
///   overlapping `get`s on an uncached key read the document once
/// - `delete` and `clear` remove a key's slot while holding its lock; a
///   waiter that then acquires the removed slot retries with a fresh one
/// - `clear` locks every existing slot (in key order) before removing files
/// - `snapshot`: RwLock, never held across an await
pub struct AsyncSplitStore {
    /// Collection options
    options: StoreOptions,

    /// `{base_dir}/{name}`
    dir: CollectionDir,

    init: OnceCell<()>,

    slots: Mutex<HashMap<String, Slot>>,

    /// key → current in-memory value
    snapshot: RwLock<BTreeMap<String, Value>>,

    disk_writes: AtomicU64,

    disk_loads: AtomicU64,
}

impl AsyncSplitStore {
    /// Create a store without touching disk
    pub fn new(options: StoreOptions) -> Self {
        Self {
            dir: CollectionDir::new(options.collection_dir()),
            options,
            init: OnceCell::new(),
            slots: Mutex::new(HashMap::new()),
            snapshot: RwLock::new(BTreeMap::new()),
            disk_writes: AtomicU64::new(0),
            disk_loads: AtomicU64::new(0),
        }
    }

    /// Create and initialize in one step
    pub async fn open(options: StoreOptions) -> Result<Self> {
        let store = Self::new(options);
        store.initialize().await?;
        Ok(store)
    }

    /// Create the directory and seed the snapshot
    ///
    /// Runs once; concurrent callers wait for the same initialization. A
    /// failed initialization is retried by the next call.
    pub async fn initialize(&self) -> Result<()> {
        self.init
            .get_or_try_init(|| async {
                self.dir.ensure_exists_async().await?;
                let seeded = self.reconcile().await?;
                tracing::info!(
                    collection = %self.options.name,
                    dir = %self.dir.path().display(),
                    records = seeded.len(),
                    "opened collection"
                );
                Ok::<(), crate::StoreError>(())
            })
            .await?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.init.initialized()
    }

    // =========================================================================
    // Key Operations
    // =========================================================================

    /// Current value for a key; `{}` if the key has no document
    pub async fn get(&self, key: &str) -> Result<Value> {
        CollectionDir::check_key(key)?;
        self.initialize().await?;

        let (_, mut guard) = self.lock_slot(key).await;
        let value = self.loaded(&mut guard, key).await.value().clone();
        Ok(value)
    }

    /// Update a key's value according to the write policy
    ///
    /// See [`crate::SplitStore::set`].
    pub async fn set(&self, key: &str, value: Value) -> Result<()> {
        CollectionDir::check_key(key)?;
        self.initialize().await?;

        let (_, mut guard) = self.lock_slot(key).await;
        let handle = self.loaded(&mut guard, key).await;
        let changed = handle.replace(value);

        match self.options.write_policy {
            WritePolicy::OnChange => {
                if !changed {
                    tracing::trace!(key, "value unchanged, skipping write");
                    return Ok(());
                }
                self.snapshot.write().insert(key.to_string(), handle.value().clone());
                self.persist(handle).await
            }
            WritePolicy::Deferred => {
                self.snapshot.write().insert(key.to_string(), handle.value().clone());
                Ok(())
            }
        }
    }

    /// Persist a key's current in-memory value
    pub async fn write(&self, key: &str) -> Result<()> {
        CollectionDir::check_key(key)?;
        self.initialize().await?;

        let (_, mut guard) = self.lock_slot(key).await;
        let handle = self.loaded(&mut guard, key).await;
        self.persist(handle).await?;
        self.snapshot.write().insert(key.to_string(), handle.value().clone());
        Ok(())
    }

    /// Persist every cached handle
    pub async fn flush_all(&self) -> Result<()> {
        self.initialize().await?;

        for (_, slot) in self.existing_slots() {
            let guard = slot.lock().await;
            if let Some(handle) = guard.as_ref() {
                self.persist(handle).await?;
            }
        }
        Ok(())
    }

    /// Remove a key's document, handle and snapshot entry
    ///
    /// Deleting an absent key succeeds.
    pub async fn delete(&self, key: &str) -> Result<()> {
        CollectionDir::check_key(key)?;
        self.initialize().await?;

        let (slot, mut guard) = self.lock_slot(key).await;

        let removed = self.dir.remove_record_async(key).await?;
        *guard = None;
        self.forget_slot(key, &slot);
        self.snapshot.write().remove(key);

        tracing::debug!(key, removed, "deleted record");
        Ok(())
    }

    /// Remove every file in the collection directory and forget all keys
    ///
    /// Removals run concurrently and all of them finish before this returns.
    /// A missing directory counts as already empty. If the directory cannot
    /// be listed, the error is returned and memory is left as it was. If some
    /// removals fail, only the keys whose documents were removed are
    /// forgotten and `ClearFailed` is returned.
    pub async fn clear(&self) -> Result<()> {
        self.initialize().await?;

        let mut locked = Vec::new();
        for (key, slot) in self.existing_slots() {
            let guard = Arc::clone(&slot).lock_owned().await;
            locked.push((key, slot, guard));
        }

        let removal = self.dir.remove_all_async().await?;
        let removed_keys: HashSet<String> = removal.removed_keys().collect();
        let complete = removal.is_complete();

        for (key, slot, guard) in locked.iter_mut() {
            if complete || removed_keys.contains(key.as_str()) {
                **guard = None;
                self.forget_slot(key.as_str(), slot);
            }
        }
        {
            let mut snapshot = self.snapshot.write();
            if complete {
                snapshot.clear();
            } else {
                snapshot.retain(|key, _| !removed_keys.contains(key));
            }
        }
        drop(locked);

        if !complete {
            tracing::warn!(
                collection = %self.options.name,
                removed = removal.removed(),
                failed = removal.failed(),
                "clear left files behind"
            );
        }
        let removed = removal.into_result()?;
        tracing::info!(collection = %self.options.name, removed, "cleared collection");
        Ok(())
    }

    /// Rescan the directory and return every key's current value
    pub async fn get_all(&self) -> Result<BTreeMap<String, Value>> {
        self.initialize().await?;
        self.reconcile().await
    }

    /// Number of keys in the snapshot; 0 before initialization
    pub fn size(&self) -> usize {
        self.snapshot.read().len()
    }

    // =========================================================================
    // Typed Helpers
    // =========================================================================

    /// Deserialize a key's current value into `T`
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        Ok(serde_json::from_value(self.get(key).await?)?)
    }

    /// Serialize `value` and `set` it
    pub async fn set_as<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set(key, serde_json::to_value(value)?).await
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.options.name
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.snapshot.read().clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.snapshot.read().keys().cloned().collect()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.snapshot.read().contains_key(key)
    }

    /// Number of tracked keys
    ///
    /// Deleted and cleared keys are not tracked. A slot still being loaded
    /// counts.
    pub fn cached_handles(&self) -> usize {
        self.slots.lock().len()
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

    /// The slot for `key`, created empty if absent
    fn slot(&self, key: &str) -> Slot {
        let mut slots = self.slots.lock();
        Arc::clone(slots.entry(key.to_string()).or_default())
    }

    /// Lock the slot for `key`
    ///
    /// Retries if the slot was removed from the map while this was waiting
    /// for it, so a handle is never loaded into a forgotten slot.
    async fn lock_slot(&self, key: &str) -> (Slot, SlotGuard) {
        loop {
            let slot = self.slot(key);
            let guard = Arc::clone(&slot).lock_owned().await;
            if self.is_current(key, &slot) {
                return (slot, guard);
            }
        }
    }

    fn is_current(&self, key: &str, slot: &Slot) -> bool {
        self.slots
            .lock()
            .get(key)
            .map_or(false, |current| Arc::ptr_eq(current, slot))
    }

    /// Remove `slot` from the map unless it was already replaced
    fn forget_slot(&self, key: &str, slot: &Slot) {
        let mut slots = self.slots.lock();
        if slots.get(key).map_or(false, |current| Arc::ptr_eq(current, slot)) {
            slots.remove(key);
        }
    }

    /// All current slots, sorted by key
    fn existing_slots(&self) -> Vec<(String, Slot)> {
        let slots = self.slots.lock();
        let mut existing: Vec<(String, Slot)> = slots
            .iter()
            .map(|(key, slot)| (key.clone(), Arc::clone(slot)))
            .collect();
        existing.sort_by(|a, b| a.0.cmp(&b.0));
        existing
    }

    /// The handle in a locked slot, loading it on first access
    async fn loaded<'a>(&self, slot: &'a mut Option<RecordHandle>, key: &str) -> &'a mut RecordHandle {
        let handle = match slot.take() {
            Some(handle) => handle,
            None => {
                self.disk_loads.fetch_add(1, Ordering::SeqCst);
                RecordHandle::load_async(&self.dir, key).await
            }
        };
        slot.insert(handle)
    }

    async fn persist(&self, handle: &RecordHandle) -> Result<()> {
        handle.persist_async(self.options.pretty, self.options.durable_writes).await?;
        self.disk_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Scan the directory, load every document not yet cached, refresh the
    /// snapshot from the handles, and return it
    async fn reconcile(&self) -> Result<BTreeMap<String, Value>> {
        let keys = self.dir.scan_keys_async().await?;

        for key in keys {
            let (_, mut guard) = self.lock_slot(&key).await;
            let value = self.loaded(&mut guard, &key).await.value().clone();
            self.snapshot.write().insert(key, value);
        }
        Ok(self.snapshot.read().clone())
    }
}
