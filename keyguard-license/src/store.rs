//! Authoritative in-memory license inventory.
//!
//! One async mutex guards the whole map. It is held across the change and
//! the backend save, so read-check-write sequences never interleave and
//! snapshot writes reach the backend one at a time.

use crate::error::{LicenseError, LicenseResult};
use crate::persistence::LicenseBackend;
use crate::record::LicenseRecord;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Records plus whether memory has run ahead of the backend.
struct Inventory {
    records: BTreeMap<String, LicenseRecord>,
    /// Set when a save failed; cleared by the next successful one.
    dirty: bool,
}

/// Key → record mapping backed by a [`LicenseBackend`].
pub struct LicenseStore {
    inventory: Mutex<Inventory>,
    backend: Arc<dyn LicenseBackend>,
}

impl std::fmt::Debug for LicenseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseStore").finish_non_exhaustive()
    }
}

impl LicenseStore {
    /// Loads the inventory from `backend`.
    ///
    /// Never fails: a corrupt or unreadable store is logged and the
    /// inventory starts empty. The next successful save overwrites it.
    pub async fn open(backend: Arc<dyn LicenseBackend>) -> Self {
        let loaded = match backend.load().await {
            Ok(records) => records,
            Err(LicenseError::CorruptStore(msg)) => {
                warn!("License store is corrupt, starting with an empty inventory: {msg}");
                Vec::new()
            }
            Err(e) => {
                error!("Failed to load license store, starting with an empty inventory: {e}");
                Vec::new()
            }
        };

        let mut records = BTreeMap::new();
        for record in loaded {
            if let Some(dup) = records.insert(record.key().to_string(), record) {
                warn!("Duplicate key {} in license store, keeping the last entry", dup.key());
            }
        }
        info!("Loaded {} keys", records.len());

        Self {
            inventory: Mutex::new(Inventory {
                records,
                dirty: false,
            }),
            backend,
        }
    }

    /// Returns a copy of the record for `key`.
    pub async fn get(&self, key: &str) -> LicenseResult<LicenseRecord> {
        self.inventory
            .lock()
            .await
            .records
            .get(key)
            .cloned()
            .ok_or_else(|| LicenseError::NotFound(key.to_string()))
    }

    /// Creates or fully replaces a record, returning the one it replaced.
    pub async fn put(&self, record: LicenseRecord) -> LicenseResult<Option<LicenseRecord>> {
        let mut inventory = self.inventory.lock().await;
        let previous = inventory.records.insert(record.key().to_string(), record);
        self.persist(&mut inventory).await?;
        Ok(previous)
    }

    /// Creates a record only if its key is not taken.
    pub async fn insert_new(&self, record: LicenseRecord) -> LicenseResult<()> {
        let mut inventory = self.inventory.lock().await;
        if inventory.records.contains_key(record.key()) {
            self.flush_if_dirty(&mut inventory).await?;
            return Err(LicenseError::KeyExists(record.key().to_string()));
        }
        inventory.records.insert(record.key().to_string(), record);
        self.persist(&mut inventory).await
    }

    /// Applies `f` to the record for `key` under the store lock.
    ///
    /// The inventory is saved when `f` changed the record, or when an
    /// earlier save failed, so a retried no-op never reports success for
    /// state that is only in memory. If the save fails the change stays in
    /// memory and the error is returned instead of `f`'s result.
    pub async fn mutate<T, F>(&self, key: &str, f: F) -> LicenseResult<T>
    where
        F: FnOnce(&mut LicenseRecord) -> T,
    {
        let mut inventory = self.inventory.lock().await;
        let record = inventory
            .records
            .get_mut(key)
            .ok_or_else(|| LicenseError::NotFound(key.to_string()))?;

        let before = record.clone();
        let out = f(record);
        let changed = *record != before;
        if changed || inventory.dirty {
            self.persist(&mut inventory).await?;
        }
        Ok(out)
    }

    /// Removes the record for `key`, returning it.
    ///
    /// A miss still flushes a pending failed save first, so a retried
    /// delete reports `NotFound` only once the removal is on disk.
    pub async fn delete(&self, key: &str) -> LicenseResult<LicenseRecord> {
        let mut inventory = self.inventory.lock().await;
        let Some(removed) = inventory.records.remove(key) else {
            self.flush_if_dirty(&mut inventory).await?;
            return Err(LicenseError::NotFound(key.to_string()));
        };
        self.persist(&mut inventory).await?;
        Ok(removed)
    }

    /// Snapshot of every record, ordered by key.
    pub async fn list(&self) -> Vec<LicenseRecord> {
        self.inventory.lock().await.records.values().cloned().collect()
    }

    /// Number of records.
    pub async fn len(&self) -> usize {
        self.inventory.lock().await.records.len()
    }

    /// Returns true if the inventory is empty.
    pub async fn is_empty(&self) -> bool {
        self.inventory.lock().await.records.is_empty()
    }

    /// Returns true if memory holds changes the backend has not accepted.
    pub async fn is_dirty(&self) -> bool {
        self.inventory.lock().await.dirty
    }

    async fn flush_if_dirty(&self, inventory: &mut Inventory) -> LicenseResult<()> {
        if inventory.dirty {
            self.persist(inventory).await?;
        }
        Ok(())
    }

    async fn persist(&self, inventory: &mut Inventory) -> LicenseResult<()> {
        let snapshot: Vec<LicenseRecord> = inventory.records.values().cloned().collect();
        match self.backend.save(&snapshot).await {
            Ok(()) => {
                if inventory.dirty {
                    info!("Pending license changes saved");
                }
                inventory.dirty = false;
                Ok(())
            }
            Err(e) => {
                error!("Failed to save {} keys: {e}", snapshot.len());
                inventory.dirty = true;
                Err(e)
            }
        }
    }
}
