use crate::catalog::{Catalog, CatalogEntry};
use crate::error::Result;
use crate::store::CatalogStore;
use tokio::sync::{Mutex, RwLock};

/// The one live catalog of the process and its only path to disk.
///
/// Reads and inserts go through the `RwLock`; persists are serialized by `persist_lock` and write
/// a snapshot taken under the read lock, so concurrent matching never waits on file I/O.
#[derive(Debug)]
pub struct CatalogService {
    catalog: RwLock<Catalog>,
    store: CatalogStore,
    persist_lock: Mutex<()>,
}

impl CatalogService {
    pub fn new(store: CatalogStore, catalog: Catalog) -> Self {
        Self {
            catalog: RwLock::new(catalog),
            store,
            persist_lock: Mutex::new(()),
        }
    }

    /// Loads the persisted catalog; unreadable state starts empty (already logged by the store).
    pub async fn open(store: CatalogStore) -> Self {
        let loaded = store.load().await;
        Self::new(store, loaded.catalog)
    }

    #[must_use]
    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    pub async fn read<R>(&self, f: impl FnOnce(&Catalog) -> R) -> R {
        let guard = self.catalog.read().await;
        f(&guard)
    }

    pub async fn snapshot(&self) -> Catalog {
        self.catalog.read().await.clone()
    }

    pub async fn insert_if_absent(&self, entry: CatalogEntry) -> bool {
        self.catalog.write().await.insert_if_absent(entry)
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        self.catalog.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.catalog.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.catalog.read().await.is_empty()
    }

    /// Writes the current catalog. On failure the in-memory catalog stays authoritative and the
    /// next successful persist catches the file up.
    pub async fn persist(&self) -> Result<()> {
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.snapshot().await;
        self.store.save(&snapshot).await
    }
}
