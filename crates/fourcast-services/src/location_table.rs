//! Async handle over a `LocationStore`.
//!
//! SQLite calls are blocking, so every operation runs on the blocking pool
//! behind a mutex. A reader never observes a half-written record.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::location_backend::{LocationId, LocationRecord, LocationStore, StoreError, StoreResult};
use crate::location_store::SqliteLocationStore;

/// Cloneable, thread-safe handle to the persistent location table.
#[derive(Clone)]
pub struct LocationTable {
    store: Arc<Mutex<Box<dyn LocationStore>>>,
}

impl LocationTable {
    pub fn new(store: impl LocationStore + 'static) -> Self {
        Self {
            store: Arc::new(Mutex::new(Box::new(store))),
        }
    }

    /// Open the SQLite table at `path`.
    ///
    /// # Errors
    /// Returns `StoreError::Unavailable` if the database cannot be opened.
    pub async fn open_sqlite(path: impl Into<std::path::PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let store = tokio::task::spawn_blocking(move || SqliteLocationStore::open(path))
            .await
            .map_err(|e| StoreError::unavailable(format!("open task failed: {}", e)))??;
        Ok(Self::new(store))
    }

    pub async fn initialize(&self) -> StoreResult<()> {
        self.run(StoreError::Unavailable, |store| store.initialize())
            .await
    }

    pub async fn insert(
        &self,
        city_name: &str,
        latitude: f64,
        longitude: f64,
    ) -> StoreResult<LocationId> {
        let city_name = city_name.to_string();
        self.run(StoreError::Write, move |store| {
            store.insert(&city_name, latitude, longitude)
        })
        .await
    }

    pub async fn list_all(&self) -> StoreResult<Vec<LocationRecord>> {
        self.run(StoreError::Read, |store| store.list_all()).await
    }

    pub async fn delete_by_id(&self, id: LocationId) -> StoreResult<()> {
        self.run(StoreError::Write, move |store| store.delete_by_id(id))
            .await
    }

    pub async fn count(&self) -> StoreResult<usize> {
        self.run(StoreError::Read, |store| store.count()).await
    }

    async fn run<T, F>(&self, on_join_error: fn(String) -> StoreError, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn LocationStore) -> StoreResult<T> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || {
            let guard = store.lock();
            op(&**guard)
        })
        .await
        .map_err(|e| on_join_error(format!("store task failed: {}", e)))?
    }
}
