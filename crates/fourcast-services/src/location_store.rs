//! SQLite-based location storage implementation.
//!
//! This module provides `SqliteLocationStore`, the local SQLite implementation
//! of the `LocationStore` trait.

use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;

use crate::location_backend::{LocationId, LocationRecord, LocationStore, StoreError, StoreResult};

/// SQLite-based location storage.
pub struct SqliteLocationStore {
    conn: Connection,
}

impl SqliteLocationStore {
    /// Open (or create) the database file at the given path.
    ///
    /// Creates the parent directory and schema if they don't exist.
    ///
    /// # Errors
    /// Returns `StoreError::Unavailable` if the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::unavailable(format!("{}: {}", parent.display(), e))
            })?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|e| StoreError::unavailable(format!("{}: {}", path.display(), e)))?;

        let store = Self { conn };
        store.initialize()?;
        tracing::debug!("Opened location store at {}", path.display());
        Ok(store)
    }

    /// Create an in-memory location store (for testing).
    #[cfg(test)]
    pub fn in_memory() -> StoreResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::unavailable(e.to_string()))?;
        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<LocationRecord> {
        Ok(LocationRecord {
            id: row.get(0)?,
            city_name: row.get(1)?,
            latitude: row.get(2)?,
            longitude: row.get(3)?,
        })
    }
}

impl LocationStore for SqliteLocationStore {
    fn initialize(&self) -> StoreResult<()> {
        // AUTOINCREMENT keeps ids from being reused after a delete
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS locations (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    cityName TEXT NOT NULL,
                    latitude REAL NOT NULL,
                    longitude REAL NOT NULL
                );
                "#,
            )
            .map_err(|e| StoreError::unavailable(e.to_string()))
    }

    fn insert(&self, city_name: &str, latitude: f64, longitude: f64) -> StoreResult<LocationId> {
        self.conn
            .execute(
                "INSERT INTO locations (cityName, latitude, longitude) VALUES (?1, ?2, ?3)",
                params![city_name, latitude, longitude],
            )
            .map_err(|e| StoreError::write(e.to_string()))?;

        let id = self.conn.last_insert_rowid();
        tracing::debug!("Inserted location {} ({}, {}) as {}", city_name, latitude, longitude, id);
        Ok(id)
    }

    fn list_all(&self) -> StoreResult<Vec<LocationRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, cityName, latitude, longitude FROM locations ORDER BY id ASC")
            .map_err(|e| StoreError::read(e.to_string()))?;

        let rows = stmt
            .query_map([], Self::row_to_record)
            .map_err(|e| StoreError::read(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>().map_err(|e| StoreError::read(e.to_string()))
    }

    fn delete_by_id(&self, id: LocationId) -> StoreResult<()> {
        let removed = self
            .conn
            .execute("DELETE FROM locations WHERE id = ?1", params![id])
            .map_err(|e| StoreError::write(e.to_string()))?;

        if removed == 0 {
            tracing::debug!("Delete of unknown location {} ignored", id);
        } else {
            tracing::debug!("Deleted location {}", id);
        }
        Ok(())
    }

    fn count(&self) -> StoreResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM locations", [], |row| row.get(0))
            .map_err(|e| StoreError::read(e.to_string()))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    fn create_test_store() -> SqliteLocationStore {
        SqliteLocationStore::in_memory().expect("Failed to create in-memory store")
    }

    #[test]
    fn test_insert_and_list() {
        let store = create_test_store();

        let id = store.insert("Tokyo", 35.6, 139.6).unwrap();
        assert!(id > 0);

        let records = store.list_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].city_name, "Tokyo");
        assert_eq!(records[0].latitude, 35.6);
        assert_eq!(records[0].longitude, 139.6);
    }

    #[test]
    fn test_list_in_insertion_order() {
        let store = create_test_store();

        store.insert("Tokyo", 35.6, 139.6).unwrap();
        store.insert("Paris", 48.8, 2.3).unwrap();
        store.insert("Lima", -12.0, -77.0).unwrap();

        let names: Vec<_> = store
            .list_all()
            .unwrap()
            .into_iter()
            .map(|r| r.city_name)
            .collect();
        assert_eq!(names, vec!["Tokyo", "Paris", "Lima"]);
    }

    #[test]
    fn test_insert_is_unconditional() {
        let store = create_test_store();

        for i in 0..6 {
            store.insert(&format!("City {}", i), 0.0, 0.0).unwrap();
        }
        assert_eq!(store.count().unwrap(), 6);
    }

    #[test]
    fn test_duplicate_names_are_kept() {
        let store = create_test_store();

        let a = store.insert("Springfield", 39.8, -89.6).unwrap();
        let b = store.insert("Springfield", 37.2, -93.3).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_delete() {
        let store = create_test_store();

        let id = store.insert("Tokyo", 35.6, 139.6).unwrap();
        store.delete_by_id(id).unwrap();
        assert!(store.list_all().unwrap().iter().all(|r| r.id != id));
    }

    #[test]
    fn test_delete_nonexistent_is_noop() {
        let store = create_test_store();

        store.insert("Tokyo", 35.6, 139.6).unwrap();
        store.delete_by_id(99999).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_delete_twice_same_as_once() {
        let store = create_test_store();

        let id = store.insert("Tokyo", 35.6, 139.6).unwrap();
        store.insert("Paris", 48.8, 2.3).unwrap();
        store.delete_by_id(id).unwrap();
        store.delete_by_id(id).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let store = create_test_store();

        let first = store.insert("Tokyo", 35.6, 139.6).unwrap();
        store.delete_by_id(first).unwrap();
        let second = store.insert("Osaka", 34.7, 135.5).unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let store = create_test_store();

        store.insert("Tokyo", 35.6, 139.6).unwrap();
        store.initialize().unwrap();
        store.initialize().unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_reopen_preserves_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("locations.db");

        {
            let store = SqliteLocationStore::open(&path).unwrap();
            store.insert("Tokyo", 35.6, 139.6).unwrap();
        }

        let store = SqliteLocationStore::open(&path).unwrap();
        let records = store.list_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].city_name, "Tokyo");
    }

    #[test]
    fn test_open_unusable_path_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a database file
        let result = SqliteLocationStore::open(dir.path());
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
