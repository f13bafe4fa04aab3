//! Location storage backend trait and error types.
//!
//! This module defines the `LocationStore` trait implemented by the SQLite
//! store, plus the record type shared by every layer above it.

use fourcast_weather::Coordinate;
use serde::Serialize;
use thiserror::Error;

/// Store-assigned record identity
pub type LocationId = i64;

/// A saved location.
///
/// The coordinate is fixed at insertion; moving a location means inserting
/// a new record and deleting the old one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationRecord {
    pub id: LocationId,
    pub city_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl LocationRecord {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Errors that can occur during location store operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Backing medium could not be opened or the schema could not be created.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage read failed: {0}")]
    Read(String),

    #[error("Storage write failed: {0}")]
    Write(String),
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn read(message: impl Into<String>) -> Self {
        Self::Read(message.into())
    }

    pub fn write(message: impl Into<String>) -> Self {
        Self::Write(message.into())
    }
}

/// Result type for location store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for durable location storage.
///
/// The store knows nothing about the capacity limit; `insert` is
/// unconditional at this layer.
///
/// Note: Implementations don't need to be Sync - the LocationTable wrapper
/// handles thread-safe access via Mutex.
pub trait LocationStore: Send {
    /// Ensure the schema exists. Safe to call on every start.
    ///
    /// # Errors
    /// Returns `StoreError::Unavailable` if the schema cannot be created.
    fn initialize(&self) -> StoreResult<()>;

    /// Append a record and return its newly assigned id.
    ///
    /// # Errors
    /// Returns `StoreError::Write` on medium failure.
    fn insert(&self, city_name: &str, latitude: f64, longitude: f64) -> StoreResult<LocationId>;

    /// All records in insertion order.
    ///
    /// # Errors
    /// Returns `StoreError::Read` on medium failure.
    fn list_all(&self) -> StoreResult<Vec<LocationRecord>>;

    /// Remove a record. Deleting an unknown id is a no-op.
    ///
    /// # Errors
    /// Returns `StoreError::Write` on medium failure.
    fn delete_by_id(&self, id: LocationId) -> StoreResult<()>;

    /// Number of stored records.
    fn count(&self) -> StoreResult<usize> {
        Ok(self.list_all()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_coordinate() {
        let record = LocationRecord {
            id: 1,
            city_name: "Tokyo".to_string(),
            latitude: 35.6,
            longitude: 139.6,
        };
        assert_eq!(record.coordinate(), Coordinate::new(35.6, 139.6));
    }

    #[test]
    fn test_error_constructors() {
        assert!(matches!(StoreError::read("x"), StoreError::Read(_)));
        assert!(matches!(StoreError::write("x"), StoreError::Write(_)));
        assert!(StoreError::unavailable("locked").to_string().contains("locked"));
    }
}
