pub mod error;
pub mod location_backend;
pub mod location_store;
pub mod location_table;
pub mod sync;

pub use error::SyncError;
pub use location_backend::{LocationId, LocationRecord, LocationStore, StoreError, StoreResult};
pub use location_store::SqliteLocationStore;
pub use location_table::LocationTable;
pub use sync::*;
