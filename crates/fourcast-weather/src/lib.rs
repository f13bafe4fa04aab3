//! Weather lookups for Fourcast
//!
//! Resolves place names via the Open-Meteo geocoding API and fetches current
//! conditions from the Open-Meteo forecast API. Also defines the device
//! location abstraction used by the current-location view.

pub mod client;
pub mod geocode;
pub mod location;
pub mod provider;
pub mod types;

pub use client::{LookupOptions, OpenMeteoClient, WeatherLookup};
pub use location::{DeniedLocator, DeviceLocator, FixedLocator};
pub use types::*;
