//! Builds the runtime pieces from the loaded configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use fourcast_core::{Config, LocationConfig, WeatherConfig};
use fourcast_services::{LocationSyncService, LocationTable, RefreshStrategy, SyncOptions};
use fourcast_weather::{
    Coordinate, DeniedLocator, DeviceLocator, FixedLocator, LookupOptions, OpenMeteoClient,
    TemperatureUnit,
};

pub fn lookup_options(weather: &WeatherConfig) -> LookupOptions {
    LookupOptions {
        geocoding_url: weather.geocoding_url.clone(),
        forecast_url: weather.forecast_url.clone(),
        request_timeout: Duration::from_secs(weather.request_timeout_secs),
        unit: match weather.temperature_unit {
            fourcast_core::TemperatureUnit::Celsius => TemperatureUnit::Celsius,
            fourcast_core::TemperatureUnit::Fahrenheit => TemperatureUnit::Fahrenheit,
        },
    }
}

pub fn sync_options(weather: &WeatherConfig) -> SyncOptions {
    SyncOptions {
        capacity: weather.max_locations,
        lookup_timeout: Duration::from_secs(weather.request_timeout_secs),
        refresh_strategy: match weather.refresh_strategy {
            fourcast_core::RefreshStrategy::ResolveByName => RefreshStrategy::ResolveByName,
            fourcast_core::RefreshStrategy::StoredCoordinate => RefreshStrategy::StoredCoordinate,
        },
    }
}

/// Device locator for the `here` command. Without a granted permission and a
/// configured position the user is treated as having declined.
pub fn locator(location: &LocationConfig) -> Box<dyn DeviceLocator> {
    match location.coordinate() {
        Some((latitude, longitude)) if location.permission_granted => {
            Box::new(FixedLocator::new(Coordinate::new(latitude, longitude)))
        }
        _ => Box::new(DeniedLocator),
    }
}

/// Open the store and wire up the sync service.
pub async fn build_service(config: &Config) -> Result<LocationSyncService> {
    let client = OpenMeteoClient::new(lookup_options(&config.weather))
        .context("Failed to create weather client")?;

    let table = LocationTable::open_sqlite(&config.storage.database_path)
        .await
        .with_context(|| {
            format!(
                "Failed to open location store at {}",
                config.storage.database_path.display()
            )
        })?;

    let service = LocationSyncService::new(table, Arc::new(client), sync_options(&config.weather));
    service
        .initialize()
        .await
        .context("Failed to initialize location store")?;
    Ok(service)
}
