//! Weather lookup client: place name to coordinate, coordinate to reading.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::geocode::{Geocoder, DEFAULT_GEOCODING_URL};
use crate::provider::{WeatherProvider, DEFAULT_FORECAST_URL};
use crate::types::{Coordinate, LookupError, TemperatureUnit, WeatherReading};

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("Fourcast/", env!("CARGO_PKG_VERSION"));

/// Stateless lookups against a geocoder and a weather provider.
///
/// Implementations must not touch any local state; both calls are plain
/// request/response and never retry on their own.
#[async_trait]
pub trait WeatherLookup: Send + Sync {
    /// Resolve a place name to its best-matching coordinate.
    ///
    /// `Ok(None)` is the normal "not found" outcome.
    async fn resolve_place(&self, name: &str) -> Result<Option<Coordinate>, LookupError>;

    /// Fetch the current temperature at a coordinate.
    async fn fetch_current_temperature(
        &self,
        coordinate: Coordinate,
    ) -> Result<WeatherReading, LookupError>;
}

/// Settings for [`OpenMeteoClient`]
#[derive(Debug, Clone)]
pub struct LookupOptions {
    pub geocoding_url: String,
    pub forecast_url: String,
    pub request_timeout: Duration,
    pub unit: TemperatureUnit,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            geocoding_url: DEFAULT_GEOCODING_URL.to_string(),
            forecast_url: DEFAULT_FORECAST_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            unit: TemperatureUnit::default(),
        }
    }
}

/// Open-Meteo backed [`WeatherLookup`].
///
/// One HTTP client with a bounded per-request timeout is shared by both
/// endpoints, so a hung call surfaces as a network timeout.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    geocoder: Geocoder,
    provider: WeatherProvider,
}

impl OpenMeteoClient {
    pub fn new(options: LookupOptions) -> Result<Self, LookupError> {
        let geocoding_url = Url::parse(&options.geocoding_url).map_err(|e| {
            LookupError::InvalidRequest(format!("geocoding url {}: {}", options.geocoding_url, e))
        })?;
        let forecast_url = Url::parse(&options.forecast_url).map_err(|e| {
            LookupError::InvalidRequest(format!("forecast url {}: {}", options.forecast_url, e))
        })?;

        let client = Client::builder()
            .timeout(options.request_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        tracing::debug!(
            "Weather lookups via {} and {} (timeout {:?})",
            geocoding_url,
            forecast_url,
            options.request_timeout
        );

        Ok(Self {
            geocoder: Geocoder::new(client.clone(), geocoding_url),
            provider: WeatherProvider::new(client, forecast_url, options.unit),
        })
    }

    pub fn unit(&self) -> TemperatureUnit {
        self.provider.unit()
    }
}

#[async_trait]
impl WeatherLookup for OpenMeteoClient {
    async fn resolve_place(&self, name: &str) -> Result<Option<Coordinate>, LookupError> {
        self.geocoder.resolve(name).await
    }

    async fn fetch_current_temperature(
        &self,
        coordinate: Coordinate,
    ) -> Result<WeatherReading, LookupError> {
        self.provider.current(coordinate).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_point_at_open_meteo() {
        let options = LookupOptions::default();
        assert!(options.geocoding_url.contains("geocoding-api.open-meteo.com"));
        assert!(options.forecast_url.contains("api.open-meteo.com"));
        assert_eq!(options.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let options = LookupOptions {
            forecast_url: "not a url".to_string(),
            ..LookupOptions::default()
        };
        assert!(matches!(
            OpenMeteoClient::new(options),
            Err(LookupError::InvalidRequest(_))
        ));
    }
}
