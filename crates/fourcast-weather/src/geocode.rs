//! Forward geocoding: convert a free-text place name to a coordinate.
//! Uses the Open-Meteo geocoding API - free, no API key required.

use crate::types::{Coordinate, LookupError};
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;
use url::Url;

pub const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    /// Absent entirely when nothing matched
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    latitude: f64,
    longitude: f64,
    #[allow(dead_code)]
    name: Option<String>,
}

/// Geocoder client bound to one search endpoint
#[derive(Debug, Clone)]
pub struct Geocoder {
    client: Client,
    endpoint: Url,
}

impl Geocoder {
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    /// Resolve `name` to the best-matching coordinate.
    ///
    /// Returns `Ok(None)` when the service has no match; only transport,
    /// status and decoding problems are errors.
    #[instrument(skip(self), level = "debug")]
    pub async fn resolve(&self, name: &str) -> Result<Option<Coordinate>, LookupError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("name", name)
            .append_pair("count", "1");

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            tracing::debug!("Geocoding returned status {}", response.status());
            return Err(LookupError::Status {
                service: "geocoder",
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        let parsed: GeocodingResponse =
            serde_json::from_str(&body).map_err(|e| LookupError::Parse(e.to_string()))?;

        let found = parsed
            .results
            .into_iter()
            .next()
            .map(|r| Coordinate::new(r.latitude, r.longitude));

        match &found {
            Some(coordinate) => tracing::debug!("Resolved '{}' to {}", name, coordinate),
            None => tracing::debug!("No geocoding match for '{}'", name),
        }

        Ok(found)
    }
}
