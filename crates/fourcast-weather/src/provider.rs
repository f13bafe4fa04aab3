//! Current-conditions lookup against the Open-Meteo forecast API.

use crate::types::{Coordinate, LookupError, TemperatureUnit, WeatherCondition, WeatherReading};
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;
use url::Url;

pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current_weather: CurrentWeatherPayload,
}

#[derive(Debug, Deserialize)]
struct CurrentWeatherPayload {
    temperature: f64,
    #[serde(default)]
    weathercode: i32,
}

#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Client,
    endpoint: Url,
    unit: TemperatureUnit,
}

impl WeatherProvider {
    pub fn new(client: Client, endpoint: Url, unit: TemperatureUnit) -> Self {
        Self {
            client,
            endpoint,
            unit,
        }
    }

    pub fn unit(&self) -> TemperatureUnit {
        self.unit
    }

    /// Fetch the instantaneous reading at `coordinate`. No retry is attempted.
    #[instrument(skip(self), level = "debug")]
    pub async fn current(&self, coordinate: Coordinate) -> Result<WeatherReading, LookupError> {
        if !coordinate.is_valid() {
            return Err(LookupError::InvalidRequest(format!(
                "coordinate out of range: {}",
                coordinate
            )));
        }

        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("latitude", &coordinate.latitude.to_string())
                .append_pair("longitude", &coordinate.longitude.to_string())
                .append_pair("current_weather", "true");
            if self.unit != TemperatureUnit::Celsius {
                query.append_pair("temperature_unit", self.unit.query_value());
            }
        }

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            tracing::debug!("Forecast returned status {}", response.status());
            return Err(LookupError::Status {
                service: "weather provider",
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        let parsed: ForecastResponse =
            serde_json::from_str(&body).map_err(|e| LookupError::Parse(e.to_string()))?;

        Ok(WeatherReading {
            temperature: parsed.current_weather.temperature,
            unit: self.unit,
            condition: WeatherCondition::from_wmo_code(parsed.current_weather.weathercode),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_parse_current_weather() {
        let parsed: ForecastResponse = serde_json::from_str(
            r#"{"latitude": 35.7, "longitude": 139.7, "current_weather": {"temperature": 18.2, "windspeed": 4.1, "weathercode": 3}}"#,
        )
        .unwrap();
        assert_eq!(parsed.current_weather.temperature, 18.2);
        assert_eq!(parsed.current_weather.weathercode, 3);
    }

    #[test]
    fn test_missing_current_weather_is_parse_error() {
        let parsed = serde_json::from_str::<ForecastResponse>(r#"{"latitude": 35.7}"#);
        assert!(parsed.is_err());
    }

    #[tokio::test]
    async fn test_invalid_coordinate_rejected_before_request() {
        let provider = WeatherProvider::new(
            Client::new(),
            Url::parse("http://127.0.0.1:9/v1/forecast").unwrap(),
            TemperatureUnit::Celsius,
        );
        let result = provider.current(Coordinate::new(120.0, 0.0)).await;
        assert!(matches!(result, Err(LookupError::InvalidRequest(_))));
    }
}
