//! Synchronization service error types.

use fourcast_weather::{Coordinate, LocationError, LookupError};
use thiserror::Error;

use crate::location_backend::StoreError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("Weather lookup unavailable: {0}")]
    LookupUnavailable(#[from] LookupError),

    #[error("Location limit of {limit} reached")]
    CapacityExceeded { limit: usize },

    #[error("City name cannot be empty")]
    InvalidCityName,

    #[error("Coordinate out of range: {0}")]
    InvalidCoordinate(Coordinate),

    #[error("Device location failed: {0}")]
    Location(LocationError),

    #[error("Refresh cancelled")]
    Cancelled,
}

impl SyncError {
    /// User-friendly error message for display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Storage(StoreError::Unavailable(_)) => {
                "Saved locations are unavailable. Try again.".to_string()
            }
            Self::Storage(StoreError::Read(_)) => {
                "Couldn't load saved locations. Try again.".to_string()
            }
            Self::Storage(StoreError::Write(_)) => {
                "Couldn't update saved locations. Try again.".to_string()
            }
            Self::LookupUnavailable(_) => {
                "Weather service unreachable. Check your connection and try again.".to_string()
            }
            Self::CapacityExceeded { limit } => {
                format!("Already tracking {} locations. Delete one first.", limit)
            }
            Self::InvalidCityName => "Enter a city name.".to_string(),
            Self::InvalidCoordinate(c) => format!("Invalid coordinate: {}", c),
            Self::Location(_) => "Couldn't determine your location.".to_string(),
            Self::Cancelled => "Refresh cancelled.".to_string(),
        }
    }

    /// Whether repeating the same call might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::LookupUnavailable(_) | Self::Location(_) | Self::Cancelled
        )
    }
}
