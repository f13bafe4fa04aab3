//! Maps service errors onto the application error hierarchy for display.

use fourcast_core::{AppError, DatabaseError, NetworkError, ReqwestErrorExt, WeatherError};
use fourcast_services::{StoreError, SyncError};
use fourcast_weather::{LocationError, LookupError};

pub fn to_app_error(err: SyncError) -> AppError {
    match err {
        SyncError::Storage(StoreError::Unavailable(m)) => DatabaseError::ConnectionFailed(m).into(),
        SyncError::Storage(StoreError::Read(m)) => DatabaseError::ReadFailed(m).into(),
        SyncError::Storage(StoreError::Write(m)) => DatabaseError::WriteFailed(m).into(),
        SyncError::LookupUnavailable(e) => lookup_error(e),
        SyncError::CapacityExceeded { limit } => AppError::Capacity { limit },
        SyncError::InvalidCityName => AppError::InvalidInput("city name is empty".to_string()),
        SyncError::InvalidCoordinate(c) => {
            AppError::InvalidInput(format!("coordinate out of range: {}", c))
        }
        SyncError::Location(LocationError::PermissionDenied) => WeatherError::PermissionDenied.into(),
        SyncError::Location(LocationError::ServiceUnavailable) => {
            WeatherError::ServiceUnavailable.into()
        }
        SyncError::Location(LocationError::Other(m)) => WeatherError::ApiError(m).into(),
        SyncError::Cancelled => WeatherError::Cancelled.into(),
    }
}

fn lookup_error(err: LookupError) -> AppError {
    match err {
        LookupError::Network(e) => e.into_network_error().into(),
        LookupError::Timeout(_) => NetworkError::Timeout.into(),
        LookupError::Status { service, status } => NetworkError::ServerError {
            status,
            message: format!("{} returned {}", service, status),
        }
        .into(),
        LookupError::Parse(m) => NetworkError::InvalidResponse(m).into(),
        LookupError::InvalidRequest(m) => WeatherError::ApiError(m).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_capacity_maps_to_capacity() {
        let app = to_app_error(SyncError::CapacityExceeded { limit: 4 });
        assert!(matches!(app, AppError::Capacity { limit: 4 }));
        assert!(app.user_message().contains("Delete one"));
    }

    #[test]
    fn test_store_errors_map_to_database() {
        assert!(matches!(
            to_app_error(SyncError::Storage(StoreError::write("disk full"))),
            AppError::Database(DatabaseError::WriteFailed(_))
        ));
        assert!(matches!(
            to_app_error(SyncError::Storage(StoreError::unavailable("locked"))),
            AppError::Database(DatabaseError::ConnectionFailed(_))
        ));
    }

    #[test]
    fn test_lookup_errors_map_to_network() {
        let timeout = SyncError::LookupUnavailable(LookupError::Timeout(Duration::from_secs(10)));
        assert!(matches!(
            to_app_error(timeout),
            AppError::Network(NetworkError::Timeout)
        ));

        let status = SyncError::LookupUnavailable(LookupError::Status {
            service: "geocoder",
            status: 503,
        });
        assert!(matches!(
            to_app_error(status),
            AppError::Network(NetworkError::ServerError { status: 503, .. })
        ));
    }

    #[test]
    fn test_cancel_and_permission_map_to_weather() {
        assert!(matches!(
            to_app_error(SyncError::Cancelled),
            AppError::Weather(WeatherError::Cancelled)
        ));
        assert!(matches!(
            to_app_error(SyncError::Location(LocationError::PermissionDenied)),
            AppError::Weather(WeatherError::PermissionDenied)
        ));
    }
}
