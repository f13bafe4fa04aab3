//! End-to-end tests for LocationSyncService against an on-disk SQLite store
//! and a mock Open-Meteo server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use fourcast_services::{
    LocationSyncService, LocationTable, LookupPhase, SearchOutcome, SyncError, SyncEvent,
    SyncOptions,
};
use fourcast_weather::{Coordinate, LookupOptions, OpenMeteoClient, TemperatureUnit};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn service_for(server: &MockServer, db: &Path) -> LocationSyncService {
    let client = OpenMeteoClient::new(LookupOptions {
        geocoding_url: format!("{}/v1/search", server.uri()),
        forecast_url: format!("{}/v1/forecast", server.uri()),
        request_timeout: Duration::from_secs(2),
        unit: TemperatureUnit::Celsius,
    })
    .unwrap();

    let table = LocationTable::open_sqlite(db).await.unwrap();
    let service = LocationSyncService::new(table, Arc::new(client), SyncOptions::default());
    service.initialize().await.unwrap();
    service
}

async fn mount_place(server: &MockServer, name: &str, latitude: f64, longitude: f64) {
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("name", name))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{ "name": name, "latitude": latitude, "longitude": longitude }]
        })))
        .mount(server)
        .await;
}

async fn mount_weather(server: &MockServer, latitude: &str, temperature: f64) {
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("latitude", latitude))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "current_weather": { "temperature": temperature, "weathercode": 1 }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_search_save_refresh_flow() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_place(&server, "Tokyo", 35.6, 139.6).await;
    mount_weather(&server, "35.6", 21.4).await;

    let service = service_for(&server, &dir.path().join("locations.db")).await;
    let mut events = service.subscribe();

    let SearchOutcome::Found(result) = service.search("Tokyo").await.unwrap() else {
        panic!("Tokyo should resolve");
    };
    assert_eq!(result.reading.temperature, 21.4);

    let id = service.save_search_result(&result).await.unwrap();
    assert_eq!(events.recv().await.unwrap(), SyncEvent::Saved { id });

    let batch = service.refresh_all(&CancellationToken::new()).await.unwrap();
    assert_eq!(batch.readings[&id].map(|r| r.temperature), Some(21.4));
    assert_eq!(
        events.recv().await.unwrap(),
        SyncEvent::Refreshed {
            locations: 1,
            failed: 0
        }
    );

    let snapshot = service.current_snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.locations[0].record.city_name, "Tokyo");
    assert_eq!(snapshot.locations[0].phase, LookupPhase::WeatherAvailable);
}

#[tokio::test]
async fn test_search_not_found_makes_no_forecast_request() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let service = service_for(&server, &dir.path().join("locations.db")).await;
    let outcome = service.search("Nowhereville12345").await.unwrap();

    assert_eq!(outcome, SearchOutcome::NotFound);
}

#[tokio::test]
async fn test_geocoder_outage_is_not_a_miss() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let service = service_for(&server, &dir.path().join("locations.db")).await;
    let result = service.search("Tokyo").await;

    assert!(matches!(result, Err(SyncError::LookupUnavailable(_))));
}

#[tokio::test]
async fn test_refresh_with_one_failing_location() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_place(&server, "Tokyo", 35.6, 139.6).await;
    mount_place(&server, "Paris", 48.8, 2.3).await;
    mount_place(&server, "Lima", -12.0, -77.0).await;
    mount_weather(&server, "35.6", 21.4).await;
    mount_weather(&server, "-12", 18.0).await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("latitude", "48.8"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let service = service_for(&server, &dir.path().join("locations.db")).await;
    let tokyo = service.save("Tokyo", Coordinate::new(35.6, 139.6)).await.unwrap();
    let paris = service.save("Paris", Coordinate::new(48.8, 2.3)).await.unwrap();
    let lima = service.save("Lima", Coordinate::new(-12.0, -77.0)).await.unwrap();

    let batch = service.refresh_all(&CancellationToken::new()).await.unwrap();

    assert_eq!(batch.len(), 3);
    assert_eq!(batch.failures(), 1);
    assert!(batch.readings[&tokyo].is_some());
    assert!(batch.readings[&paris].is_none());
    assert!(batch.readings[&lima].is_some());
}

#[tokio::test]
async fn test_capacity_survives_restart() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("locations.db");

    {
        let service = service_for(&server, &db).await;
        for (i, name) in ["Tokyo", "Paris", "Lima", "Oslo"].iter().enumerate() {
            service
                .save(name, Coordinate::new(i as f64, i as f64))
                .await
                .unwrap();
        }
    }

    let service = service_for(&server, &db).await;
    let snapshot = service.current_snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 4);
    assert!(snapshot.locations.iter().all(|v| v.reading.is_none()));

    let result = service.save("Cairo", Coordinate::new(30.0, 31.2)).await;
    assert!(matches!(result, Err(SyncError::CapacityExceeded { limit: 4 })));
    assert_eq!(service.current_snapshot().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_unreachable_store_reports_unavailable() {
    let dir = tempfile::tempdir().unwrap();

    // A directory cannot be opened as a database file
    let result = LocationTable::open_sqlite(dir.path()).await;

    assert!(matches!(
        result,
        Err(fourcast_services::StoreError::Unavailable(_))
    ));
}
