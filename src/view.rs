//! Text rendering of snapshots and the live saved-list view.

use std::fmt::Write as _;
use std::sync::Arc;

use fourcast_services::{
    LocationId, LocationSyncService, LocationView, LookupPhase, Snapshot, SyncError, SyncEvent,
};
use fourcast_weather::WeatherReading;
use tokio::sync::broadcast::{self, error::RecvError};

const NO_READING: &str = "--";

/// One rendered line of the saved list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: LocationId,
    pub name: String,
    pub temperature: String,
    pub condition: String,
    pub status: &'static str,
}

impl Row {
    pub fn from_view(view: &LocationView) -> Self {
        Self {
            id: view.record.id,
            name: view.record.city_name.clone(),
            temperature: temperature_text(view.reading.as_ref()),
            condition: view
                .reading
                .map(|r| r.condition.description().to_string())
                .unwrap_or_default(),
            status: status_text(view),
        }
    }
}

pub fn temperature_text(reading: Option<&WeatherReading>) -> String {
    reading
        .map(WeatherReading::display_temperature)
        .unwrap_or_else(|| NO_READING.to_string())
}

fn status_text(view: &LocationView) -> &'static str {
    match view.phase {
        phase if phase.is_in_flight() => "updating",
        LookupPhase::CoordinateNotFound => "place not found",
        LookupPhase::LookupFailed if view.reading.is_some() => "stale",
        LookupPhase::LookupFailed => "unavailable",
        _ => "",
    }
}

pub fn rows(snapshot: &Snapshot) -> Vec<Row> {
    snapshot.locations.iter().map(Row::from_view).collect()
}

pub fn render(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Saved locations ({}/{})",
        snapshot.len(),
        snapshot.capacity
    );

    if snapshot.is_empty() {
        let _ = writeln!(out, "  (none)  add one with `fourcast search <city> --save`");
        return out;
    }

    for row in rows(snapshot) {
        let _ = write!(out, "  [{:>3}] {:<24} {:>8}", row.id, row.name, row.temperature);
        if !row.condition.is_empty() {
            let _ = write!(out, "  {}", row.condition);
        }
        if !row.status.is_empty() {
            let _ = write!(out, "  ({})", row.status);
        }
        out.push('\n');
    }

    if let Some(at) = snapshot.last_refreshed {
        let _ = writeln!(out, "Last refreshed {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if snapshot.is_full() {
        let _ = writeln!(out, "Location limit reached. Delete one to add another.");
    }
    out
}

/// Re-renders the saved list whenever the service publishes a change.
pub struct SavedListView {
    service: Arc<LocationSyncService>,
    events: broadcast::Receiver<SyncEvent>,
}

impl SavedListView {
    pub fn new(service: Arc<LocationSyncService>) -> Self {
        let events = service.subscribe();
        Self { service, events }
    }

    /// Wait for the next change and return the freshly rendered list.
    ///
    /// Returns `None` once the service is gone.
    pub async fn next_frame(&mut self) -> Result<Option<String>, SyncError> {
        match self.events.recv().await {
            Ok(event) => tracing::debug!("Saved list changed: {:?}", event),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Saved list skipped {} events", skipped);
            }
            Err(RecvError::Closed) => return Ok(None),
        }

        let snapshot = self.service.current_snapshot().await?;
        Ok(Some(render(&snapshot)))
    }
}
