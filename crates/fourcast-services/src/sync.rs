//! Location synchronization service.
//!
//! Owns the capacity rule for saved locations and the in-memory cache of the
//! latest reading per location. The store decides which records exist; the
//! cache only decides which reading is newest. Views pull with
//! [`LocationSyncService::current_snapshot`] and are pushed a [`SyncEvent`]
//! after every successful mutation and every completed refresh batch.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fourcast_weather::{
    Coordinate, DeviceLocator, LocationError, LookupError, WeatherLookup, WeatherReading,
};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::SyncError;
use crate::location_backend::{LocationId, LocationRecord};
use crate::location_table::LocationTable;

/// Maximum number of saved locations
pub const DEFAULT_CAPACITY: usize = 4;
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Where a saved location's coordinate comes from during a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStrategy {
    /// Geocode the saved name again. A name that no longer resolves leaves
    /// the location without a fresh reading.
    #[default]
    ResolveByName,
    /// Reuse the coordinate captured at save time.
    StoredCoordinate,
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub capacity: usize,
    /// Upper bound for each individual lookup call
    pub lookup_timeout: Duration,
    pub refresh_strategy: RefreshStrategy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            refresh_strategy: RefreshStrategy::default(),
        }
    }
}

/// Lookup progress for one location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupPhase {
    #[default]
    Idle,
    FetchingCoordinate,
    CoordinateResolved,
    CoordinateNotFound,
    FetchingWeather,
    WeatherAvailable,
    LookupFailed,
}

impl LookupPhase {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::FetchingCoordinate | Self::FetchingWeather)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub query: String,
    pub coordinate: Coordinate,
    pub reading: WeatherReading,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SearchOutcome {
    Found(SearchResult),
    NotFound,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CurrentLocationOutcome {
    Weather {
        coordinate: Coordinate,
        reading: WeatherReading,
    },
    /// The user declined; the flow ends here.
    PermissionDenied,
}

/// Result of one refresh batch: every location that still exists, with
/// `None` where its lookup failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshBatch {
    pub readings: BTreeMap<LocationId, Option<WeatherReading>>,
    pub completed_at: DateTime<Utc>,
}

impl RefreshBatch {
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn failures(&self) -> usize {
        self.readings.values().filter(|r| r.is_none()).count()
    }
}

/// One row of the snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationView {
    pub record: LocationRecord,
    /// Last known good reading
    pub reading: Option<WeatherReading>,
    pub phase: LookupPhase,
}

impl LocationView {
    /// A reading is shown but the latest attempt did not replace it.
    pub fn is_stale(&self) -> bool {
        self.reading.is_some() && self.phase != LookupPhase::WeatherAvailable
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub locations: Vec<LocationView>,
    pub capacity: usize,
    pub last_refreshed: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.locations.len() >= self.capacity
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Saved { id: LocationId },
    Deleted { id: LocationId },
    Refreshed { locations: usize, failed: usize },
}

#[derive(Debug, Default)]
struct CacheState {
    readings: HashMap<LocationId, WeatherReading>,
    phases: HashMap<LocationId, LookupPhase>,
    last_batch: Option<RefreshBatch>,
}

impl CacheState {
    fn retain_live(&mut self, live: &HashSet<LocationId>) {
        self.readings.retain(|id, _| live.contains(id));
        self.phases.retain(|id, _| live.contains(id));
    }
}

pub struct LocationSyncService {
    table: LocationTable,
    lookup: Arc<dyn WeatherLookup>,
    options: SyncOptions,
    /// Serializes save/delete and the refresh merge step
    writer: Mutex<()>,
    /// Lets concurrent refresh requests share one batch
    refresh_gate: Mutex<()>,
    batches_published: AtomicU64,
    cache: Arc<RwLock<CacheState>>,
    events: broadcast::Sender<SyncEvent>,
}

impl LocationSyncService {
    pub fn new(table: LocationTable, lookup: Arc<dyn WeatherLookup>, options: SyncOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            table,
            lookup,
            options,
            writer: Mutex::new(()),
            refresh_gate: Mutex::new(()),
            batches_published: AtomicU64::new(0),
            cache: Arc::new(RwLock::new(CacheState::default())),
            events,
        }
    }

    /// Ensure the backing table exists. Safe to call on every start.
    pub async fn initialize(&self) -> Result<(), SyncError> {
        self.table.initialize().await?;
        let count = self.table.count().await?;
        tracing::info!(
            "Location store ready with {} of {} locations",
            count,
            self.options.capacity
        );
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.options.capacity
    }

    /// Receive a notification after every mutation and refresh batch.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Whether another location fits right now.
    pub async fn can_save(&self) -> Result<bool, SyncError> {
        Ok(self.table.count().await? < self.options.capacity)
    }

    /// Resolve a place and fetch its weather without touching the store.
    pub async fn search(&self, city_name: &str) -> Result<SearchOutcome, SyncError> {
        let query = validate_city_name(city_name)?;

        tracing::debug!(phase = ?LookupPhase::FetchingCoordinate, "Searching for '{}'", query);
        let coordinate = match self.bounded(self.lookup.resolve_place(query)).await? {
            Some(coordinate) => coordinate,
            None => {
                tracing::info!(phase = ?LookupPhase::CoordinateNotFound, "No match for '{}'", query);
                return Ok(SearchOutcome::NotFound);
            }
        };

        tracing::debug!(phase = ?LookupPhase::CoordinateResolved, "'{}' is at {}", query, coordinate);
        let reading = self
            .bounded(self.lookup.fetch_current_temperature(coordinate))
            .await?;

        Ok(SearchOutcome::Found(SearchResult {
            query: query.to_string(),
            coordinate,
            reading,
        }))
    }

    /// One-off reading for a transient coordinate.
    pub async fn weather_at(&self, coordinate: Coordinate) -> Result<WeatherReading, SyncError> {
        if !coordinate.is_valid() {
            return Err(SyncError::InvalidCoordinate(coordinate));
        }
        Ok(self
            .bounded(self.lookup.fetch_current_temperature(coordinate))
            .await?)
    }

    /// Weather at the device's position. A permission denial is reported as
    /// an outcome and is never retried.
    pub async fn current_location_weather(
        &self,
        locator: &dyn DeviceLocator,
    ) -> Result<CurrentLocationOutcome, SyncError> {
        let coordinate = match locator.current_position().await {
            Ok(coordinate) => coordinate,
            Err(LocationError::PermissionDenied) => {
                tracing::info!("Location permission denied; skipping current weather");
                return Ok(CurrentLocationOutcome::PermissionDenied);
            }
            Err(e) => return Err(SyncError::Location(e)),
        };

        let reading = self.weather_at(coordinate).await?;
        Ok(CurrentLocationOutcome::Weather {
            coordinate,
            reading,
        })
    }

    /// Persist a new location if capacity allows.
    ///
    /// # Errors
    /// `CapacityExceeded` is returned before any write is attempted.
    pub async fn save(&self, city_name: &str, coordinate: Coordinate) -> Result<LocationId, SyncError> {
        self.save_with_reading(city_name, coordinate, None).await
    }

    /// Save a search hit, keeping its reading as the location's first value.
    pub async fn save_search_result(&self, result: &SearchResult) -> Result<LocationId, SyncError> {
        self.save_with_reading(&result.query, result.coordinate, Some(result.reading))
            .await
    }

    async fn save_with_reading(
        &self,
        city_name: &str,
        coordinate: Coordinate,
        reading: Option<WeatherReading>,
    ) -> Result<LocationId, SyncError> {
        let city_name = validate_city_name(city_name)?;
        if !coordinate.is_valid() {
            return Err(SyncError::InvalidCoordinate(coordinate));
        }

        let _writer = self.writer.lock().await;

        let existing = self.table.list_all().await?;
        if existing.len() >= self.options.capacity {
            tracing::info!(
                "Rejected save of '{}': {} of {} locations in use",
                city_name,
                existing.len(),
                self.options.capacity
            );
            return Err(SyncError::CapacityExceeded {
                limit: self.options.capacity,
            });
        }

        let id = self
            .table
            .insert(city_name, coordinate.latitude, coordinate.longitude)
            .await?;

        if let Some(reading) = reading {
            let mut cache = self.cache.write();
            cache.readings.insert(id, reading);
            cache.phases.insert(id, LookupPhase::WeatherAvailable);
        }
        self.reconcile_after_write().await;

        tracing::info!("Saved '{}' at {} as location {}", city_name, coordinate, id);
        self.publish(SyncEvent::Saved { id });
        Ok(id)
    }

    /// Remove a location and its cached reading. Unknown ids are a no-op.
    pub async fn delete(&self, id: LocationId) -> Result<(), SyncError> {
        let _writer = self.writer.lock().await;

        self.table.delete_by_id(id).await?;
        {
            let mut cache = self.cache.write();
            cache.readings.remove(&id);
            cache.phases.remove(&id);
        }
        self.reconcile_after_write().await;

        tracing::info!("Deleted location {}", id);
        self.publish(SyncEvent::Deleted { id });
        Ok(())
    }

    /// Fetch a fresh reading for every saved location.
    ///
    /// Lookups run concurrently. One location's failure only leaves that
    /// entry `None`, and the batch is published once, after every lookup has
    /// settled. A caller arriving while a batch is running receives that
    /// batch instead of starting another, as long as it covers exactly the
    /// locations saved now; a location saved after the batch started gets a
    /// new batch. If `cancel` fires, the batch still runs to completion but
    /// its results are dropped. Dropping the returned future mid-batch aborts
    /// the lookups and restores the phases they overwrote.
    pub async fn refresh_all(&self, cancel: &CancellationToken) -> Result<RefreshBatch, SyncError> {
        let requested_at = self.batches_published.load(Ordering::Acquire);
        let _gate = self.refresh_gate.lock().await;

        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        let records = self.table.list_all().await?;

        if self.batches_published.load(Ordering::Acquire) > requested_at {
            let last_batch = self.cache.read().last_batch.clone();
            if let Some(batch) = last_batch.filter(|b| covers_exactly(b, &records)) {
                tracing::debug!("Refresh request satisfied by the batch that just completed");
                return Ok(batch);
            }
        }

        let in_flight_phase = match self.options.refresh_strategy {
            RefreshStrategy::ResolveByName => LookupPhase::FetchingCoordinate,
            RefreshStrategy::StoredCoordinate => LookupPhase::FetchingWeather,
        };
        let mut phases = InFlightPhases::mark(&self.cache, &records, in_flight_phase);

        tracing::debug!("Refreshing {} locations", records.len());
        let mut tasks = JoinSet::new();
        for record in records.iter().cloned() {
            let lookup = Arc::clone(&self.lookup);
            let strategy = self.options.refresh_strategy;
            let limit = self.options.lookup_timeout;
            let cache = Arc::clone(&self.cache);
            let active = phases.active();
            tasks.spawn(async move {
                let outcome =
                    refresh_one(lookup.as_ref(), &cache, &active, &record, strategy, limit).await;
                (record.id, outcome)
            });
        }

        let mut outcomes = HashMap::with_capacity(records.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, outcome)) => {
                    outcomes.insert(id, outcome);
                }
                Err(e) => tracing::warn!("Refresh task failed: {}", e),
            }
        }

        if cancel.is_cancelled() {
            tracing::info!("Refresh cancelled; discarding {} results", outcomes.len());
            return Err(SyncError::Cancelled);
        }

        let writer = self.writer.lock().await;
        let live: HashSet<LocationId> = match self.table.list_all().await {
            Ok(current) => current.into_iter().map(|r| r.id).collect(),
            Err(e) => return Err(e.into()),
        };

        let batch = {
            let mut cache = self.cache.write();
            let mut readings = BTreeMap::new();
            for record in &records {
                if !live.contains(&record.id) {
                    tracing::debug!("Location {} deleted during refresh", record.id);
                    continue;
                }
                let (phase, reading) = outcomes
                    .remove(&record.id)
                    .unwrap_or((LookupPhase::LookupFailed, None));
                if let Some(reading) = reading {
                    cache.readings.insert(record.id, reading);
                }
                cache.phases.insert(record.id, phase);
                readings.insert(record.id, reading);
            }
            cache.retain_live(&live);

            let batch = RefreshBatch {
                readings,
                completed_at: Utc::now(),
            };
            cache.last_batch = Some(batch.clone());
            batch
        };
        phases.disarm();
        self.batches_published.fetch_add(1, Ordering::AcqRel);
        drop(writer);

        tracing::info!(
            "Refreshed {} locations ({} failed)",
            batch.len(),
            batch.failures()
        );
        self.publish(SyncEvent::Refreshed {
            locations: batch.len(),
            failed: batch.failures(),
        });
        Ok(batch)
    }

    /// Saved locations with their last known readings. Never touches the network.
    pub async fn current_snapshot(&self) -> Result<Snapshot, SyncError> {
        let records = self.table.list_all().await?;

        let cache = self.cache.read();
        let locations = records
            .into_iter()
            .map(|record| LocationView {
                reading: cache.readings.get(&record.id).copied(),
                phase: cache.phases.get(&record.id).copied().unwrap_or_default(),
                record,
            })
            .collect();

        Ok(Snapshot {
            locations,
            capacity: self.options.capacity,
            last_refreshed: cache.last_batch.as_ref().map(|b| b.completed_at),
        })
    }

    /// Re-read the store after a write and drop cache entries for records
    /// that no longer exist.
    async fn reconcile_after_write(&self) {
        match self.table.list_all().await {
            Ok(records) => {
                let live: HashSet<LocationId> = records.iter().map(|r| r.id).collect();
                self.cache.write().retain_live(&live);
            }
            Err(e) => tracing::warn!("Could not re-read locations after write: {}", e),
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, LookupError>>,
    ) -> Result<T, LookupError> {
        bounded(self.options.lookup_timeout, call).await
    }

    fn publish(&self, event: SyncEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, LookupError>>,
) -> Result<T, LookupError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(LookupError::Timeout(limit)),
    }
}

fn covers_exactly(batch: &RefreshBatch, records: &[LocationRecord]) -> bool {
    batch.readings.len() == records.len()
        && records.iter().all(|r| batch.readings.contains_key(&r.id))
}

/// Phases a running batch has overwritten.
///
/// Dropping it puts the previous phases back, so a batch that is cancelled,
/// fails, or is itself dropped mid-flight leaves no location marked as in
/// flight. Entries removed in the meantime stay removed.
struct InFlightPhases {
    cache: Arc<RwLock<CacheState>>,
    previous: Option<HashMap<LocationId, Option<LookupPhase>>>,
    /// Cleared under the cache lock once the phases are restored, so a
    /// lookup task still winding down cannot mark them again.
    active: Arc<AtomicBool>,
}

impl InFlightPhases {
    fn mark(
        cache: &Arc<RwLock<CacheState>>,
        records: &[LocationRecord],
        phase: LookupPhase,
    ) -> Self {
        let previous = {
            let mut state = cache.write();
            records
                .iter()
                .map(|record| (record.id, state.phases.insert(record.id, phase)))
                .collect()
        };
        Self {
            cache: Arc::clone(cache),
            previous: Some(previous),
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    fn active(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.active)
    }

    /// Keep the phases written since `mark`.
    fn disarm(&mut self) {
        self.previous = None;
    }
}

impl Drop for InFlightPhases {
    fn drop(&mut self) {
        let Some(previous) = self.previous.take() else {
            return;
        };
        let mut cache = self.cache.write();
        self.active.store(false, Ordering::Release);
        for (id, phase) in previous {
            if !cache.phases.contains_key(&id) {
                continue;
            }
            match phase {
                Some(phase) => {
                    cache.phases.insert(id, phase);
                }
                None => {
                    cache.phases.remove(&id);
                }
            }
        }
    }
}

/// Advance an in-flight phase. Entries removed mid-batch stay removed.
fn mark_phase(cache: &RwLock<CacheState>, active: &AtomicBool, id: LocationId, phase: LookupPhase) {
    let mut cache = cache.write();
    if !active.load(Ordering::Acquire) {
        return;
    }
    if let Some(current) = cache.phases.get_mut(&id) {
        *current = phase;
    }
}

async fn refresh_one(
    lookup: &dyn WeatherLookup,
    cache: &RwLock<CacheState>,
    active: &AtomicBool,
    record: &LocationRecord,
    strategy: RefreshStrategy,
    limit: Duration,
) -> (LookupPhase, Option<WeatherReading>) {
    let coordinate = match strategy {
        RefreshStrategy::StoredCoordinate => record.coordinate(),
        RefreshStrategy::ResolveByName => {
            match bounded(limit, lookup.resolve_place(&record.city_name)).await {
                Ok(Some(coordinate)) => {
                    mark_phase(cache, active, record.id, LookupPhase::CoordinateResolved);
                    coordinate
                }
                Ok(None) => {
                    tracing::warn!("'{}' no longer resolves to a place", record.city_name);
                    return (LookupPhase::CoordinateNotFound, None);
                }
                Err(e) => {
                    tracing::warn!("Geocoding '{}' failed: {}", record.city_name, e);
                    return (LookupPhase::LookupFailed, None);
                }
            }
        }
    };

    mark_phase(cache, active, record.id, LookupPhase::FetchingWeather);
    match bounded(limit, lookup.fetch_current_temperature(coordinate)).await {
        Ok(reading) => (LookupPhase::WeatherAvailable, Some(reading)),
        Err(e) => {
            tracing::warn!("Weather for '{}' failed: {}", record.city_name, e);
            (LookupPhase::LookupFailed, None)
        }
    }
}

fn validate_city_name(city_name: &str) -> Result<&str, SyncError> {
    let trimmed = city_name.trim();
    if trimmed.is_empty() {
        return Err(SyncError::InvalidCityName);
    }
    Ok(trimmed)
}
