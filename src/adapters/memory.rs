use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::domain::model::{FilterValue, Plant, ResultList};
use crate::domain::ports::{PlantRepository, PlantStream};
use crate::utils::error::{DataSequenceError, RefreshError, Result};
use crate::utils::validation::validate_non_empty_string;

#[derive(Debug, Clone, Default)]
struct LocalTable {
    rows: Vec<Plant>,
    broken: Option<DataSequenceError>,
}

/// Repository backed by memory: a remote catalog that refreshes copy into a
/// local table, and live queries over that table.
pub struct InMemoryPlantRepository {
    remote: Mutex<Vec<Plant>>,
    local: watch::Sender<LocalTable>,
    latency: Duration,
    failures: Mutex<HashMap<FilterValue, VecDeque<String>>>,
    refresh_log: Mutex<Vec<FilterValue>>,
}

impl InMemoryPlantRepository {
    pub fn new(catalog: Vec<Plant>) -> Self {
        let (local, _rx) = watch::channel(LocalTable::default());
        Self {
            remote: Mutex::new(catalog),
            local,
            latency: Duration::ZERO,
            failures: Mutex::new(HashMap::new()),
            refresh_log: Mutex::new(Vec::new()),
        }
    }

    /// Loads the remote catalog from a JSON array of plants.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let catalog: Vec<Plant> = serde_json::from_str(content)?;
        for plant in &catalog {
            validate_non_empty_string("plant.plant_id", &plant.plant_id)?;
            validate_non_empty_string("plant.name", &plant.name)?;
        }
        Ok(Self::new(catalog))
    }

    /// Simulated network latency applied to every refresh.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Makes the next refresh of `filter` fail with `message`. Queued
    /// failures are consumed one per refresh.
    pub fn fail_next_refresh(&self, filter: FilterValue, message: impl Into<String>) {
        self.failures
            .lock()
            .entry(filter)
            .or_default()
            .push_back(message.into());
    }

    /// Every live query emits `message` as a failure until restored.
    pub fn break_live_query(&self, message: impl Into<String>) {
        let error = DataSequenceError::unavailable(message);
        self.local.send_modify(|table| table.broken = Some(error));
    }

    pub fn restore_live_query(&self) {
        self.local.send_modify(|table| table.broken = None);
    }

    /// Writes a row straight into the local table, as another writer would.
    pub fn upsert_local(&self, plant: Plant) {
        self.local.send_modify(|table| upsert(&mut table.rows, plant));
    }

    pub fn upsert_remote(&self, plant: Plant) {
        upsert(&mut self.remote.lock(), plant);
    }

    pub fn local_rows(&self) -> Vec<Plant> {
        self.local.borrow().rows.clone()
    }

    pub fn refresh_calls(&self) -> Vec<FilterValue> {
        self.refresh_log.lock().clone()
    }

    fn observe(&self, filter: FilterValue) -> PlantStream {
        let rx = self.local.subscribe();
        futures::stream::unfold((rx, true), move |(mut rx, first)| async move {
            if !first && rx.changed().await.is_err() {
                return None;
            }
            let item = {
                let table = rx.borrow_and_update();
                match &table.broken {
                    Some(err) => Err(err.clone()),
                    None => Ok(select_rows(&table.rows, filter)),
                }
            };
            Some((item, (rx, false)))
        })
        .boxed()
    }

    async fn refresh(&self, filter: FilterValue) -> std::result::Result<(), RefreshError> {
        self.refresh_log.lock().push(filter);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let failure = self
            .failures
            .lock()
            .get_mut(&filter)
            .and_then(|queue| queue.pop_front());
        if let Some(message) = failure {
            return Err(RefreshError::remote(message));
        }

        let now = Utc::now();
        let fetched: Vec<Plant> = self
            .remote
            .lock()
            .iter()
            .filter(|plant| filter.matches(plant))
            .cloned()
            .map(|mut plant| {
                plant.refreshed_at = Some(now);
                plant
            })
            .collect();

        tracing::debug!(%filter, rows = fetched.len(), "copying remote rows into local table");
        self.local.send_modify(|table| {
            for plant in fetched {
                upsert(&mut table.rows, plant);
            }
        });
        Ok(())
    }
}

#[async_trait]
impl PlantRepository for InMemoryPlantRepository {
    fn observe_all(&self) -> PlantStream {
        self.observe(FilterValue::NoFilter)
    }

    fn observe_by_zone(&self, zone: u32) -> PlantStream {
        self.observe(FilterValue::Zone(zone))
    }

    async fn refresh_all(&self) -> std::result::Result<(), RefreshError> {
        self.refresh(FilterValue::NoFilter).await
    }

    async fn refresh_by_zone(&self, zone: u32) -> std::result::Result<(), RefreshError> {
        self.refresh(FilterValue::Zone(zone)).await
    }
}

fn upsert(rows: &mut Vec<Plant>, plant: Plant) {
    match rows.iter_mut().find(|row| row.plant_id == plant.plant_id) {
        Some(row) => *row = plant,
        None => rows.push(plant),
    }
}

fn select_rows(rows: &[Plant], filter: FilterValue) -> ResultList {
    let mut selected: Vec<Plant> = rows.iter().filter(|plant| filter.matches(plant)).cloned().collect();
    selected.sort_by(|a, b| a.name.cmp(&b.name));
    Arc::from(selected)
}

/// A small catalog for demos.
pub fn sample_catalog() -> Vec<Plant> {
    [
        ("malus-pumila", "Apple", 3, 30),
        ("beta-vulgaris", "Beet", 2, 7),
        ("coriandrum-sativum", "Cilantro", 2, 2),
        ("vitis-vinifera", "Grape", 9, 3),
        ("hibiscus-rosa-sinensis", "Hibiscus", 9, 1),
        ("mangifera-indica", "Mango", 11, 7),
        ("citrus-x-sinensis", "Orange", 9, 20),
        ("pyrus-communis", "Pear", 4, 30),
        ("helianthus-annuus", "Sunflower", 2, 3),
        ("solanum-lycopersicum", "Tomato", 9, 4),
    ]
    .into_iter()
    .map(|(id, name, zone, watering_interval)| Plant {
        watering_interval,
        ..Plant::new(id, name, zone)
    })
    .collect()
}
