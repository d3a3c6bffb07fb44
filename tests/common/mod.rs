#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use zone_feed::{FilterValue, ObservableView, Plant, PlantRepository, PlantStream, RefreshError, ResultList};

pub const WAIT: Duration = Duration::from_secs(2);

type Gate = oneshot::Sender<Result<(), RefreshError>>;

/// Repository whose refreshes block until the test completes them.
pub struct GatedRepository {
    tables: watch::Sender<HashMap<FilterValue, ResultList>>,
    gates: Mutex<HashMap<FilterValue, VecDeque<Gate>>>,
    calls: watch::Sender<Vec<FilterValue>>,
}

impl GatedRepository {
    pub fn new() -> Arc<Self> {
        let (tables, _) = watch::channel(HashMap::new());
        let (calls, _) = watch::channel(Vec::new());
        Arc::new(Self {
            tables,
            gates: Mutex::new(HashMap::new()),
            calls,
        })
    }

    /// Replaces the rows the live query for `filter` reports.
    pub fn set_rows(&self, filter: FilterValue, names: &[&str]) {
        let zone = filter.zone().unwrap_or(0);
        let rows: Vec<Plant> = names
            .iter()
            .map(|name| Plant::new(&name.to_lowercase(), name, zone))
            .collect();
        self.tables.send_modify(|tables| {
            tables.insert(filter, Arc::from(rows));
        });
    }

    /// Resolves the oldest live refresh of `filter`. Returns false when no
    /// refresh of `filter` is waiting, e.g. because it was cancelled.
    pub fn complete(&self, filter: FilterValue, result: Result<(), RefreshError>) -> bool {
        let mut gates = self.gates.lock();
        let Some(queue) = gates.get_mut(&filter) else {
            return false;
        };
        queue.retain(|gate| !gate.is_closed());
        match queue.pop_front() {
            Some(gate) => gate.send(result).is_ok(),
            None => false,
        }
    }

    pub fn calls(&self) -> Vec<FilterValue> {
        self.calls.borrow().clone()
    }

    pub async fn wait_for_call(&self, filter: FilterValue) {
        let mut rx = self.calls.subscribe();
        tokio::time::timeout(WAIT, rx.wait_for(|calls| calls.contains(&filter)))
            .await
            .unwrap_or_else(|_| panic!("no refresh for {} was started", filter))
            .expect("calls channel closed");
    }

    fn observe(&self, filter: FilterValue) -> PlantStream {
        let rx = self.tables.subscribe();
        futures::stream::unfold((rx, true), move |(mut rx, first)| async move {
            if !first && rx.changed().await.is_err() {
                return None;
            }
            let rows = rx
                .borrow_and_update()
                .get(&filter)
                .cloned()
                .unwrap_or_else(|| Arc::from(Vec::new()));
            Some((Ok(rows), (rx, false)))
        })
        .boxed()
    }

    async fn refresh(&self, filter: FilterValue) -> Result<(), RefreshError> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().entry(filter).or_default().push_back(tx);
        self.calls.send_modify(|calls| calls.push(filter));
        rx.await
            .unwrap_or_else(|_| Err(RefreshError::remote("gate dropped")))
    }
}

#[async_trait]
impl PlantRepository for GatedRepository {
    fn observe_all(&self) -> PlantStream {
        self.observe(FilterValue::NoFilter)
    }

    fn observe_by_zone(&self, zone: u32) -> PlantStream {
        self.observe(FilterValue::Zone(zone))
    }

    async fn refresh_all(&self) -> Result<(), RefreshError> {
        self.refresh(FilterValue::NoFilter).await
    }

    async fn refresh_by_zone(&self, zone: u32) -> Result<(), RefreshError> {
        self.refresh(FilterValue::Zone(zone)).await
    }
}

/// Waits until `view` holds a value matching `predicate` and returns it.
pub async fn wait_until<T, F>(view: &ObservableView<T>, predicate: F) -> T
where
    T: Clone + Send + Sync + 'static,
    F: FnMut(&T) -> bool,
{
    let mut rx = view.watch();
    let value = tokio::time::timeout(WAIT, rx.wait_for(predicate))
        .await
        .expect("observable did not reach the expected value")
        .expect("observable sender dropped");
    value.clone()
}

/// Gives spawned tasks a chance to run on the current-thread runtime.
pub async fn let_tasks_run() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
