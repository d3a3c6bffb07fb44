use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::core::filter_state::FilterState;
use crate::core::observable::{Observable, ObservableView};
use crate::core::query_switcher::{LatestQuerySwitcher, QueryResult};
use crate::core::refresh::{RefreshCoordinator, RefreshStatus, SameFilterPolicy};
use crate::core::scope::TaskScope;
use crate::domain::model::FilterValue;
use crate::domain::ports::PlantRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedOptions {
    pub same_filter_policy: SameFilterPolicy,
    pub refresh_timeout: Option<Duration>,
}

/// The object a plant list screen observes and drives.
///
/// Construction clears the filter and starts two tasks on a private
/// [`TaskScope`]: the live query switcher and the refresh coordinator. Both
/// stop on [`PlantListFacade::close`] or when the facade is dropped; after
/// that no observer callback fires again.
///
/// Must be created from within a tokio runtime.
pub struct PlantListFacade<R: PlantRepository + ?Sized> {
    repo: Arc<R>,
    filter: FilterState,
    results: Observable<QueryResult>,
    status: Arc<RefreshStatus>,
    scope: TaskScope,
    requested: AtomicU64,
}

impl<R: PlantRepository + ?Sized> PlantListFacade<R> {
    pub fn new(repo: Arc<R>, options: FeedOptions) -> Self {
        let filter = FilterState::new();
        filter.set(FilterValue::NoFilter);

        let scope = TaskScope::new();
        let results = Observable::new(QueryResult::pending());
        let status = Arc::new(RefreshStatus::new());

        let switcher = LatestQuerySwitcher::new(Arc::clone(&repo), results.clone());
        scope.spawn("live-query", switcher.run(filter.subscribe()));

        let coordinator = RefreshCoordinator::new(Arc::clone(&repo), Arc::clone(&status), scope.clone())
            .with_policy(options.same_filter_policy)
            .with_timeout(options.refresh_timeout);
        scope.spawn("refresh-coordinator", coordinator.run(filter.subscribe()));

        tracing::info!(
            policy = ?options.same_filter_policy,
            timeout = ?options.refresh_timeout,
            "plant list feed started"
        );

        Self {
            repo,
            filter,
            results,
            status,
            scope,
            requested: AtomicU64::new(0),
        }
    }

    pub fn set_filter(&self, value: FilterValue) {
        if self.scope.is_cancelled() {
            tracing::debug!(filter = %value, "set_filter after close ignored");
            return;
        }
        self.requested.fetch_add(1, Ordering::AcqRel);
        self.filter.set(value);
    }

    pub fn clear_filter(&self) {
        self.set_filter(FilterValue::NoFilter);
    }

    pub fn is_filtered(&self) -> bool {
        self.filter.current().is_filtered()
    }

    pub fn current_filter(&self) -> FilterValue {
        self.filter.current()
    }

    pub fn results(&self) -> ObservableView<QueryResult> {
        self.results.view()
    }

    pub fn loading(&self) -> ObservableView<bool> {
        self.status.loading()
    }

    pub fn error_notice(&self) -> ObservableView<Option<String>> {
        self.status.error_notice()
    }

    pub fn acknowledge_error(&self) {
        self.status.acknowledge_error();
    }

    pub fn sessions_started(&self) -> u64 {
        self.status.sessions_started()
    }

    /// The repository this feed reads from and refreshes.
    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// Resolves once the coordinator has seen every filter set so far and
    /// the winning session has finished. Returns early if the facade closes.
    pub async fn wait_until_idle(&self) {
        // The initial value counts as one delivery.
        let target = self.requested.load(Ordering::Acquire) + 1;
        let mut handled = self.status.handled().watch();
        let mut loading = self.status.loading().watch();

        tokio::select! {
            _ = self.scope.cancelled() => {}
            _ = async {
                if handled.wait_for(|n| *n >= target).await.is_ok() {
                    let _ = loading.wait_for(|busy| !*busy).await;
                }
            } => {}
        }
    }

    /// Cancels every task and waits for them to stop. Idempotent.
    pub async fn close(&self) {
        self.shutdown();
        self.scope.join().await;
        tracing::info!("plant list feed closed");
    }

    pub fn is_closed(&self) -> bool {
        self.scope.is_cancelled()
    }

    fn shutdown(&self) {
        self.scope.cancel();
        self.filter.close();
        self.results.close();
        self.status.close();
    }
}

impl<R: PlantRepository + ?Sized> Drop for PlantListFacade<R> {
    fn drop(&mut self) {
        if !self.scope.is_cancelled() {
            tracing::debug!("plant list feed dropped without close");
        }
        self.shutdown();
    }
}
