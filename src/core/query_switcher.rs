use std::sync::Arc;

use futures::{future, Stream, StreamExt};

use crate::core::filter_state::FilterChanges;
use crate::core::observable::Observable;
use crate::core::switch_latest::switch_latest;
use crate::domain::model::{empty_result_list, FilterValue, ResultList};
use crate::domain::ports::{observe_filter, PlantRepository};
use crate::utils::error::DataSequenceError;

/// One emission of the live query, tagged with the filter it was produced for.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// `None` until the first live query has emitted.
    pub filter: Option<FilterValue>,
    pub plants: std::result::Result<ResultList, DataSequenceError>,
}

impl QueryResult {
    pub fn pending() -> Self {
        Self {
            filter: None,
            plants: Ok(empty_result_list()),
        }
    }

    pub fn is_for(&self, filter: FilterValue) -> bool {
        self.filter == Some(filter)
    }

    /// Plant names in emission order; empty on failure.
    pub fn names(&self) -> Vec<String> {
        match &self.plants {
            Ok(plants) => plants.iter().map(|p| p.name.clone()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Keeps `results` bound to the live query of the newest filter.
pub struct LatestQuerySwitcher<R: ?Sized> {
    repo: Arc<R>,
    results: Observable<QueryResult>,
}

impl<R: PlantRepository + ?Sized> LatestQuerySwitcher<R> {
    pub fn new(repo: Arc<R>, results: Observable<QueryResult>) -> Self {
        Self { repo, results }
    }

    /// Items of the live query for the newest value of `filters`. Adjacent
    /// duplicate filters keep the current subscription.
    pub fn query_stream<S>(&self, filters: S) -> impl Stream<Item = QueryResult> + Send + 'static
    where
        S: Stream<Item = FilterValue> + Send + 'static,
    {
        let repo = Arc::clone(&self.repo);
        let mut last = None;
        let distinct = filters.filter(move |filter| {
            let fresh = last != Some(*filter);
            last = Some(*filter);
            future::ready(fresh)
        });

        switch_latest(distinct, move |filter| {
            tracing::debug!(%filter, "switching live query");
            observe_filter(&*repo, filter).map(move |plants| QueryResult {
                filter: Some(filter),
                plants,
            })
        })
    }

    /// Forwards every emission into `results` until `filters` ends.
    pub async fn run(self, filters: FilterChanges) {
        let stream = self.query_stream(filters);
        futures::pin_mut!(stream);

        while let Some(result) = stream.next().await {
            match &result.plants {
                Ok(plants) => {
                    tracing::trace!(filter = ?result.filter, count = plants.len(), "live query emitted");
                }
                Err(err) => {
                    tracing::warn!(filter = ?result.filter, "live query failed: {}", err);
                }
            }
            self.results.set(result);
        }
        tracing::debug!("live query switcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filter_state::FilterState;
    use crate::domain::model::Plant;
    use crate::domain::ports::PlantStream;
    use crate::utils::error::RefreshError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Each live query yields one list holding a single plant named after
    /// its filter, then stays open.
    #[derive(Default)]
    struct EchoRepository {
        opened: Mutex<Vec<FilterValue>>,
    }

    impl EchoRepository {
        fn echo(&self, filter: FilterValue, zone: u32) -> PlantStream {
            self.opened.lock().push(filter);
            let list: ResultList = Arc::from(vec![Plant::new("id", &filter.to_string(), zone)]);
            futures::stream::iter(vec![Ok(list)])
                .chain(futures::stream::pending())
                .boxed()
        }
    }

    #[async_trait]
    impl PlantRepository for EchoRepository {
        fn observe_all(&self) -> PlantStream {
            self.echo(FilterValue::NoFilter, 0)
        }

        fn observe_by_zone(&self, zone: u32) -> PlantStream {
            self.echo(FilterValue::Zone(zone), zone)
        }

        async fn refresh_all(&self) -> std::result::Result<(), RefreshError> {
            Ok(())
        }

        async fn refresh_by_zone(&self, _zone: u32) -> std::result::Result<(), RefreshError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_results_follow_latest_filter_and_skip_duplicates() {
        let repo = Arc::new(EchoRepository::default());
        let results = Observable::new(QueryResult::pending());
        let state = FilterState::new();
        let switcher = LatestQuerySwitcher::new(Arc::clone(&repo), results.clone());
        let handle = tokio::spawn(switcher.run(state.subscribe()));

        let mut rx = results.watch();
        tokio::time::timeout(
            Duration::from_secs(1),
            rx.wait_for(|r| r.is_for(FilterValue::NoFilter)),
        )
        .await
        .unwrap()
        .unwrap();

        state.set(FilterValue::Zone(5));
        state.set(FilterValue::Zone(5));
        tokio::time::timeout(
            Duration::from_secs(1),
            rx.wait_for(|r| r.is_for(FilterValue::Zone(5))),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(results.get().names(), vec!["zone 5".to_string()]);

        // The Zone(5) query never completes, so the task is stopped from outside.
        handle.abort();
        assert_eq!(
            *repo.opened.lock(),
            vec![FilterValue::NoFilter, FilterValue::Zone(5)]
        );
    }

    #[test]
    fn test_pending_result_is_not_for_any_filter() {
        let pending = QueryResult::pending();
        assert!(!pending.is_for(FilterValue::NoFilter));
        assert!(pending.names().is_empty());
    }
}
