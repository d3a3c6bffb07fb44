use crate::domain::model::{FilterValue, ResultList};
use crate::utils::error::{DataSequenceError, RefreshError};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Live query: re-emits the matching rows whenever the backing data changes.
pub type PlantStream = BoxStream<'static, std::result::Result<ResultList, DataSequenceError>>;

/// Data source behind the plant list: live queries over a local store plus
/// refresh operations that repopulate it.
#[async_trait]
pub trait PlantRepository: Send + Sync + 'static {
    fn observe_all(&self) -> PlantStream;

    fn observe_by_zone(&self, zone: u32) -> PlantStream;

    async fn refresh_all(&self) -> std::result::Result<(), RefreshError>;

    async fn refresh_by_zone(&self, zone: u32) -> std::result::Result<(), RefreshError>;
}

pub fn observe_filter<R: PlantRepository + ?Sized>(repo: &R, filter: FilterValue) -> PlantStream {
    match filter {
        FilterValue::NoFilter => repo.observe_all(),
        FilterValue::Zone(zone) => repo.observe_by_zone(zone),
    }
}

pub async fn refresh_filter<R: PlantRepository + ?Sized>(
    repo: &R,
    filter: FilterValue,
) -> std::result::Result<(), RefreshError> {
    match filter {
        FilterValue::NoFilter => repo.refresh_all().await,
        FilterValue::Zone(zone) => repo.refresh_by_zone(zone).await,
    }
}
