pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::memory::InMemoryPlantRepository;
pub use config::toml_config::FeedConfig;
pub use core::facade::{FeedOptions, PlantListFacade};
pub use core::observable::{Observable, ObservableView, Subscription};
pub use core::query_switcher::QueryResult;
pub use core::refresh::SameFilterPolicy;
pub use domain::model::{FilterValue, Plant, ResultList};
pub use domain::ports::{PlantRepository, PlantStream};
pub use utils::error::{DataSequenceError, FeedError, RefreshError, Result};
