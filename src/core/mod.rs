pub mod facade;
pub mod filter_state;
pub mod observable;
pub mod query_switcher;
pub mod refresh;
pub mod scope;
pub mod switch_latest;

pub use crate::domain::model::{FilterValue, Plant, ResultList};
pub use crate::domain::ports::{PlantRepository, PlantStream};
pub use crate::utils::error::Result;
pub use facade::{FeedOptions, PlantListFacade};
pub use query_switcher::QueryResult;
pub use refresh::SameFilterPolicy;
