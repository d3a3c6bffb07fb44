use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Selection criterion for the plant list. `NoFilter` matches every plant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilterValue {
    #[default]
    NoFilter,
    Zone(u32),
}

impl FilterValue {
    pub fn is_filtered(&self) -> bool {
        !matches!(self, FilterValue::NoFilter)
    }

    pub fn zone(&self) -> Option<u32> {
        match self {
            FilterValue::NoFilter => None,
            FilterValue::Zone(zone) => Some(*zone),
        }
    }

    pub fn matches(&self, plant: &Plant) -> bool {
        match self {
            FilterValue::NoFilter => true,
            FilterValue::Zone(zone) => plant.grow_zone_number == *zone,
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::NoFilter => write!(f, "none"),
            FilterValue::Zone(zone) => write!(f, "zone {}", zone),
        }
    }
}

impl FromStr for FilterValue {
    type Err = String;

    /// Accepts `none`/`all` for the unfiltered list or a zone number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("none") || trimmed.eq_ignore_ascii_case("all") {
            return Ok(FilterValue::NoFilter);
        }
        trimmed
            .parse::<u32>()
            .map(FilterValue::Zone)
            .map_err(|e| format!("invalid grow zone '{}': {}", trimmed, e))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plant {
    pub plant_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub grow_zone_number: u32,
    #[serde(default = "default_watering_interval")]
    pub watering_interval: u32,
    #[serde(default)]
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refreshed_at: Option<DateTime<Utc>>,
}

fn default_watering_interval() -> u32 {
    7
}

impl Plant {
    pub fn new(plant_id: &str, name: &str, grow_zone_number: u32) -> Self {
        Self {
            plant_id: plant_id.to_string(),
            name: name.to_string(),
            description: String::new(),
            grow_zone_number,
            watering_interval: default_watering_interval(),
            image_url: String::new(),
            refreshed_at: None,
        }
    }
}

/// Immutable snapshot of the records matching one filter.
pub type ResultList = Arc<[Plant]>;

pub fn empty_result_list() -> ResultList {
    Arc::from(Vec::new())
}
