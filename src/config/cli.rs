use crate::domain::model::FilterValue;
use crate::utils::error::Result;
use crate::utils::validation::{validate_positive_number, Validate};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "zone-feed")]
#[command(about = "Drive a filterable plant list through a sequence of grow zones")]
pub struct CliArgs {
    /// Filters to apply in order: zone numbers or `none`
    #[arg(long, value_delimiter = ',', default_value = "none")]
    pub zones: Vec<FilterValue>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// JSON file holding the remote plant catalog
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Simulated latency of every refresh
    #[arg(long, default_value = "0")]
    pub latency_ms: u64,

    /// Filters whose first refresh fails
    #[arg(long, value_delimiter = ',')]
    pub fail_zone: Vec<FilterValue>,

    /// How long to wait for each step to settle
    #[arg(long, default_value = "5000")]
    pub settle_timeout_ms: u64,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl Validate for CliArgs {
    fn validate(&self) -> Result<()> {
        validate_positive_number("settle_timeout_ms", self.settle_timeout_ms, 1)
    }
}
