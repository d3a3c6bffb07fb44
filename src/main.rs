use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use zone_feed::adapters::memory::{sample_catalog, InMemoryPlantRepository};
use zone_feed::config::CliArgs;
use zone_feed::utils::{logger, validation::Validate};
use zone_feed::{FeedConfig, FilterValue, PlantListFacade};

#[derive(Debug, Serialize)]
struct StepReport {
    step: usize,
    filter: String,
    filtered: bool,
    loading: bool,
    error: Option<String>,
    data_error: Option<String>,
    plants: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let config = match &args.config {
        Some(path) => FeedConfig::from_file(path)
            .with_context(|| format!("failed to load config file '{}'", path.display()))?,
        None => FeedConfig::default(),
    };
    config.validate().context("invalid configuration")?;
    args.validate().context("invalid arguments")?;

    if config.logging.json {
        logger::init_json_logger(&config.logging.level, args.verbose);
    } else {
        logger::init_cli_logger(&config.logging.level, args.verbose);
    }

    let repo = match &args.catalog {
        Some(path) => InMemoryPlantRepository::from_json_file(path)
            .with_context(|| format!("failed to load catalog '{}'", path.display()))?,
        None => InMemoryPlantRepository::new(sample_catalog()),
    }
    .with_latency(Duration::from_millis(args.latency_ms));
    for filter in &args.fail_zone {
        repo.fail_next_refresh(*filter, format!("simulated outage for {}", filter));
    }
    let facade = PlantListFacade::new(Arc::new(repo), config.feed_options());
    let settle_timeout = Duration::from_millis(args.settle_timeout_ms);

    for (step, filter) in args.zones.iter().copied().enumerate() {
        facade.set_filter(filter);
        if tokio::time::timeout(settle_timeout, settle(&facade, filter))
            .await
            .is_err()
        {
            tracing::warn!(%filter, "step did not settle within {:?}", settle_timeout);
        }

        let results = facade.results().get();
        let report = StepReport {
            step,
            filter: filter.to_string(),
            filtered: facade.is_filtered(),
            loading: facade.loading().get(),
            error: facade.error_notice().get(),
            data_error: results.plants.as_ref().err().map(|e| e.to_string()),
            plants: results.names(),
        };
        println!("{}", serde_json::to_string(&report)?);
        facade.acknowledge_error();
    }

    tracing::info!(
        sessions = facade.sessions_started(),
        refreshes = facade.repository().refresh_calls().len(),
        "done"
    );
    facade.close().await;
    Ok(())
}

/// Waits for the refresh of `filter` to finish and for the live query to
/// publish the local rows it left behind.
async fn settle(facade: &PlantListFacade<InMemoryPlantRepository>, filter: FilterValue) {
    facade.wait_until_idle().await;
    let expected = facade
        .repository()
        .local_rows()
        .iter()
        .filter(|plant| filter.matches(plant))
        .count();
    let mut results = facade.results().watch();
    let _ = results
        .wait_for(|r| {
            r.is_for(filter)
                && match &r.plants {
                    Ok(plants) => plants.len() == expected,
                    Err(_) => true,
                }
        })
        .await;
}
