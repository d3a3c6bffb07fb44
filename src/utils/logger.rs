use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Output format of the feed's log lines. Both go to stderr so stdout stays
/// free for step reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

/// `RUST_LOG` wins; otherwise the crate logs at `level`, or at debug with
/// everything else at info when `verbose` is set.
fn feed_filter(level: &str, verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("zone_feed=debug,info")
        } else {
            EnvFilter::new(format!("zone_feed={}", level))
        }
    })
}

pub fn init_logger(format: LogFormat, level: &str, verbose: bool) {
    let base = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(false)
        .with_line_number(false);
    let output: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Compact => base.compact().boxed(),
        LogFormat::Json => base.json().boxed(),
    };

    tracing_subscriber::registry()
        .with(output)
        .with(feed_filter(level, verbose))
        .init();
}

pub fn init_cli_logger(level: &str, verbose: bool) {
    init_logger(LogFormat::Compact, level, verbose);
}

pub fn init_json_logger(level: &str, verbose: bool) {
    init_logger(LogFormat::Json, level, verbose);
}
