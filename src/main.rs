//! enrich-rs - Main Entry Point
//!
//! Enriches a list of identifiers against a remote lookup service and writes
//! the records and the set of distinct categories.

use anyhow::Context;
use clap::Parser;
use enrich_rs::{
    config::{EnrichConfig, FailurePolicy},
    lookup::LookupClient,
    pipeline::{CancelHandle, Pipeline, RunOutcome, RunReport},
    sink::Outputs,
    source::TsvSource,
    EnrichError,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Enrich identifiers with a category from a remote lookup service
#[derive(Debug, Parser)]
#[command(name = "enrich-rs", version, about)]
struct Cli {
    /// TOML config file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tab-separated input file
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Records output (`<identifier>\t<category>` per line)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Summary output (one distinct category per line)
    #[arg(short, long)]
    summary: Option<PathBuf>,

    /// Output for identifiers whose lookup failed
    #[arg(long)]
    failures: Option<PathBuf>,

    /// Number of concurrent lookup workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Capacity of both the work and the result queue
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Maximum attempts per lookup, first try included
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Lookup service endpoint
    #[arg(long)]
    endpoint: Option<String>,

    /// What to do with identifiers whose lookup failed
    #[arg(long, value_enum)]
    failure_policy: Option<FailurePolicy>,

    /// Truncate outputs instead of appending
    #[arg(long)]
    truncate: bool,

    /// Cancel the run after this many seconds
    #[arg(long)]
    max_runtime_secs: Option<u64>,

    /// Write a JSON run report here
    #[arg(long)]
    report: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `info,enrich_rs=trace` (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Use the deterministic offline client instead of the service
    #[cfg(feature = "mock-lookup")]
    #[arg(long)]
    offline: bool,
}

impl Cli {
    /// Apply command line overrides on top of the loaded config
    fn apply(&self, config: &mut EnrichConfig) {
        if let Some(ref input) = self.input {
            config.source.path = input.clone();
        }
        if let Some(ref output) = self.output {
            config.output.records_path = output.clone();
        }
        if let Some(ref summary) = self.summary {
            config.output.summary_path = summary.clone();
        }
        if let Some(ref failures) = self.failures {
            config.output.failures_path = Some(failures.clone());
        }
        if let Some(workers) = self.workers {
            config.pipeline.worker_count = workers;
        }
        if let Some(capacity) = self.queue_capacity {
            config.pipeline.work_queue_capacity = capacity;
            config.pipeline.result_queue_capacity = capacity;
        }
        if let Some(attempts) = self.max_attempts {
            config.lookup.retry.max_attempts = attempts;
        }
        if let Some(ref endpoint) = self.endpoint {
            config.lookup.endpoint = endpoint.clone();
        }
        if let Some(policy) = self.failure_policy {
            config.pipeline.failure_policy = policy;
        }
        if self.truncate {
            config.output.append = false;
        }
    }
}

/// Install the global subscriber; the guard must live until exit
fn init_logging(cli: &Cli) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = || match cli.log_level {
        Some(ref level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,enrich_rs=debug")),
    };

    let (file_layer, guard) = match cli.log_file {
        Some(ref path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(filter()))
        .with(file_layer)
        .init();

    Ok(guard)
}

fn load_config(cli: &Cli) -> anyhow::Result<EnrichConfig> {
    let mut config = match cli.config {
        Some(ref path) => EnrichConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EnrichConfig::load_or_default(None),
    };
    config.apply_env();
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn run_with<C: LookupClient + 'static>(
    cli: &Cli,
    config: &EnrichConfig,
    client: C,
) -> enrich_rs::Result<RunOutcome> {
    let cancel = CancelHandle::new();
    if let Some(secs) = cli.max_runtime_secs {
        let deadline = cancel.clone();
        let token = cancel.token();
        std::thread::Builder::new()
            .name("enrich-deadline".to_string())
            .spawn(move || {
                if token.sleep(Duration::from_secs(secs)) {
                    tracing::warn!("Maximum runtime of {}s reached, cancelling", secs);
                    deadline.cancel();
                }
            })?;
    }

    let source = TsvSource::open(&config.source)?;
    let outputs = Outputs::open(&config.output)?;
    let skipped = source.skip_counter();

    Ok(Pipeline::from_config(config, client)
        .with_cancel(cancel)
        .with_skip_counter(skipped)
        .execute(source, outputs))
}

fn http_client(config: &EnrichConfig) -> enrich_rs::HttpLookupClient {
    let client = enrich_rs::HttpLookupClient::from_config(&config.lookup);
    tracing::info!("Looking up categories at {}", client.endpoint());
    client
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli)?;

    tracing::info!("Starting enrich-rs {}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli)?;

    #[cfg(feature = "mock-lookup")]
    let outcome = if cli.offline {
        tracing::warn!("Using the offline lookup client");
        run_with(&cli, &config, enrich_rs::lookup::OfflineLookupClient::new())
    } else {
        run_with(&cli, &config, http_client(&config))
    };

    #[cfg(not(feature = "mock-lookup"))]
    let outcome = run_with(&cli, &config, http_client(&config));

    // A run that failed before the pipeline started still gets an empty report.
    let outcome = outcome.unwrap_or_else(|err| {
        RunOutcome::failed(RunReport::started(config.pipeline.worker_count), err)
    });
    if let Some(ref path) = cli.report {
        outcome.report.save_json(path)?;
        tracing::info!("Run report written to {}", path.display());
    }

    match outcome.error {
        None => Ok(()),
        Some(EnrichError::Cancelled) => {
            tracing::warn!("Run cancelled; partial output was persisted");
            Err(EnrichError::Cancelled.into())
        }
        Some(err) => {
            tracing::error!("Run failed: {}", err);
            Err(err.into())
        }
    }
}
