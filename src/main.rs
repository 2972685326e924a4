//! CLI for running the generator against the logging sink.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use synth_payments::{
    Config, EmissionMode, FailurePolicy, LogProvisioner, LogSink, Orchestrator, Report, Stats,
};

#[derive(Parser, Debug)]
#[command(name = "synth-payments")]
#[command(about = "Synthetic payment lifecycle generator for load testing")]
#[command(version)]
struct Cli {
    /// Total number of payments to generate
    #[arg(long, default_value_t = 100_000)]
    payments: usize,

    /// Number of concurrent payment workers
    #[arg(long, default_value_t = 100)]
    workers: usize,

    /// Size of the source bank pool
    #[arg(long, default_value_t = 10)]
    sources: usize,

    /// Size of the destination bank pool
    #[arg(long, default_value_t = 10)]
    destinations: usize,

    /// Bank mutation tick interval in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 5000)]
    bank_update_interval_ms: u64,

    /// Per-status delay override (repeatable), e.g. --delay completed=3000
    #[arg(long = "delay", value_name = "STATUS=MS")]
    delays: Vec<String>,

    /// Workflow weight table override (repeatable), e.g.
    /// --workflow "Initiated,Completed=9". Replaces the default table.
    #[arg(long = "workflow", value_name = "SPEC=WEIGHT")]
    workflows: Vec<String>,

    /// Emit each workflow in lifecycle order instead of concurrently
    #[arg(long)]
    sequential: bool,

    /// Keep going when a status emission fails instead of failing the run
    #[arg(long)]
    continue_on_error: bool,

    /// Abort if the pipeline has not drained after this many seconds
    #[arg(long, value_name = "SECS")]
    drain_timeout_secs: Option<u64>,

    /// RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("synth-payments: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(cli)?;

    let stats = Arc::new(Stats::with_all_statuses());
    let orchestrator = Orchestrator::new(
        config,
        Arc::clone(&stats),
        Arc::new(LogSink),
        Arc::new(LogProvisioner),
    )?;

    info!("starting producer");
    let summary = orchestrator.run().await?;

    Report::new(&summary.stats).print();
    println!(
        "\nGenerated {} payments: {} events emitted, {} failed, {} bank updates in {:.2?}",
        summary.payments,
        summary.events_emitted,
        summary.events_failed,
        summary.bank_updates,
        summary.elapsed,
    );

    Ok(())
}

fn build_config(cli: Cli) -> Result<Config, String> {
    let mut config = Config {
        payments: cli.payments,
        workers: cli.workers,
        sources: cli.sources,
        destinations: cli.destinations,
        bank_update_interval: Duration::from_millis(cli.bank_update_interval_ms),
        emission: if cli.sequential {
            EmissionMode::Sequential
        } else {
            EmissionMode::Concurrent
        },
        failure_policy: if cli.continue_on_error {
            FailurePolicy::Continue
        } else {
            FailurePolicy::Abort
        },
        drain_timeout: cli.drain_timeout_secs.map(Duration::from_secs),
        seed: cli.seed,
        ..Config::default()
    };

    for entry in &cli.delays {
        let (status, millis) = split_key_value(entry)?;
        let millis: u64 = millis
            .parse()
            .map_err(|_| format!("invalid delay in '{entry}'"))?;
        config.delays_ms.insert(status.to_ascii_lowercase(), millis);
    }

    if !cli.workflows.is_empty() {
        config.workflows = cli
            .workflows
            .iter()
            .map(|entry| {
                let (spec, weight) = split_key_value(entry)?;
                let weight: u32 = weight
                    .parse()
                    .map_err(|_| format!("invalid weight in '{entry}'"))?;
                Ok((spec, weight))
            })
            .collect::<Result<_, String>>()?;
    }

    Ok(config)
}

fn split_key_value(entry: &str) -> Result<(String, String), String> {
    entry
        .rsplit_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{entry}'"))
}
