mod seed;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use stride_core::app::{WorkerApp, WorkerAppBuilder};
use stride_core::config::StrideConfig;
use stride_core::domain::ProcessingResult;
use stride_core::impls::{InMemoryCoordinationStore, InMemoryJobQueue, InMemoryWorkoutStore};
use stride_core::observability::ResultCounts;
use stride_core::ports::CoordinationStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "stride", version, about = "Periodic workout aggregation worker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a fixed number of dispatch cycles, drain the queue, print results.
    Run {
        #[command(flatten)]
        common: CommonArgs,
        /// Dispatch cycles to run back to back.
        #[arg(long, default_value_t = 1)]
        cycles: u32,
        /// Upper bound on waiting for queued jobs (retries included).
        #[arg(long, default_value_t = 15)]
        drain_timeout_secs: u64,
    },
    /// Run the scheduler and workers until Ctrl-C.
    Serve {
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Debug, Args)]
struct CommonArgs {
    /// JSON config file; STRIDE_* variables override it.
    #[arg(long)]
    config: Option<PathBuf>,
    /// JSON array of {id, heart_rates}; built-in fixtures when absent.
    #[arg(long)]
    seed: Option<PathBuf>,
    #[arg(long)]
    json_logs: bool,
}

#[derive(Serialize)]
struct RunSummary {
    counts: ResultCounts,
    results: Vec<ProcessingResult>,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    // a second init is a no-op
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<StrideConfig> {
    let mut config = match path {
        Some(path) => StrideConfig::from_json_file(path)?,
        None => StrideConfig::default(),
    };
    config.apply_env()?;
    Ok(config)
}

async fn coordination_store(config: &StrideConfig) -> anyhow::Result<Arc<dyn CoordinationStore>> {
    #[cfg(feature = "redis")]
    if let Some(url) = &config.redis_url {
        let store = stride_core::impls::RedisCoordinationStore::connect(url)
            .await
            .with_context(|| format!("connecting to {url}"))?;
        info!("using redis coordination store");
        return Ok(Arc::new(store));
    }

    #[cfg(not(feature = "redis"))]
    if config.redis_url.is_some() {
        warn!("redis_url is set but the redis feature is off, using in-memory locks");
    }

    Ok(Arc::new(InMemoryCoordinationStore::new()))
}

struct Wiring {
    app: WorkerApp,
    store: Arc<InMemoryWorkoutStore>,
    queue: Arc<InMemoryJobQueue>,
}

async fn wire(common: &CommonArgs) -> anyhow::Result<Wiring> {
    let config = load_config(common.config.as_ref())?;
    let coordination = coordination_store(&config).await?;

    let store = Arc::new(InMemoryWorkoutStore::new());
    seed::apply(&store, seed::load(common.seed.as_deref())?).await;
    let queue = Arc::new(InMemoryJobQueue::new());

    let app = WorkerAppBuilder::new(config)
        .coordination(coordination)
        .aggregation(store.clone())
        .results(store.clone())
        .queue(queue.clone())
        .build()
        .context("building worker app")?;
    Ok(Wiring { app, store, queue })
}

async fn run(common: CommonArgs, cycles: u32, drain_timeout: Duration) -> anyhow::Result<()> {
    let Wiring { app, store, queue } = wire(&common).await?;
    let workers = app.start_workers();

    for cycle in 1..=cycles {
        let report = app.dispatch.run_once().await?;
        info!(cycle, ?report, "dispatch cycle done");
    }

    let drained = tokio::time::timeout(drain_timeout, async {
        while !queue.is_drained().await {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    if drained.is_err() {
        warn!(
            pending = queue.pending_count().await,
            in_flight = queue.in_flight_count().await,
            "drain timeout reached, jobs still queued"
        );
    }
    workers.shutdown_and_join().await;

    let summary = RunSummary {
        counts: store.counts_by_status().await,
        results: store.results().await,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn serve(common: CommonArgs) -> anyhow::Result<()> {
    let Wiring { app, store, .. } = wire(&common).await?;
    let running = app.start();

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    info!("shutdown requested");
    running.shutdown().await;

    let counts = store.counts_by_status().await;
    info!(
        completed = counts.completed,
        failed = counts.failed,
        stuck = counts.stuck(),
        unprocessed = counts.unprocessed,
        "stopped"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            common,
            cycles,
            drain_timeout_secs,
        } => {
            init_tracing(common.json_logs);
            run(common, cycles, Duration::from_secs(drain_timeout_secs)).await
        }
        Command::Serve { common } => {
            init_tracing(common.json_logs);
            serve(common).await
        }
    }
}
