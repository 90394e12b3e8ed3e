//! Ingest Pipeline Binary
//!
//! Starts the ingestion-resolution-aggregation pipeline.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin ingest-pipeline
//! ```
//!
//! # Environment Variables
//!
//! All optional:
//! - `INGEST_EXTRACT_TIMEOUT_SECS`: Per-source extraction timeout (default: 15)
//! - `INGEST_SINK_TIMEOUT_SECS`: Per-sink load timeout (default: 30)
//! - `INGEST_BATCH_SIZE`: Records per transform batch (default: 100)
//! - `INGEST_VWAP_WINDOW_SECS`: VWAP window width (default: 5)
//! - `INGEST_INTERVAL_SECS`: Ingestion cycle cadence (default: 5)
//! - `INGEST_TRIGGER_JITTER_MS`: Random trigger jitter (default: 250)
//! - `INGEST_CANDLE_INTERVALS`: Comma list of 1m,5m,15m,1h,4h,1d (default: all)
//! - `INGEST_METRICS_PORT`: Prometheus port, 0 disables (default: 9184)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio_util::sync::CancellationToken;

use ingest_pipeline::infrastructure::metrics::{
    init_metrics, record_candle_pass, record_candle_pass_failure, record_cycle,
};
use ingest_pipeline::infrastructure::sources::builtin_sources;
use ingest_pipeline::infrastructure::telemetry;
use ingest_pipeline::{
    Aggregator, CacheStorePort, CycleOutcome, Extractor, IdentityResolver, InMemoryCacheStore,
    InMemoryMetadataStore, InMemoryTimeseriesStore, Loader, MetadataStorePort,
    PeriodicTrigger, PipelineCoordinator, PipelineSettings, TimeseriesStorePort, Timestamp,
    Transformer, check_sources,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    telemetry::init();

    tracing::info!("Starting ingest pipeline");

    let settings = PipelineSettings::from_env()?;
    log_config(&settings);

    init_metrics(settings.metrics_port);

    let shutdown = CancellationToken::new();

    // Store adapters. The in-memory implementations are the development
    // default; deployments swap in adapters for the real backends.
    let timeseries = Arc::new(InMemoryTimeseriesStore::new());
    let cache = Arc::new(InMemoryCacheStore::new());
    let metadata = Arc::new(InMemoryMetadataStore::new());

    // Source registry, built once at startup.
    let sources = builtin_sources();
    tracing::info!(sources = sources.len(), "Source registry built");

    let health = check_sources(&sources).await;
    let healthy = health.iter().filter(|h| h.healthy).count();
    tracing::info!(healthy, total = health.len(), "Startup source health probe");

    // Pipeline stages.
    let resolver = Arc::new(IdentityResolver::new(
        Arc::clone(&metadata) as Arc<dyn MetadataStorePort>
    ));
    let transformer = Transformer::new(resolver).with_batch_size(settings.batch_size);
    let loader = Loader::new(
        Arc::clone(&timeseries) as Arc<dyn TimeseriesStorePort>,
        Arc::clone(&cache) as Arc<dyn CacheStorePort>,
        Arc::clone(&metadata) as Arc<dyn MetadataStorePort>,
    )
    .with_sink_timeout(settings.sink_timeout);
    let aggregator = Arc::new(
        Aggregator::new(Arc::clone(&timeseries) as Arc<dyn TimeseriesStorePort>)
            .with_vwap_window_secs(settings.vwap_window_secs),
    );

    let coordinator = Arc::new(PipelineCoordinator::new(
        sources,
        Extractor::new(settings.extract_timeout),
        transformer,
        loader,
        Arc::clone(&aggregator),
    ));

    // Ingestion trigger: a firing during a running cycle is a no-op.
    let ingest_trigger =
        PeriodicTrigger::new("ingest", settings.ingest_interval, shutdown.clone())
            .with_jitter(settings.trigger_jitter);
    let ingest_coordinator = Arc::clone(&coordinator);
    ingest_trigger.spawn(move || {
        let coordinator = Arc::clone(&ingest_coordinator);
        async move {
            if let CycleOutcome::Completed(run) = coordinator.run_cycle().await {
                record_cycle(&run);
            }
        }
    });

    // One candle trigger per configured interval; failures stay isolated
    // to their interval.
    for interval in settings.candle_intervals.clone() {
        let trigger = PeriodicTrigger::new(
            format!("candles-{interval}"),
            Duration::from_secs(interval.width_secs()),
            shutdown.clone(),
        )
        .with_jitter(settings.trigger_jitter);

        let candle_aggregator = Arc::clone(&aggregator);
        trigger.spawn(move || {
            let aggregator = Arc::clone(&candle_aggregator);
            async move {
                match aggregator.run_candle_pass(interval, Timestamp::now()).await {
                    Ok(report) => record_candle_pass(interval.as_str(), &report),
                    Err(error) => {
                        tracing::error!(
                            interval = %interval,
                            error = %error,
                            "Candle pass failed"
                        );
                        record_candle_pass_failure(interval.as_str());
                    }
                }
            }
        });
    }

    tracing::info!("Ingest pipeline ready");

    await_shutdown(shutdown).await;

    tracing::info!("Ingest pipeline stopped");
    Ok(())
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(settings: &PipelineSettings) {
    tracing::info!(
        extract_timeout_secs = settings.extract_timeout.as_secs(),
        sink_timeout_secs = settings.sink_timeout.as_secs(),
        batch_size = settings.batch_size,
        vwap_window_secs = settings.vwap_window_secs,
        ingest_interval_secs = settings.ingest_interval.as_secs(),
        candle_intervals = settings.candle_intervals.len(),
        metrics_port = settings.metrics_port,
        "Configuration loaded"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
