//! Prometheus Metrics Module
//!
//! Exposes pipeline metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Cycles**: Cycle counts by status, per-stage record counts
//! - **Sources**: Extraction failures, majority-failure warnings
//! - **Resolution**: Resolution rate, unmapped-code warnings
//! - **Sinks**: Non-critical and critical sink failures
//! - **Candles**: Candle-pass counts per interval

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::application::services::CandlePassReport;
use crate::domain::cycle::{CycleRun, CycleStatus};

/// Install the Prometheus recorder with an HTTP listener on `port`.
///
/// A port of 0 disables the exporter; metric macros then record into the
/// no-op recorder.
pub fn init_metrics(port: u16) {
    if port == 0 {
        tracing::info!("Prometheus exporter disabled");
        return;
    }

    let builder =
        PrometheusBuilder::new().with_http_listener(([0, 0, 0, 0], port));
    match builder.install() {
        Ok(()) => {
            register_metrics();
            tracing::info!(port, "Prometheus exporter listening");
        }
        Err(error) => {
            tracing::error!(error = %error, "Failed to install Prometheus recorder");
        }
    }
}

fn register_metrics() {
    describe_counter!(
        "conflux_ingest_cycles_total",
        "Pipeline cycles executed, by terminal status"
    );
    describe_counter!(
        "conflux_ingest_records_extracted_total",
        "Raw records extracted across all sources"
    );
    describe_counter!(
        "conflux_ingest_observations_created_total",
        "Price observations produced by the transformer"
    );
    describe_counter!(
        "conflux_ingest_records_unresolved_total",
        "Records skipped because no mapping resolved"
    );
    describe_counter!(
        "conflux_ingest_vwap_records_total",
        "VWAP records written"
    );
    describe_counter!(
        "conflux_ingest_source_failures_total",
        "Source extraction failures (errors and timeouts)"
    );
    describe_counter!(
        "conflux_ingest_candles_total",
        "OHLCV candles written, by interval"
    );
    describe_counter!(
        "conflux_ingest_candle_pass_failures_total",
        "Candle passes that failed, by interval"
    );
    describe_gauge!(
        "conflux_ingest_resolution_rate",
        "Fraction of records resolved in the most recent cycle"
    );
    describe_gauge!(
        "conflux_ingest_sources_healthy",
        "Sources that succeeded in the most recent cycle"
    );
}

/// Record the outcome of one executed cycle.
pub fn record_cycle(run: &CycleRun) {
    let status = match &run.status {
        CycleStatus::Running => "running",
        CycleStatus::Succeeded => "succeeded",
        CycleStatus::Failed(_) => "failed",
    };
    counter!("conflux_ingest_cycles_total", "status" => status).increment(1);

    let counts = run.counts;
    counter!("conflux_ingest_records_extracted_total")
        .increment(counts.records_extracted as u64);
    counter!("conflux_ingest_observations_created_total")
        .increment(counts.observations_created as u64);
    counter!("conflux_ingest_records_unresolved_total")
        .increment(counts.records_unresolved as u64);
    counter!("conflux_ingest_vwap_records_total").increment(counts.vwap_records as u64);
    counter!("conflux_ingest_source_failures_total").increment(counts.sources_failed as u64);

    gauge!("conflux_ingest_sources_healthy").set(counts.sources_succeeded as f64);

    let processed = counts.observations_created + counts.records_unresolved;
    if processed > 0 {
        gauge!("conflux_ingest_resolution_rate")
            .set(counts.observations_created as f64 / processed as f64);
    }
}

/// Record the outcome of one candle pass.
pub fn record_candle_pass(interval: &'static str, report: &CandlePassReport) {
    counter!("conflux_ingest_candles_total", "interval" => interval)
        .increment(report.candles_written as u64);
}

/// Record a failed candle pass.
pub fn record_candle_pass_failure(interval: &'static str) {
    counter!("conflux_ingest_candle_pass_failures_total", "interval" => interval).increment(1);
}
