//! Pipeline coordination: one cycle at a time, every run recorded.
//!
//! The run state is a single atomic flag mutated only through a guarded
//! check-and-set — a trigger arriving while a cycle is running is a no-op,
//! never a queued second cycle. The state returns to idle unconditionally
//! on completion, whatever the outcome.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use super::aggregator::Aggregator;
use super::extractor::Extractor;
use super::loader::Loader;
use super::transformer::Transformer;
use crate::application::ports::SourceBinding;
use crate::domain::cycle::{CycleRun, CycleStatus};

/// Result of one `run_cycle` call.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// A cycle executed; its record is attached.
    Completed(CycleRun),
    /// A cycle was already running; nothing executed and no CycleRun was
    /// created.
    Skipped,
}

impl CycleOutcome {
    /// Whether this call actually executed a cycle.
    #[must_use]
    pub const fn executed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Orchestrates one ingestion cycle: Extract → Transform → Load → VWAP.
pub struct PipelineCoordinator {
    sources: Vec<SourceBinding>,
    extractor: Extractor,
    transformer: Transformer,
    loader: Loader,
    aggregator: Arc<Aggregator>,
    running: AtomicBool,
    last_run: RwLock<Option<CycleRun>>,
}

impl PipelineCoordinator {
    /// Assemble a coordinator from its stages and source registry.
    #[must_use]
    pub fn new(
        sources: Vec<SourceBinding>,
        extractor: Extractor,
        transformer: Transformer,
        loader: Loader,
        aggregator: Arc<Aggregator>,
    ) -> Self {
        Self {
            sources,
            extractor,
            transformer,
            loader,
            aggregator,
            running: AtomicBool::new(false),
            last_run: RwLock::new(None),
        }
    }

    /// Execute one pipeline cycle, unless one is already running.
    ///
    /// At most one cycle runs at a time; a call arriving while Running is
    /// a no-op that creates no CycleRun. The executed cycle's record is
    /// stored for `last_cycle` regardless of outcome.
    pub async fn run_cycle(&self) -> CycleOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Cycle trigger skipped: a cycle is already running");
            return CycleOutcome::Skipped;
        }

        let run = self.execute_cycle().await;
        *self.last_run.write() = Some(run.clone());
        self.running.store(false, Ordering::Release);

        CycleOutcome::Completed(run)
    }

    /// The most recent cycle's record, if any cycle has executed.
    #[must_use]
    pub fn last_cycle(&self) -> Option<CycleRun> {
        self.last_run.read().clone()
    }

    /// Whether a cycle is currently executing.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    async fn execute_cycle(&self) -> CycleRun {
        let mut run = CycleRun::start();
        tracing::info!(cycle = %run.id, "Pipeline cycle started");

        // Extract: all sources in parallel, failures isolated per source.
        let extraction = self.extractor.extract(&self.sources).await;
        run.counts.sources_attempted = extraction.attempted();
        run.counts.sources_succeeded = extraction.succeeded();
        run.counts.sources_failed = extraction.failed();
        run.counts.records_extracted = extraction.total_records();

        // Transform: begins only once every source outcome is collected.
        let transform = self.transformer.transform(&extraction).await;
        run.counts.observations_created = transform.observations.len();
        run.counts.records_unresolved = transform.unresolved();

        // Load: VWAP may only run after the critical sink confirms.
        let run = match self.loader.load(&transform.observations).await {
            Ok(load_report) => {
                run.counts.observations_loaded = load_report.observations_written;

                match self
                    .aggregator
                    .aggregate_cycle(&transform.observations, run.started_at)
                    .await
                {
                    Ok(vwap_records) => {
                        run.counts.vwap_records = vwap_records.len();
                        run.finish(CycleStatus::Succeeded)
                    }
                    Err(error) => {
                        tracing::error!(cycle = %run.id, error = %error, "VWAP aggregation failed");
                        run.finish(CycleStatus::Failed(error.to_string()))
                    }
                }
            }
            Err(error) => {
                tracing::error!(cycle = %run.id, error = %error, "Load stage failed");
                run.finish(CycleStatus::Failed(error.to_string()))
            }
        };

        tracing::info!(
            cycle = %run.id,
            status = ?run.status,
            sources_succeeded = run.counts.sources_succeeded,
            sources_failed = run.counts.sources_failed,
            observations = run.counts.observations_created,
            vwap_records = run.counts.vwap_records,
            "Pipeline cycle finished"
        );

        run
    }
}

impl std::fmt::Debug for PipelineCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineCoordinator")
            .field("sources", &self.sources.len())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
