//! Pipeline cycle metadata.

use serde::{Deserialize, Serialize};

use crate::domain::shared::{CycleId, Timestamp};

/// Terminal status of one pipeline cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum CycleStatus {
    /// Still executing.
    Running,
    /// Completed; every stage ran (per-source failures may still have
    /// occurred and are visible in the stage counts).
    Succeeded,
    /// The cycle failed: the critical sink (or VWAP persistence) rejected
    /// the batch. Carries the failure reason.
    Failed(String),
}

impl CycleStatus {
    /// Whether the cycle reached a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Per-stage counters for one cycle, updated as stages complete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    /// Sources the extractor attempted.
    pub sources_attempted: usize,
    /// Sources that returned records.
    pub sources_succeeded: usize,
    /// Sources that failed or timed out.
    pub sources_failed: usize,
    /// Raw records extracted across all successful sources.
    pub records_extracted: usize,
    /// Observations the transformer produced.
    pub observations_created: usize,
    /// Records skipped because no mapping resolved.
    pub records_unresolved: usize,
    /// Observations confirmed written to the critical sink.
    pub observations_loaded: usize,
    /// VWAP records written for the cycle.
    pub vwap_records: usize,
}

/// Metadata of one pipeline execution, kept for observability and for
/// detecting overlapping runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRun {
    /// Unique id of this run.
    pub id: CycleId,
    /// When the cycle started.
    pub started_at: Timestamp,
    /// When the cycle reached a terminal state.
    pub finished_at: Option<Timestamp>,
    /// Terminal status (or `Running` while in flight).
    pub status: CycleStatus,
    /// Per-stage counters.
    pub counts: StageCounts,
}

impl CycleRun {
    /// Start a new cycle record.
    #[must_use]
    pub fn start() -> Self {
        Self {
            id: CycleId::generate(),
            started_at: Timestamp::now(),
            finished_at: None,
            status: CycleStatus::Running,
            counts: StageCounts::default(),
        }
    }

    /// Mark the run terminal with the given status.
    #[must_use]
    pub fn finish(mut self, status: CycleStatus) -> Self {
        self.finished_at = Some(Timestamp::now());
        self.status = status;
        self
    }
}
