use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::process::DrainSummary;
use crate::types::{NodeNetworkHandle, ProcessId, RevisionPair, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    Pending,
    /// Checkout was current; nothing was touched.
    Skipped,
    /// The load generator ran; see `exit_code`.
    Completed,
    Failed,
}

/// What one cycle did, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub stages: Vec<Stage>,
    pub outcome: CycleOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revisions: Option<RevisionPair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drain: Option<DrainSummary>,
    #[serde(default)]
    pub network_stopped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeNetworkHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_sender_pid: Option<ProcessId>,
    /// The data sender failed to start; results carry partial signal only.
    #[serde(default)]
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CycleReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            stages: vec![Stage::Idle],
            outcome: CycleOutcome::Pending,
            revisions: None,
            drain: None,
            network_stopped: false,
            node: None,
            data_sender_pid: None,
            degraded: false,
            exit_code: None,
            failed_stage: None,
            error: None,
        }
    }

    pub fn finish(&mut self, outcome: CycleOutcome) {
        self.outcome = outcome;
        self.finished_at = Some(Utc::now());
    }

    pub fn visited(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }

    /// Process exit status for the whole cycle.
    pub fn process_exit_code(&self) -> i32 {
        match self.outcome {
            CycleOutcome::Skipped => 0,
            CycleOutcome::Completed => self.exit_code.unwrap_or(1),
            CycleOutcome::Pending | CycleOutcome::Failed => 1,
        }
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}

impl Default for CycleReport {
    fn default() -> Self {
        Self::new()
    }
}
