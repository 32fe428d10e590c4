use serde::{Deserialize, Serialize};

use crate::{DetectedTarget, RobotCoordinate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionOutcome {
    Completed,
    Aborted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickReport {
    pub index: usize,
    pub detected: DetectedTarget,
    pub target: RobotCoordinate,
    // steps whose ack window expired without a sentinel
    pub ack_timeouts: u32,
    pub completed: bool,
}

/// Written once per `picker run` when `--report` is given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub started_unix_ms: i64,
    pub finished_unix_ms: i64,
    pub dry_run: bool,
    pub capture_attempts: u32,
    pub picks: Vec<PickReport>,
    pub returned_home: bool,
    pub outcome: SessionOutcome,
    pub error: Option<String>,
}

impl SessionReport {
    pub fn total_ack_timeouts(&self) -> u32 {
        self.picks.iter().map(|p| p.ack_timeouts).sum()
    }
}
