use serde::{Deserialize, Serialize};

use crate::status::JobStatus;

/// Accounting record for a single job, written only by its monitor task.
///
/// Invariants enforced here rather than left to callers:
/// - `cpu_seconds` and `peak_rss_bytes` never decrease while the job is
///   `Running` ([`JobResult::record_sample`] keeps the running maximum);
/// - once `status` leaves `Running` it is frozen — a second
///   [`JobResult::finish`] call is a no-op.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    /// Current lifecycle state; terminal once it leaves `Running`.
    pub status: JobStatus,
    /// Free-text diagnostic for the terminal transition.
    pub reason: String,
    /// Cumulative CPU time (user + system) attributed to this job, in seconds.
    pub cpu_seconds: f64,
    /// Highest resident memory observed, in bytes.
    pub peak_rss_bytes: u64,
    /// Wall-clock time elapsed since launch, in seconds.
    pub wall_seconds: f64,
    /// Set when this job's terminal state forced a system-wide drain.
    pub caused_shutdown: bool,
}

impl JobResult {
    /// Fresh record for a job that just started running.
    pub fn new() -> Self {
        Self {
            status: JobStatus::Running,
            reason: String::new(),
            cpu_seconds: 0.0,
            peak_rss_bytes: 0,
            wall_seconds: 0.0,
            caused_shutdown: false,
        }
    }

    /// Fold one sampling tick into the record.
    ///
    /// CPU and RSS readings may go stale (a failed sample repeats the last
    /// value) but must never move backwards; samples after the terminal
    /// transition are dropped.
    pub fn record_sample(&mut self, cpu_seconds: f64, rss_bytes: u64, wall_seconds: f64) {
        if self.status.is_terminal() {
            return;
        }
        if cpu_seconds > self.cpu_seconds {
            self.cpu_seconds = cpu_seconds;
        }
        if rss_bytes > self.peak_rss_bytes {
            self.peak_rss_bytes = rss_bytes;
        }
        if wall_seconds > self.wall_seconds {
            self.wall_seconds = wall_seconds;
        }
    }

    /// Move the record to a terminal state.
    ///
    /// The first terminal transition wins; later calls do not change the
    /// recorded status or reason.
    pub fn finish(&mut self, status: JobStatus, reason: impl Into<String>) {
        if self.status.is_terminal() || !status.is_terminal() {
            return;
        }
        self.status = status;
        self.reason = reason.into();
    }

    /// Whether the record reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl Default for JobResult {
    fn default() -> Self {
        Self::new()
    }
}
