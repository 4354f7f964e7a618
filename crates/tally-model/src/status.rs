use serde::{Deserialize, Serialize};

/// Lifecycle state of a governed job.
///
/// `Running` is the only non-terminal state. Every other variant is terminal:
/// once a job leaves `Running` its status never changes again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    /// The job is alive and being monitored.
    Running,
    /// The process exited on its own.
    Completed,
    /// Wall-clock limit reached before the process finished.
    Timeout,
    /// Peak resident memory crossed the job's memory limit.
    ///
    /// This is the one status that also forces a system-wide drain.
    MemoryExceeded,
    /// The job's own CPU time crossed its per-job CPU limit.
    CpuExceeded,
    /// The shared budget refused further consumption (fixed-quota projection
    /// or an exhausted prepaid credit).
    QuotaExceeded,
    /// Monitoring was cancelled externally (governor shutdown).
    Canceled,
}

impl JobStatus {
    /// Returns the status as a static string.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Timeout => "timeout",
            JobStatus::MemoryExceeded => "memory-exceeded",
            JobStatus::CpuExceeded => "cpu-exceeded",
            JobStatus::QuotaExceeded => "quota-exceeded",
            JobStatus::Canceled => "canceled",
        }
    }

    /// All states except `Running` are terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }

    /// Whether this terminal status forces the whole governor to drain.
    ///
    /// Memory violations are a hard stop, distinct from ordinary quota
    /// exhaustion.
    pub fn is_hard_stop(&self) -> bool {
        matches!(self, JobStatus::MemoryExceeded)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
