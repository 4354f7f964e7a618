//! Limit evaluation for one sampling tick.
//!
//! Checks run in a fixed priority so a single tick produces exactly one
//! outcome: wall-clock timeout, then memory, then the job's own CPU limit,
//! then the shared budget. The first breach wins.

use tally_model::{BillingMode, JobSpec, JobStatus};

use crate::ledger::Ledger;

/// Measurements taken on one sampling tick, relative to job start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Sample {
    pub cpu_seconds: f64,
    pub peak_rss_bytes: u64,
    pub wall_seconds: f64,
}

/// Outcome of one evaluation tick.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Verdict {
    /// No limit breached; sleep until the next tick.
    Continue,
    /// Terminate the job with the given terminal status.
    Stop { status: JobStatus, reason: String },
}

impl Verdict {
    fn stop(status: JobStatus, reason: String) -> Self {
        Verdict::Stop { status, reason }
    }
}

/// Steps 1–3: the job's own limits, in priority order.
pub(crate) fn per_job_verdict(spec: &JobSpec, sample: &Sample) -> Verdict {
    if let Some(timeout) = spec.timeout_secs {
        if sample.wall_seconds > timeout {
            return Verdict::stop(
                JobStatus::Timeout,
                format!("wall clock {:.2}s exceeded timeout of {timeout}s", sample.wall_seconds),
            );
        }
    }
    if let Some(limit) = spec.memory_limit_bytes {
        if sample.peak_rss_bytes > limit {
            return Verdict::stop(
                JobStatus::MemoryExceeded,
                format!(
                    "peak rss {} bytes exceeded memory limit of {limit} bytes",
                    sample.peak_rss_bytes
                ),
            );
        }
    }
    if let Some(limit) = spec.cpu_limit_secs {
        if sample.cpu_seconds > limit {
            return Verdict::stop(
                JobStatus::CpuExceeded,
                format!("cpu time {:.2}s exceeded job limit of {limit}s", sample.cpu_seconds),
            );
        }
    }
    Verdict::Continue
}

/// Step 4: the shared budget, checked from inside the job's own monitor.
///
/// - `Prepaid`: debit the CPU consumed since the last tick; a refused debit
///   is credit exhaustion.
/// - `FixedQuota`: project already-reaped consumption plus this job's
///   current CPU time against the budget. The consumed total lags behind
///   still-running jobs, so concurrent jobs can jointly overshoot by at most
///   one job's usage; that bounded race is accepted, not a bug.
/// - `Postpaid`: the budget is unbounded; this check never fires.
pub(crate) fn budget_verdict(ledger: &Ledger, sample: &Sample, tick_delta_secs: f64) -> Verdict {
    match ledger.mode() {
        BillingMode::Prepaid => {
            if ledger.try_debit(tick_delta_secs) {
                Verdict::Continue
            } else {
                Verdict::stop(
                    JobStatus::QuotaExceeded,
                    format!(
                        "prepaid credit exhausted ({:.2}s remaining, {:.2}s due)",
                        ledger.remaining_secs(),
                        tick_delta_secs
                    ),
                )
            }
        }
        BillingMode::FixedQuota => {
            if ledger.would_exceed(sample.cpu_seconds) {
                Verdict::stop(
                    JobStatus::QuotaExceeded,
                    format!(
                        "projected consumption {:.2}s would exceed total quota of {}s",
                        ledger.consumed_secs() + sample.cpu_seconds,
                        ledger.budget_secs()
                    ),
                )
            } else {
                Verdict::Continue
            }
        }
        BillingMode::Postpaid => Verdict::Continue,
    }
}
