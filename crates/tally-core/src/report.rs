use async_trait::async_trait;
use tracing::{info, warn};

use tally_model::{JobReport, JobSpec, LedgerSummary};

/// Sink for structured run records.
///
/// The engine emits records, never formatted text; displaying them is the
/// implementation's business.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// A job reached a terminal state and was reaped.
    async fn job_finished(&self, report: &JobReport);

    /// A job could not be started (failed validation or launch). No job
    /// record exists and the ledger was not touched.
    async fn job_rejected(&self, spec: &JobSpec, reason: &str);

    /// The run is over; `summary` carries the ledger's final state and, for
    /// postpaid runs, the computed bill.
    async fn run_finished(&self, summary: &LedgerSummary);
}

/// Reporter that emits every record as a structured log event.
pub struct LogReporter;

#[async_trait]
impl Reporter for LogReporter {
    async fn job_finished(&self, report: &JobReport) {
        info!(
            job = %report.job_id,
            pid = report.pid,
            command = %report.command,
            status = %report.result.status,
            reason = %report.result.reason,
            cpu_secs = report.result.cpu_seconds,
            peak_rss_bytes = report.result.peak_rss_bytes,
            wall_secs = report.result.wall_seconds,
            exit_code = ?report.exit_code,
            "job finished"
        );
    }

    async fn job_rejected(&self, spec: &JobSpec, reason: &str) {
        warn!(command = %spec.command, %reason, "job rejected");
    }

    async fn run_finished(&self, summary: &LedgerSummary) {
        info!(
            mode = %summary.mode.as_str(),
            budget_secs = summary.budget_secs,
            consumed_secs = summary.consumed_secs,
            remaining_secs = summary.remaining_secs,
            total_bill = ?summary.total_bill,
            "run finished"
        );
    }
}
