use serde::{Deserialize, Serialize};

use crate::{billing::BillingMode, result::JobResult};

/// Structured record handed to the reporter when a job is reaped.
///
/// Formatting and display live outside the core; this is the complete set of
/// facts a reporter may want about one finished job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    /// Run-local job identifier (e.g. `job-sleep-3`).
    pub job_id: String,
    /// OS process id of the launched child.
    pub pid: u32,
    /// Command the job was launched with.
    pub command: String,
    /// Exit code if the process exited normally; `None` when killed by a
    /// signal or never reaped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Final accounting record.
    pub result: JobResult,
}

/// Snapshot of the shared budget, emitted between jobs and at shutdown.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSummary {
    /// Billing mode the run was started with.
    pub mode: BillingMode,
    /// Total quota or initial credit in CPU-seconds; infinite for postpaid
    /// (serialized as `null`).
    pub budget_secs: f64,
    /// CPU-seconds charged so far across all reaped jobs.
    pub consumed_secs: f64,
    /// Budget still available, clamped at zero.
    pub remaining_secs: f64,
    /// Price of one CPU-second.
    pub cost_per_second: f64,
    /// Final bill; present only for postpaid runs, and only at shutdown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bill: Option<f64>,
}
