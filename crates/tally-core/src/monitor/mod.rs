//! Per-job monitor task.
//!
//! Each launched job gets exactly one of these: a loop that samples the
//! process, evaluates limits, and — on a breach, cancellation, or natural
//! exit — settles the job into a terminal [`tally_model::JobResult`]. The
//! task exclusively owns the job's handle and result; the governor only sees
//! the finished [`JobReport`] when the task returns.

mod verdict;
pub(crate) use verdict::{Sample, Verdict, budget_verdict, per_job_verdict};

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tally_exec::{JobHandle, ProbeError, ProcessProbe, escalate};
use tally_model::{BillingMode, JobReport, JobResult, JobSpec, JobStatus};

use crate::ledger::Ledger;

/// Knobs for one monitor task, derived from the governor configuration.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MonitorConfig {
    /// Sampling period.
    pub poll_interval: Duration,
    /// How long a graceful stop may take before the forceful kill.
    pub grace: Duration,
}

/// Run the sampler → evaluator → escalator loop until the job reaches a
/// terminal state. Always returns a report with a terminal status.
pub(crate) async fn run_monitor(
    job_id: String,
    spec: JobSpec,
    mut handle: JobHandle,
    probe: Arc<dyn ProcessProbe>,
    ledger: Arc<Ledger>,
    cfg: MonitorConfig,
    cancel: CancellationToken,
) -> JobReport {
    let pid = handle.pid();
    let mut result = JobResult::new();
    // Assigned on every path out of the loop below.
    let exit_code: Option<i32>;

    // Last successfully read values; a failed sample repeats these.
    let mut cpu_secs = 0.0_f64;
    let mut rss_bytes = 0_u64;
    // CPU already debited from a prepaid ledger.
    let mut charged_secs = 0.0_f64;

    debug!(
        job = %job_id, pid,
        cpu_limit = ?spec.cpu_limit_secs,
        timeout = ?spec.timeout_secs,
        memory_limit = ?spec.memory_limit_bytes,
        "monitoring started"
    );

    loop {
        // Sample before the liveness check: if the process just exited, the
        // zombie still carries its final CPU figures, so short jobs are not
        // reported with a stale mid-interval value.
        let mut process_gone = false;
        match probe.cpu_seconds(pid) {
            Ok(total) => cpu_secs = (total - handle.cpu_baseline_secs()).max(cpu_secs),
            Err(ProbeError::Gone) => process_gone = true,
            Err(e) => debug!(job = %job_id, pid, error = %e, "cpu sample unavailable; keeping last value"),
        }
        if !process_gone {
            match probe.rss_bytes(pid) {
                Ok(rss) => rss_bytes = rss,
                Err(ProbeError::Gone) => process_gone = true,
                Err(e) => debug!(job = %job_id, pid, error = %e, "rss sample unavailable; keeping last value"),
            }
        }

        let sample = Sample {
            cpu_seconds: cpu_secs,
            peak_rss_bytes: rss_bytes.max(result.peak_rss_bytes),
            wall_seconds: handle.elapsed_secs(),
        };
        result.record_sample(sample.cpu_seconds, sample.peak_rss_bytes, sample.wall_seconds);

        // Liveness: a vanished process is normal completion, not a fault.
        match handle.try_wait() {
            Ok(Some(status)) => {
                exit_code = status.code();
                settle_prepaid(&ledger, &job_id, cpu_secs, &mut charged_secs);
                info!(job = %job_id, pid, ?exit_code, "job completed");
                result.finish(JobStatus::Completed, "process exited on its own");
                break;
            }
            Ok(None) if process_gone => {
                // Probe says gone but the child is not reaped yet; the wait
                // returns promptly.
                exit_code = handle.wait().await.ok().and_then(|s| s.code());
                settle_prepaid(&ledger, &job_id, cpu_secs, &mut charged_secs);
                info!(job = %job_id, pid, ?exit_code, "job completed");
                result.finish(JobStatus::Completed, "process exited on its own");
                break;
            }
            Ok(None) => {}
            Err(e) => {
                debug!(job = %job_id, pid, error = %e, "liveness check failed");
            }
        }

        // Evaluate, own limits first, then the shared budget.
        let verdict = match per_job_verdict(&spec, &sample) {
            Verdict::Continue => {
                let tick_delta = (cpu_secs - charged_secs).max(0.0);
                let verdict = budget_verdict(&ledger, &sample, tick_delta);
                if verdict == Verdict::Continue && ledger.mode() == BillingMode::Prepaid {
                    charged_secs = cpu_secs;
                }
                verdict
            }
            stop => stop,
        };

        if let Verdict::Stop { status, reason } = verdict {
            warn!(job = %job_id, pid, status = %status, %reason, "limit breached; terminating job");
            exit_code = escalate(&mut handle, cfg.grace).await.and_then(|s| s.code());
            settle_prepaid(&ledger, &job_id, cpu_secs, &mut charged_secs);
            if status.is_hard_stop() {
                result.caused_shutdown = true;
            }
            result.finish(status, reason);
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(job = %job_id, pid, "stop requested; terminating job");
                exit_code = escalate(&mut handle, cfg.grace).await.and_then(|s| s.code());
                settle_prepaid(&ledger, &job_id, cpu_secs, &mut charged_secs);
                result.finish(JobStatus::Canceled, "stopped by governor shutdown");
                break;
            }
            _ = tokio::time::sleep(cfg.poll_interval) => {}
        }
    }

    debug!(
        job = %job_id, pid,
        status = %result.status,
        cpu = result.cpu_seconds,
        peak_rss = result.peak_rss_bytes,
        wall = result.wall_seconds,
        "monitoring finished"
    );

    JobReport {
        job_id,
        pid,
        command: spec.command,
        exit_code,
        result,
    }
}

/// Prepaid runs are billed tick by tick; charge the tail consumed since the
/// last successful debit. Best effort: an empty balance at this point only
/// means the last partial tick goes unbilled.
fn settle_prepaid(ledger: &Ledger, job_id: &str, cpu_secs: f64, charged_secs: &mut f64) {
    if ledger.mode() != BillingMode::Prepaid {
        return;
    }
    let tail = cpu_secs - *charged_secs;
    if tail > 0.0 {
        if ledger.try_debit(tail) {
            *charged_secs = cpu_secs;
        } else {
            debug!(job = %job_id, tail, "final prepaid debit refused; credit already empty");
        }
    }
}
