//! Top-level governor loop.
//!
//! Phases: accepting jobs → draining → stopped. While accepting, the loop
//! pulls specs from the [`JobSource`], launches them, and runs one monitor
//! task per job; reaping a finished monitor folds its CPU time into the
//! ledger and may trigger the system-wide stop conditions (memory hard stop,
//! budget exhaustion). Draining cancels every still-running monitor and
//! waits a bounded interval for them to settle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tally_exec::{ProcessProbe, launch};
use tally_model::{BillingMode, JobReport, JobResult, JobSpec, JobStatus, LedgerSummary};

use crate::{
    CoreError,
    id::make_job_id,
    ledger::Ledger,
    monitor::{MonitorConfig, run_monitor},
    report::Reporter,
    source::JobSource,
};

/// Timing knobs for a governor run.
#[derive(Debug, Clone, Copy)]
pub struct GovernorConfig {
    /// Sampling period of every monitor task.
    pub poll_interval: Duration,
    /// Grace interval between the polite stop signal and the forceful kill.
    pub grace: Duration,
    /// Upper bound on waiting for monitors to settle during drain. Past it,
    /// remaining monitor tasks are aborted.
    pub drain_timeout: Duration,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            grace: Duration::from_millis(500),
            drain_timeout: Duration::from_secs(5),
        }
    }
}

impl GovernorConfig {
    fn validate(&self) -> Result<(), CoreError> {
        if self.poll_interval.is_zero() {
            return Err(CoreError::InvalidConfig("poll interval cannot be zero".into()));
        }
        if self.grace.is_zero() {
            return Err(CoreError::InvalidConfig("grace interval cannot be zero".into()));
        }
        if self.drain_timeout.is_zero() {
            return Err(CoreError::InvalidConfig("drain timeout cannot be zero".into()));
        }
        Ok(())
    }
}

/// What the governor remembers about a job whose monitor is still running.
///
/// Only enough to synthesize a terminal report if the monitor task itself
/// dies; the live accounting is owned by the monitor.
struct ActiveJob {
    job_id: String,
    pid: u32,
    command: String,
}

/// Orchestrates job admission, monitoring, and shutdown for one run.
pub struct Governor {
    cfg: GovernorConfig,
    ledger: Arc<Ledger>,
    probe: Arc<dyn ProcessProbe>,
    reporter: Arc<dyn Reporter>,
}

impl Governor {
    pub fn new(
        cfg: GovernorConfig,
        ledger: Arc<Ledger>,
        probe: Arc<dyn ProcessProbe>,
        reporter: Arc<dyn Reporter>,
    ) -> Result<Self, CoreError> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            ledger,
            probe,
            reporter,
        })
    }

    /// Shared ledger handle, for live status snapshots.
    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Drive the run to completion and return the ledger's closing summary.
    pub async fn run<S: JobSource>(&self, mut source: S) -> LedgerSummary {
        let mut monitors: JoinSet<JobReport> = JoinSet::new();
        let mut active: HashMap<Id, ActiveJob> = HashMap::new();
        let stop_all = CancellationToken::new();

        info!(
            mode = %self.ledger.mode().as_str(),
            budget_secs = self.ledger.budget_secs(),
            "governor accepting jobs"
        );

        loop {
            tokio::select! {
                spec = source.next_job() => {
                    match spec {
                        Some(spec) => {
                            self.admit(spec, &mut monitors, &mut active, &stop_all).await;
                        }
                        None => {
                            info!("job source exhausted; draining");
                            break;
                        }
                    }
                }
                Some(joined) = monitors.join_next_with_id() => {
                    if self.reap(joined, &mut active).await {
                        break;
                    }
                }
            }
        }

        self.drain(&mut monitors, &mut active, &stop_all).await;

        let summary = self.ledger.final_summary();
        self.reporter.run_finished(&summary).await;
        info!(
            consumed_secs = summary.consumed_secs,
            total_bill = ?summary.total_bill,
            "governor stopped"
        );
        summary
    }

    /// Launch a job and start its monitor task.
    ///
    /// Validation and launch failures are contained: they are reported,
    /// produce no job record, and leave the ledger untouched.
    async fn admit(
        &self,
        spec: JobSpec,
        monitors: &mut JoinSet<JobReport>,
        active: &mut HashMap<Id, ActiveJob>,
        stop_all: &CancellationToken,
    ) {
        if let Err(e) = spec.validate() {
            warn!(command = %spec.command, error = %e, "rejecting invalid job spec");
            self.reporter.job_rejected(&spec, &e.to_string()).await;
            return;
        }

        let handle = match launch(&spec, self.probe.as_ref()) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(command = %spec.command, error = %e, "launch failed; ledger untouched");
                self.reporter.job_rejected(&spec, &e.to_string()).await;
                return;
            }
        };

        let job_id = make_job_id(&spec.command);
        let pid = handle.pid();
        info!(job = %job_id, pid, command = %spec.command, "job admitted");

        let monitor_cfg = MonitorConfig {
            poll_interval: self.cfg.poll_interval,
            grace: self.cfg.grace,
        };
        let abort = monitors.spawn(run_monitor(
            job_id.clone(),
            spec.clone(),
            handle,
            Arc::clone(&self.probe),
            Arc::clone(&self.ledger),
            monitor_cfg,
            stop_all.child_token(),
        ));
        active.insert(
            abort.id(),
            ActiveJob {
                job_id,
                pid,
                command: spec.command,
            },
        );
    }

    /// Fold a finished monitor into the run. Returns `true` when the run
    /// must move to draining.
    async fn reap(
        &self,
        joined: Result<(Id, JobReport), JoinError>,
        active: &mut HashMap<Id, ActiveJob>,
    ) -> bool {
        let report = match joined {
            Ok((id, report)) => {
                active.remove(&id);
                report
            }
            Err(e) => {
                // The monitor died without settling its job. Synthesize a
                // terminal record so the run can still account for it.
                error!(error = %e, "monitor task failed; synthesizing terminal result");
                let Some(job) = active.remove(&e.id()) else {
                    return false;
                };
                let mut result = JobResult::new();
                result.finish(JobStatus::Canceled, format!("monitor task failed: {e}"));
                JobReport {
                    job_id: job.job_id,
                    pid: job.pid,
                    command: job.command,
                    exit_code: None,
                    result,
                }
            }
        };

        match self.ledger.mode() {
            // Prepaid CPU time was already debited tick by tick inside the
            // monitor; folding it in again would double-charge.
            BillingMode::Prepaid => {}
            BillingMode::FixedQuota | BillingMode::Postpaid => {
                self.ledger.accumulate(report.result.cpu_seconds);
            }
        }

        self.reporter.job_finished(&report).await;

        if report.result.status.is_hard_stop() {
            warn!(job = %report.job_id, "memory violation; hard stop");
            return true;
        }
        if self.ledger.is_exhausted() {
            info!(
                consumed_secs = self.ledger.consumed_secs(),
                budget_secs = self.ledger.budget_secs(),
                "budget exhausted; draining"
            );
            return true;
        }
        false
    }

    /// Cancel every still-running monitor and wait, bounded, for each to
    /// settle. Past the deadline, remaining monitors are aborted and reaped
    /// as synthesized failures.
    async fn drain(
        &self,
        monitors: &mut JoinSet<JobReport>,
        active: &mut HashMap<Id, ActiveJob>,
        stop_all: &CancellationToken,
    ) {
        if !active.is_empty() {
            info!(running = active.len(), "stopping still-running jobs");
        }
        stop_all.cancel();

        let deadline = tokio::time::Instant::now() + self.cfg.drain_timeout;
        loop {
            match tokio::time::timeout_at(deadline, monitors.join_next_with_id()).await {
                Ok(Some(joined)) => {
                    self.reap(joined, active).await;
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(remaining = active.len(), "drain timeout; aborting remaining monitors");
                    monitors.abort_all();
                    while let Some(joined) = monitors.join_next_with_id().await {
                        self.reap(joined, active).await;
                    }
                    break;
                }
            }
        }
        debug!("drain complete");
    }
}

#[cfg(test)]
mod tests {
    use super::{Governor, GovernorConfig};
    use crate::ledger::Ledger;
    use crate::report::Reporter;
    use crate::source::{JobSource, QueueSource};
    use crate::testutil::ScriptedProbe;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};
    use tally_exec::ProcfsProbe;
    use tally_model::{JobReport, JobSpec, JobStatus, LedgerSummary};

    #[derive(Default)]
    struct CollectReporter {
        finished: Mutex<Vec<JobReport>>,
        rejected: Mutex<Vec<String>>,
        summary: Mutex<Option<LedgerSummary>>,
    }

    #[async_trait]
    impl Reporter for CollectReporter {
        async fn job_finished(&self, report: &JobReport) {
            self.finished.lock().unwrap().push(report.clone());
        }
        async fn job_rejected(&self, spec: &JobSpec, _reason: &str) {
            self.rejected.lock().unwrap().push(spec.command.clone());
        }
        async fn run_finished(&self, summary: &LedgerSummary) {
            *self.summary.lock().unwrap() = Some(summary.clone());
        }
    }

    /// Yields its one job immediately, then pends: the run can only end
    /// through a stop condition, never through source exhaustion.
    struct SlowSource {
        first: Option<JobSpec>,
    }

    #[async_trait]
    impl JobSource for SlowSource {
        async fn next_job(&mut self) -> Option<JobSpec> {
            match self.first.take() {
                Some(spec) => Some(spec),
                None => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    None
                }
            }
        }
    }

    fn test_cfg() -> GovernorConfig {
        GovernorConfig {
            poll_interval: Duration::from_millis(50),
            grace: Duration::from_millis(200),
            drain_timeout: Duration::from_secs(3),
        }
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let cfg = GovernorConfig {
            poll_interval: Duration::ZERO,
            ..test_cfg()
        };
        let result = Governor::new(
            cfg,
            Arc::new(Ledger::postpaid(1.0)),
            Arc::new(ProcfsProbe::new()),
            Arc::new(CollectReporter::default()),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn launch_failure_never_touches_the_ledger() {
        let ledger = Arc::new(Ledger::fixed_quota(10.0));
        let reporter = Arc::new(CollectReporter::default());
        let governor = Governor::new(
            test_cfg(),
            Arc::clone(&ledger),
            Arc::new(ProcfsProbe::new()),
            reporter.clone() as Arc<dyn Reporter>,
        )
        .unwrap();

        let summary = governor
            .run(QueueSource::new([JobSpec::new("definitely-not-a-real-binary-4242")]))
            .await;

        assert_eq!(summary.consumed_secs, 0.0);
        assert_eq!(reporter.rejected.lock().unwrap().len(), 1);
        assert!(reporter.finished.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn quota_breach_is_reaped_and_the_run_drains() {
        // CPU grows 0.75s per tick against a 1.0s total quota; the run can
        // only end because exhaustion moves it to draining.
        let ledger = Arc::new(Ledger::fixed_quota(1.0));
        let reporter = Arc::new(CollectReporter::default());
        let governor = Governor::new(
            test_cfg(),
            Arc::clone(&ledger),
            Arc::new(ScriptedProbe::stepping(0.75, 1024)),
            reporter.clone() as Arc<dyn Reporter>,
        )
        .unwrap();

        let started = Instant::now();
        let summary = governor
            .run(SlowSource {
                first: Some(JobSpec::new("sleep").with_args(["10"])),
            })
            .await;

        assert!(started.elapsed() < Duration::from_secs(10));
        let finished = reporter.finished.lock().unwrap();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].result.status, JobStatus::QuotaExceeded);
        // Ledger conservation: the reaped job's CPU is the consumed total.
        assert!((summary.consumed_secs - finished[0].result.cpu_seconds).abs() < 1e-9);
        assert!(summary.consumed_secs >= summary.budget_secs);
    }

    #[tokio::test]
    async fn memory_violation_hard_stops_the_whole_run() {
        let ledger = Arc::new(Ledger::postpaid(1.0));
        let reporter = Arc::new(CollectReporter::default());
        let governor = Governor::new(
            test_cfg(),
            Arc::clone(&ledger),
            Arc::new(ScriptedProbe::flat(0.01, 150 * 1024 * 1024)),
            reporter.clone() as Arc<dyn Reporter>,
        )
        .unwrap();

        let started = Instant::now();
        governor
            .run(SlowSource {
                first: Some(
                    JobSpec::new("sleep")
                        .with_args(["10"])
                        .with_memory_limit(100 * 1024 * 1024),
                ),
            })
            .await;

        // The budget is unbounded, so only the memory hard stop can have
        // ended the run.
        assert!(started.elapsed() < Duration::from_secs(10));
        let finished = reporter.finished.lock().unwrap();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].result.status, JobStatus::MemoryExceeded);
        assert!(finished[0].result.caused_shutdown);
    }

    #[tokio::test]
    async fn postpaid_bill_is_settled_once_at_shutdown() {
        // Each job reads a flat 2.0s of CPU; two jobs make a 4.0s total.
        let ledger = Arc::new(Ledger::postpaid(1.2));
        let reporter = Arc::new(CollectReporter::default());
        let governor = Governor::new(
            test_cfg(),
            Arc::clone(&ledger),
            Arc::new(ScriptedProbe::flat(2.0, 1024)),
            reporter.clone() as Arc<dyn Reporter>,
        )
        .unwrap();

        let summary = governor
            .run(QueueSource::new([
                JobSpec::new("sh").with_args(["-c", "exit 0"]),
                JobSpec::new("sh").with_args(["-c", "exit 0"]),
            ]))
            .await;

        assert_eq!(reporter.finished.lock().unwrap().len(), 2);
        assert!((summary.consumed_secs - 4.0).abs() < 1e-9);
        assert!((summary.total_bill.unwrap() - 4.8).abs() < 1e-9);

        let stored = reporter.summary.lock().unwrap();
        assert_eq!(stored.as_ref().unwrap().total_bill, summary.total_bill);
    }

    #[tokio::test]
    async fn source_exhaustion_cancels_still_running_jobs() {
        let ledger = Arc::new(Ledger::postpaid(1.0));
        let reporter = Arc::new(CollectReporter::default());
        let governor = Governor::new(
            test_cfg(),
            Arc::clone(&ledger),
            Arc::new(ProcfsProbe::new()),
            reporter.clone() as Arc<dyn Reporter>,
        )
        .unwrap();

        let started = Instant::now();
        governor
            .run(QueueSource::new([JobSpec::new("sleep").with_args(["30"])]))
            .await;

        assert!(
            started.elapsed() < Duration::from_secs(10),
            "drain must not wait out the sleep"
        );
        let finished = reporter.finished.lock().unwrap();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].result.status, JobStatus::Canceled);
    }

    #[tokio::test]
    async fn prepaid_exhaustion_keeps_the_balance_non_negative() {
        // Ticks debit 0.5s each; the credit covers exactly two of them, so
        // the third is refused and the drained ledger sits at zero.
        let ledger = Arc::new(Ledger::prepaid(1.0, 1.0));
        let reporter = Arc::new(CollectReporter::default());
        let governor = Governor::new(
            test_cfg(),
            Arc::clone(&ledger),
            Arc::new(ScriptedProbe::stepping(0.5, 1024)),
            reporter.clone() as Arc<dyn Reporter>,
        )
        .unwrap();

        let summary = governor
            .run(SlowSource {
                first: Some(JobSpec::new("sleep").with_args(["10"])),
            })
            .await;

        let finished = reporter.finished.lock().unwrap();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].result.status, JobStatus::QuotaExceeded);
        assert!(summary.remaining_secs >= 0.0);
        assert!((summary.consumed_secs - 1.0).abs() < 1e-9);
    }
}
