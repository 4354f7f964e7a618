mod plan;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use tracing::info;

use tally_core::{Governor, GovernorConfig, LogReporter, QueueSource};
use tally_exec::ProcfsProbe;
use tally_observe::{LoggerConfig, LoggerLevel, init_logger};

use crate::plan::RunPlan;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    // 1) logger
    let cfg = LoggerConfig {
        level: LoggerLevel::new("info")?,
        ..Default::default()
    };
    init_logger(&cfg)?;
    info!("logger initialized");

    // 2) run plan
    let path = std::env::args()
        .nth(1)
        .context("usage: tallyd <plan.json>")?;
    let plan = RunPlan::load(&path).with_context(|| format!("loading plan from {path}"))?;
    info!(plan = %path, mode = %plan.mode, jobs = plan.jobs.len(), "plan loaded");

    // 3) shared ledger
    let ledger = Arc::new(plan.build_ledger()?);

    // 4) governor
    let governor = Governor::new(
        GovernorConfig {
            poll_interval: Duration::from_millis(plan.poll_interval_ms),
            grace: Duration::from_millis(plan.grace_ms),
            ..Default::default()
        },
        ledger,
        Arc::new(ProcfsProbe::new()),
        Arc::new(LogReporter),
    )?;

    // 5) run every job from the plan, then drain and settle
    let summary = governor.run(QueueSource::new(plan.jobs)).await;

    if let Some(bill) = summary.total_bill {
        info!(consumed_secs = summary.consumed_secs, bill, "final bill");
    }
    Ok(())
}
