use std::process::{ExitStatus, Stdio};
use std::time::Instant;

use tokio::process::{Child, Command};
use tracing::{debug, trace};

use tally_model::JobSpec;

use crate::{LaunchError, probe::ProcessProbe};

/// Owned handle to a launched child process.
///
/// The handle is exclusively owned by the job's monitor task until the job
/// reaches a terminal state; nothing else waits on or signals the child.
#[derive(Debug)]
pub struct JobHandle {
    pid: u32,
    started: Instant,
    cpu_baseline_secs: f64,
    child: Child,
}

impl JobHandle {
    /// OS process id of the child.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Wall-clock seconds elapsed since launch.
    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// CPU reading taken at launch time.
    ///
    /// Samples are deltaed against this so CPU consumed before monitoring
    /// started is never billed.
    pub fn cpu_baseline_secs(&self) -> f64 {
        self.cpu_baseline_secs
    }

    /// Non-blocking liveness check; `Some` once the child has exited.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Wait for the child to exit.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Send SIGKILL without waiting for the child to exit.
    pub fn start_kill(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }
}

/// Spawn the process described by `spec` and wrap it in a monitorable handle.
///
/// stdout/stderr are redirected to pipes; the governor never inspects them.
/// The probe is consulted once to establish the CPU baseline for the new
/// process; a failed baseline read falls back to zero.
pub fn launch(spec: &JobSpec, probe: &dyn ProcessProbe) -> Result<JobHandle, LaunchError> {
    trace!(command = %spec.command, args = ?spec.args, "spawning job process");

    let mut cmd = Command::new(&spec.command);
    cmd.args(&spec.args);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => LaunchError::NotFound(spec.command.clone()),
        std::io::ErrorKind::PermissionDenied => LaunchError::PermissionDenied(spec.command.clone()),
        _ => LaunchError::Spawn {
            command: spec.command.clone(),
            source: e,
        },
    })?;

    let pid = child
        .id()
        .ok_or_else(|| LaunchError::NoPid(spec.command.clone()))?;

    let cpu_baseline_secs = match probe.cpu_seconds(pid) {
        Ok(secs) => secs,
        Err(e) => {
            trace!(pid, error = %e, "could not read cpu baseline; assuming zero");
            0.0
        }
    };

    debug!(pid, command = %spec.command, "job process launched");
    Ok(JobHandle {
        pid,
        started: Instant::now(),
        cpu_baseline_secs,
        child,
    })
}

#[cfg(test)]
mod tests {
    use super::launch;
    use crate::probe::ProcfsProbe;
    use tally_model::JobSpec;

    #[tokio::test]
    async fn launch_spawns_and_reaps_a_real_process() {
        let spec = JobSpec::new("sh").with_args(["-c", "exit 7"]);
        let mut handle = launch(&spec, &ProcfsProbe::new()).expect("launch should succeed");
        assert!(handle.pid() > 0);

        let status = handle.wait().await.expect("wait should succeed");
        assert_eq!(status.code(), Some(7));
    }

    #[tokio::test]
    async fn launch_of_missing_binary_fails_with_not_found() {
        let spec = JobSpec::new("definitely-not-a-real-binary-4242");
        let err = launch(&spec, &ProcfsProbe::new()).unwrap_err();
        assert!(matches!(err, crate::LaunchError::NotFound(_)));
    }

    #[tokio::test]
    async fn elapsed_starts_near_zero() {
        let spec = JobSpec::new("sleep").with_args(["2"]);
        let mut handle = launch(&spec, &ProcfsProbe::new()).unwrap();
        assert!(handle.elapsed_secs() < 1.0);

        handle.start_kill().expect("kill should succeed");
        let _ = handle.wait().await;
    }
}
