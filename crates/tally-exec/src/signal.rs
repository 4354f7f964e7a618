//! Graceful-then-forceful termination of a job process.
//!
//! On Unix the escalation sends SIGTERM, waits a bounded grace interval for a
//! voluntary exit, then SIGKILLs. Elsewhere there is no graceful signal to
//! send, so the process is killed directly after the grace interval.
//!
//! Signalling errors (process already gone, permission denied) are logged and
//! treated as success: either way the job is considered stopped.

use std::process::ExitStatus;
use std::time::Duration;

use tracing::debug;

use crate::JobHandle;

/// Stop the child behind `handle`, gently first.
///
/// Returns the exit status when the child could still be reaped. Callers
/// invoke this at most once per job.
pub async fn escalate(handle: &mut JobHandle, grace: Duration) -> Option<ExitStatus> {
    let pid = handle.pid();
    send_graceful_stop(pid);

    match tokio::time::timeout(grace, handle.wait()).await {
        Ok(Ok(status)) => {
            debug!(pid, %status, "process exited after graceful stop");
            Some(status)
        }
        Ok(Err(e)) => {
            debug!(pid, error = %e, "wait after graceful stop failed; treating as stopped");
            None
        }
        Err(_) => {
            debug!(pid, "process survived graceful stop; killing");
            if let Err(e) = handle.start_kill() {
                debug!(pid, error = %e, "kill failed; process is already gone");
            }
            // SIGKILL cannot be ignored; reap without a further deadline.
            match handle.wait().await {
                Ok(status) => Some(status),
                Err(e) => {
                    debug!(pid, error = %e, "could not reap killed process");
                    None
                }
            }
        }
    }
}

#[cfg(unix)]
fn send_graceful_stop(pid: u32) {
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc != 0 {
        let e = std::io::Error::last_os_error();
        debug!(pid, error = %e, "SIGTERM failed; treating as already stopped");
    }
}

#[cfg(not(unix))]
fn send_graceful_stop(pid: u32) {
    tracing::warn!(pid, "no graceful stop signal on this platform; will kill directly");
}

#[cfg(test)]
mod tests {
    use super::escalate;
    use crate::{launch, probe::ProcfsProbe};
    use std::time::{Duration, Instant};
    use tally_model::JobSpec;

    #[tokio::test]
    async fn sigterm_stops_a_cooperative_process() {
        let spec = JobSpec::new("sleep").with_args(["30"]);
        let mut handle = launch(&spec, &ProcfsProbe::new()).unwrap();

        let started = Instant::now();
        escalate(&mut handle, Duration::from_millis(500)).await;

        assert!(
            started.elapsed() < Duration::from_secs(5),
            "escalation must not wait for the full sleep"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn kill_follows_when_sigterm_is_ignored() {
        // The child traps TERM, so only the forceful kill can stop it.
        let spec = JobSpec::new("sh").with_args(["-c", "trap '' TERM; sleep 30"]);
        let mut handle = launch(&spec, &ProcfsProbe::new()).unwrap();

        let started = Instant::now();
        let status = escalate(&mut handle, Duration::from_millis(200)).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        if let Some(status) = status {
            assert!(!status.success());
        }
    }

    #[tokio::test]
    async fn escalating_an_already_dead_process_is_not_an_error() {
        let spec = JobSpec::new("sh").with_args(["-c", "exit 0"]);
        let mut handle = launch(&spec, &ProcfsProbe::new()).unwrap();
        let _ = handle.wait().await;

        // Process is reaped; both signals hit nothing and that is fine.
        escalate(&mut handle, Duration::from_millis(100)).await;
    }
}
