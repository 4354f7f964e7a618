//! Per-process resource measurement.
//!
//! The monitor loop reads CPU time and resident memory through the
//! [`ProcessProbe`] trait so tests can script measurements without real
//! processes. The production implementation reads procfs; see [`ProcfsProbe`].

mod procfs;
pub use procfs::ProcfsProbe;

use thiserror::Error;

/// Why a measurement could not be taken.
///
/// `Gone` is not a fault: the process exited between the liveness check and
/// the metric read, and the monitor treats it as normal completion.
/// `Unavailable` is transient (permissions, parse trouble); the monitor logs
/// it and keeps the last known values.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("process no longer exists")]
    Gone,

    #[error("metric unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view of one process's resource usage.
///
/// Implementations must be cheap enough to call once per sampling tick and
/// must distinguish a vanished process from a failed read.
pub trait ProcessProbe: Send + Sync {
    /// Cumulative CPU time (user + system) consumed by `pid`, in seconds,
    /// since the process started.
    fn cpu_seconds(&self, pid: u32) -> Result<f64, ProbeError>;

    /// Current resident memory of `pid`, in bytes.
    fn rss_bytes(&self, pid: u32) -> Result<u64, ProbeError>;
}
