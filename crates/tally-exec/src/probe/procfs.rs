//! procfs-backed [`ProcessProbe`].
//!
//! - On **Linux**, CPU time comes from `/proc/<pid>/stat` (utime + stime
//!   ticks divided by `sysconf(_SC_CLK_TCK)`) and resident memory from
//!   `/proc/<pid>/statm` (resident pages times the page size).
//! - On **other platforms**, per-process metrics are not available through
//!   this probe; every read returns [`ProbeError::Unavailable`] and the
//!   monitor degrades to liveness/wall-clock tracking only.

use crate::probe::{ProbeError, ProcessProbe};

/// Probe that reads per-process metrics from `/proc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcfsProbe;

impl ProcfsProbe {
    /// Create a new procfs probe.
    pub fn new() -> Self {
        Self
    }
}

impl ProcessProbe for ProcfsProbe {
    fn cpu_seconds(&self, pid: u32) -> Result<f64, ProbeError> {
        #[cfg(target_os = "linux")]
        {
            linux_impl::cpu_seconds(pid)
        }
        #[cfg(not(target_os = "linux"))]
        {
            let _ = pid;
            Err(ProbeError::Unavailable(
                "per-process cpu time requires procfs".into(),
            ))
        }
    }

    fn rss_bytes(&self, pid: u32) -> Result<u64, ProbeError> {
        #[cfg(target_os = "linux")]
        {
            linux_impl::rss_bytes(pid)
        }
        #[cfg(not(target_os = "linux"))]
        {
            let _ = pid;
            Err(ProbeError::Unavailable(
                "per-process resident memory requires procfs".into(),
            ))
        }
    }
}

#[cfg(target_os = "linux")]
mod linux_impl {
    use std::io::Read;
    use std::sync::OnceLock;

    use super::ProbeError;

    /// Upper bound on `/proc` file reads; stat/statm are well under 1 KiB.
    const MAX_PROC_READ: u64 = 4096;

    pub fn cpu_seconds(pid: u32) -> Result<f64, ProbeError> {
        let stat = read_bounded(&format!("/proc/{pid}/stat"))?;

        // Fields after the comm close paren; comm itself may contain spaces.
        let (_, rest) = stat
            .rsplit_once(')')
            .ok_or_else(|| ProbeError::Unavailable(format!("malformed /proc/{pid}/stat")))?;
        let fields: Vec<&str> = rest.split_whitespace().collect();

        // utime and stime are stat fields 14 and 15 (1-indexed); `rest`
        // starts at field 3 (state).
        let utime: u64 = parse_field(&fields, 11, pid)?;
        let stime: u64 = parse_field(&fields, 12, pid)?;

        Ok((utime + stime) as f64 / clock_ticks_per_second())
    }

    pub fn rss_bytes(pid: u32) -> Result<u64, ProbeError> {
        let statm = read_bounded(&format!("/proc/{pid}/statm"))?;

        let resident_pages: u64 = statm
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ProbeError::Unavailable(format!("malformed /proc/{pid}/statm")))?;

        Ok(resident_pages * page_size())
    }

    fn parse_field(fields: &[&str], index: usize, pid: u32) -> Result<u64, ProbeError> {
        fields
            .get(index)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ProbeError::Unavailable(format!("malformed /proc/{pid}/stat")))
    }

    fn read_bounded(path: &str) -> Result<String, ProbeError> {
        let file = std::fs::File::open(path).map_err(map_io)?;
        let mut contents = String::new();
        file.take(MAX_PROC_READ)
            .read_to_string(&mut contents)
            .map_err(map_io)?;
        Ok(contents)
    }

    /// A vanished pid shows up as NotFound (the `/proc/<pid>` directory is
    /// gone) or ESRCH; everything else is a transient read failure.
    fn map_io(e: std::io::Error) -> ProbeError {
        match e.kind() {
            std::io::ErrorKind::NotFound => ProbeError::Gone,
            _ if e.raw_os_error() == Some(libc::ESRCH) => ProbeError::Gone,
            _ => ProbeError::Unavailable(e.to_string()),
        }
    }

    fn clock_ticks_per_second() -> f64 {
        static TICKS: OnceLock<f64> = OnceLock::new();
        *TICKS.get_or_init(|| {
            let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
            if ticks > 0 { ticks as f64 } else { 100.0 }
        })
    }

    fn page_size() -> u64 {
        static PAGE: OnceLock<u64> = OnceLock::new();
        *PAGE.get_or_init(|| {
            let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
            if page > 0 { page as u64 } else { 4096 }
        })
    }
}
