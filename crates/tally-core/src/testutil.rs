//! Scripted probe for deterministic monitor and governor tests.

use std::collections::HashMap;
use std::sync::Mutex;

use tally_exec::{ProbeError, ProcessProbe};

enum CpuScript {
    /// CPU grows by a fixed step on every read.
    Stepping(f64),
    /// CPU reads a fixed value (after the zero baseline read).
    Flat(f64),
}

/// Probe whose readings follow a script instead of a real process.
///
/// The first CPU read per pid returns zero, matching the baseline read the
/// launcher performs; later reads follow the script. RSS is constant.
pub(crate) struct ScriptedProbe {
    cpu: CpuScript,
    rss_bytes: u64,
    /// CPU reads beyond this count return `Unavailable`.
    cpu_reads_before_outage: Option<u64>,
    reads: Mutex<HashMap<u32, u64>>,
}

impl ScriptedProbe {
    pub(crate) fn stepping(cpu_step_secs: f64, rss_bytes: u64) -> Self {
        Self {
            cpu: CpuScript::Stepping(cpu_step_secs),
            rss_bytes,
            cpu_reads_before_outage: None,
            reads: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn flat(cpu_secs: f64, rss_bytes: u64) -> Self {
        Self {
            cpu: CpuScript::Flat(cpu_secs),
            rss_bytes,
            cpu_reads_before_outage: None,
            reads: Mutex::new(HashMap::new()),
        }
    }

    /// Stepping CPU whose reads start failing after `ok_reads` successes,
    /// as if the metric source became unreadable mid-run.
    pub(crate) fn stepping_with_outage(cpu_step_secs: f64, rss_bytes: u64, ok_reads: u64) -> Self {
        Self {
            cpu: CpuScript::Stepping(cpu_step_secs),
            rss_bytes,
            cpu_reads_before_outage: Some(ok_reads),
            reads: Mutex::new(HashMap::new()),
        }
    }
}

impl ProcessProbe for ScriptedProbe {
    fn cpu_seconds(&self, pid: u32) -> Result<f64, ProbeError> {
        let mut reads = self.reads.lock().expect("test probe lock");
        let count = reads.entry(pid).or_insert(0);
        if let Some(limit) = self.cpu_reads_before_outage {
            if *count >= limit {
                return Err(ProbeError::Unavailable("scripted outage".into()));
            }
        }
        let value = match self.cpu {
            CpuScript::Stepping(step) => *count as f64 * step,
            CpuScript::Flat(secs) => {
                if *count == 0 {
                    0.0
                } else {
                    secs
                }
            }
        };
        *count += 1;
        Ok(value)
    }

    fn rss_bytes(&self, _pid: u32) -> Result<u64, ProbeError> {
        Ok(self.rss_bytes)
    }
}
