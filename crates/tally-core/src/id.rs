use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global monotonically increasing sequence for job identifiers.
///
/// Local to the current governor process.
static JOB_SEQ: AtomicU64 = AtomicU64::new(1);

/// Returns next numeric sequence value.
fn next_seq() -> u64 {
    JOB_SEQ.fetch_add(1, Ordering::Relaxed)
}

/// Build a human-readable job id used in logs and reports.
///
/// Format: `job-{command}-{seq:x}`.
/// - `command` — basename of the launched executable
/// - `seq`     — per-process hex sequence
pub fn make_job_id(command: &str) -> String {
    let stem = Path::new(command)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(command);
    format!("job-{stem}-{seq:x}", seq = next_seq())
}
