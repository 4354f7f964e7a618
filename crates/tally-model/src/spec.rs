use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Declarative description of a job to launch and govern.
///
/// A `JobSpec` is immutable once created: it describes *what* to run and the
/// per-job limits the monitor enforces. All limits are optional; `None` means
/// "no explicit limit" for that resource (the shared budget still applies).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    /// Command to execute (e.g. `"ls"`, `"/usr/bin/python"`).
    pub command: String,
    /// Command-line arguments passed to the command.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Per-job cap on cumulative CPU time (user + system), in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_limit_secs: Option<f64>,
    /// Wall-clock timeout measured from launch, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<f64>,
    /// Cap on peak resident memory, in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit_bytes: Option<u64>,
}

impl JobSpec {
    /// Create a spec with no arguments and no limits.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            cpu_limit_secs: None,
            timeout_secs: None,
            memory_limit_bytes: None,
        }
    }

    /// Builder-style helper: set the argument list.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style helper: set the per-job CPU limit in seconds.
    pub fn with_cpu_limit(mut self, secs: f64) -> Self {
        self.cpu_limit_secs = Some(secs);
        self
    }

    /// Builder-style helper: set the wall-clock timeout in seconds.
    pub fn with_timeout(mut self, secs: f64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Builder-style helper: set the memory limit in bytes.
    pub fn with_memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit_bytes = Some(bytes);
        self
    }

    /// Validate the spec before launch.
    ///
    /// Rules:
    /// - `command` is not empty or whitespace-only;
    /// - every limit, when present, is positive and finite.
    pub fn validate(&self) -> ModelResult<()> {
        if self.command.trim().is_empty() {
            return Err(ModelError::InvalidSpec("command is empty".into()));
        }
        if let Some(cpu) = self.cpu_limit_secs {
            if !cpu.is_finite() || cpu <= 0.0 {
                return Err(ModelError::InvalidSpec(format!(
                    "cpu limit must be positive, got {cpu}"
                )));
            }
        }
        if let Some(timeout) = self.timeout_secs {
            if !timeout.is_finite() || timeout <= 0.0 {
                return Err(ModelError::InvalidSpec(format!(
                    "timeout must be positive, got {timeout}"
                )));
            }
        }
        if let Some(mem) = self.memory_limit_bytes {
            if mem == 0 {
                return Err(ModelError::InvalidSpec("memory limit cannot be zero".into()));
            }
        }
        Ok(())
    }
}
