use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{ModelError, ModelResult};

/// Defines how consumed CPU time is charged against the shared budget.
///
/// Modes:
/// - `FixedQuota`: a hard total of CPU-seconds shared by all jobs; once the
///   total is consumed, the governor drains and stops.
/// - `Prepaid`: a pre-funded credit of CPU-seconds debited in real time while
///   jobs run; a refused debit terminates the offending job.
/// - `Postpaid`: unbounded consumption during the run; the bill is computed
///   once at shutdown as `consumed × cost_per_second`.
///
/// The mode is fixed at startup and never changes for the lifetime of a run.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BillingMode {
    /// Shared pool of CPU-seconds with a hard ceiling.
    #[default]
    FixedQuota,
    /// Pre-funded credit debited tick by tick while jobs run.
    Prepaid,
    /// Pay-per-use; cost is settled only at shutdown.
    Postpaid,
}

impl BillingMode {
    /// Returns the mode as a static string.
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingMode::FixedQuota => "fixed-quota",
            BillingMode::Prepaid => "prepaid",
            BillingMode::Postpaid => "postpaid",
        }
    }
}

impl std::fmt::Display for BillingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingMode {
    type Err = ModelError;
    fn from_str(s: &str) -> ModelResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed-quota" | "fixed" | "quota" | "" => Ok(BillingMode::FixedQuota),
            "prepaid" | "credit" => Ok(BillingMode::Prepaid),
            "postpaid" => Ok(BillingMode::Postpaid),
            other => Err(ModelError::UnknownBillingMode(other.to_string())),
        }
    }
}
