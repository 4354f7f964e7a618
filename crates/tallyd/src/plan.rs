//! Run plan: the JSON file describing one governed run.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tally_core::Ledger;
use tally_model::{BillingMode, JobSpec};

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to read plan file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse plan file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("billing mode {0} requires a budgetSecs value")]
    MissingBudget(BillingMode),
}

/// Everything one run needs: billing setup, timing knobs, and the job list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunPlan {
    /// Billing mode for the shared ledger.
    pub mode: BillingMode,
    /// Total quota (fixed-quota) or initial credit (prepaid) in CPU-seconds.
    /// Ignored for postpaid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_secs: Option<f64>,
    /// Price of one CPU-second.
    #[serde(default = "default_cost_per_second")]
    pub cost_per_second: f64,
    /// Sampling period of every monitor, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Grace interval between SIGTERM and SIGKILL, in milliseconds.
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
    /// Jobs to run, in order.
    pub jobs: Vec<JobSpec>,
}

fn default_cost_per_second() -> f64 {
    1.0
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_grace_ms() -> u64 {
    500
}

impl RunPlan {
    /// Reads and parses a plan file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Builds the ledger this plan asks for.
    ///
    /// Fixed-quota and prepaid plans must carry a budget; postpaid plans
    /// ignore one if present.
    pub fn build_ledger(&self) -> Result<Ledger, PlanError> {
        match self.mode {
            BillingMode::FixedQuota => {
                let budget = self.budget_secs.ok_or(PlanError::MissingBudget(self.mode))?;
                Ok(Ledger::fixed_quota(budget))
            }
            BillingMode::Prepaid => {
                let credit = self.budget_secs.ok_or(PlanError::MissingBudget(self.mode))?;
                Ok(Ledger::prepaid(credit, self.cost_per_second))
            }
            BillingMode::Postpaid => Ok(Ledger::postpaid(self.cost_per_second)),
        }
    }
}
