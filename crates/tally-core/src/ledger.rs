//! Shared CPU-time ledger.
//!
//! One `Ledger` exists per governor run. It is the only state mutated by more
//! than one task: every monitor task charges its job's CPU time here, and the
//! governor loop reads it to decide between admission and shutdown. All
//! mutation goes through a single mutex held only for the arithmetic — never
//! across I/O or sleeps.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;

use tally_model::{BillingMode, LedgerSummary};

/// Thread-safe store of consumed and available CPU-seconds across all jobs.
///
/// The billing mode decides which operation callers use:
/// - `Prepaid` monitors call [`Ledger::try_debit`] every tick;
/// - `FixedQuota`/`Postpaid` CPU time is folded in once per job via
///   [`Ledger::accumulate`] when the governor reaps it.
///
/// Ledger arithmetic never fails: a debit either succeeds or is refused, and
/// both are defined outcomes.
pub struct Ledger {
    mode: BillingMode,
    budget_secs: f64,
    cost_per_second: f64,
    consumed_secs: Mutex<f64>,
}

impl Ledger {
    /// Ledger for a hard total of `budget_secs` CPU-seconds.
    pub fn fixed_quota(budget_secs: f64) -> Self {
        Self::build(BillingMode::FixedQuota, budget_secs, 1.0)
    }

    /// Ledger for a pre-funded credit of `credit_secs` CPU-seconds.
    pub fn prepaid(credit_secs: f64, cost_per_second: f64) -> Self {
        Self::build(BillingMode::Prepaid, credit_secs, cost_per_second)
    }

    /// Ledger with no spending ceiling; the bill is settled at shutdown.
    pub fn postpaid(cost_per_second: f64) -> Self {
        Self::build(BillingMode::Postpaid, f64::INFINITY, cost_per_second)
    }

    fn build(mode: BillingMode, budget_secs: f64, cost_per_second: f64) -> Self {
        Self {
            mode,
            budget_secs,
            cost_per_second,
            consumed_secs: Mutex::new(0.0),
        }
    }

    pub fn mode(&self) -> BillingMode {
        self.mode
    }

    pub fn budget_secs(&self) -> f64 {
        self.budget_secs
    }

    /// Debit `amount` CPU-seconds from the remaining credit.
    ///
    /// Succeeds iff the remaining credit covers the full amount; a refused
    /// debit leaves the ledger untouched and is the caller's signal to stop
    /// its job. The balance can never go negative.
    pub fn try_debit(&self, amount: f64) -> bool {
        let amount = amount.max(0.0);
        let mut consumed = self.cell();
        if self.budget_secs - *consumed >= amount {
            *consumed += amount;
            true
        } else {
            trace!(amount, consumed = *consumed, "debit refused; credit exhausted");
            false
        }
    }

    /// Unconditionally add `amount` CPU-seconds to the consumed total.
    pub fn accumulate(&self, amount: f64) {
        let mut consumed = self.cell();
        *consumed += amount.max(0.0);
        trace!(amount, consumed = *consumed, "cpu time folded into ledger");
    }

    /// CPU-seconds charged so far.
    pub fn consumed_secs(&self) -> f64 {
        *self.cell()
    }

    /// Budget still available, clamped at zero.
    ///
    /// FixedQuota tolerates a bounded overshoot (at most one job's worth), so
    /// the raw difference may dip below zero; the reported balance does not.
    pub fn remaining_secs(&self) -> f64 {
        (self.budget_secs - self.consumed_secs()).max(0.0)
    }

    /// Whether the consumed total reached the budget.
    ///
    /// Never true for postpaid (its budget is unbounded).
    pub fn is_exhausted(&self) -> bool {
        self.consumed_secs() >= self.budget_secs
    }

    /// Whether charging `extra_secs` on top of the current total would
    /// overrun the budget.
    pub fn would_exceed(&self, extra_secs: f64) -> bool {
        self.consumed_secs() + extra_secs > self.budget_secs
    }

    /// Live snapshot for status reporting; no bill is computed mid-run.
    pub fn snapshot(&self) -> LedgerSummary {
        self.summarize(None)
    }

    /// Closing summary emitted once at shutdown.
    ///
    /// Only here is the postpaid bill computed: `consumed × cost_per_second`.
    pub fn final_summary(&self) -> LedgerSummary {
        let bill = match self.mode {
            BillingMode::Postpaid => Some(self.consumed_secs() * self.cost_per_second),
            _ => None,
        };
        self.summarize(bill)
    }

    fn summarize(&self, total_bill: Option<f64>) -> LedgerSummary {
        let consumed_secs = self.consumed_secs();
        LedgerSummary {
            mode: self.mode,
            budget_secs: self.budget_secs,
            consumed_secs,
            remaining_secs: (self.budget_secs - consumed_secs).max(0.0),
            cost_per_second: self.cost_per_second,
            total_bill,
        }
    }

    /// The critical section is plain arithmetic, so a poisoned lock only
    /// means some other task panicked mid-update; the value itself is fine.
    fn cell(&self) -> MutexGuard<'_, f64> {
        self.consumed_secs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::Ledger;
    use tally_model::BillingMode;

    #[test]
    fn debit_succeeds_until_credit_runs_out() {
        let ledger = Ledger::prepaid(2.0, 1.0);

        assert!(ledger.try_debit(1.5));
        assert!(!ledger.try_debit(1.0), "only 0.5s of credit remains");
        assert!(ledger.try_debit(0.5));
        assert!(!ledger.try_debit(0.001));

        assert!(ledger.remaining_secs() >= 0.0);
        assert_eq!(ledger.consumed_secs(), 2.0);
    }

    #[test]
    fn refused_debit_does_not_mutate() {
        let ledger = Ledger::prepaid(1.0, 1.0);
        assert!(!ledger.try_debit(5.0));
        assert_eq!(ledger.consumed_secs(), 0.0);
        assert_eq!(ledger.remaining_secs(), 1.0);
    }

    #[test]
    fn accumulate_conserves_individual_usages() {
        let ledger = Ledger::fixed_quota(100.0);
        let usages = [1.25, 0.5, 3.0, 0.0];
        for c in usages {
            ledger.accumulate(c);
        }
        assert!((ledger.consumed_secs() - usages.iter().sum::<f64>()).abs() < 1e-9);
    }

    #[test]
    fn fixed_quota_tolerates_overshoot_but_reports_exhaustion() {
        let ledger = Ledger::fixed_quota(5.0);
        ledger.accumulate(6.0); // one job finished over budget

        assert!(ledger.is_exhausted());
        assert_eq!(ledger.remaining_secs(), 0.0);
        assert_eq!(ledger.consumed_secs(), 6.0);
    }

    #[test]
    fn projection_flags_an_overrun_before_it_is_folded_in() {
        let ledger = Ledger::fixed_quota(5.0);
        ledger.accumulate(4.0);

        assert!(!ledger.would_exceed(1.0));
        assert!(ledger.would_exceed(1.5));
    }

    #[test]
    fn postpaid_is_never_exhausted_and_bills_only_at_close() {
        let ledger = Ledger::postpaid(1.2);
        ledger.accumulate(1.5);
        ledger.accumulate(2.5);

        assert!(!ledger.is_exhausted());
        assert_eq!(ledger.snapshot().total_bill, None);

        let summary = ledger.final_summary();
        assert_eq!(summary.mode, BillingMode::Postpaid);
        assert!((summary.total_bill.unwrap() - 4.0 * 1.2).abs() < 1e-9);
    }

    #[test]
    fn negative_amounts_are_clamped() {
        let ledger = Ledger::fixed_quota(1.0);
        ledger.accumulate(-3.0);
        assert_eq!(ledger.consumed_secs(), 0.0);
        assert!(ledger.try_debit(-1.0));
        assert_eq!(ledger.consumed_secs(), 0.0);
    }
}
