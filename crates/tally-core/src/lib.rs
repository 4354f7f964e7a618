//! Concurrent monitoring engine: the shared billing ledger, one monitor task
//! per running job, and the governor loop that arbitrates admission versus
//! system-wide shutdown.

mod error;
pub use error::CoreError;

mod id;
pub use id::make_job_id;

mod ledger;
pub use ledger::Ledger;

mod monitor;

mod governor;
pub use governor::{Governor, GovernorConfig};

mod source;
pub use source::{JobSource, QueueSource};

mod report;
pub use report::{LogReporter, Reporter};

#[cfg(test)]
mod testutil;
