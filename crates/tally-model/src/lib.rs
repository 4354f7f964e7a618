mod error;
pub use error::{ModelError, ModelResult};

mod billing;
pub use billing::BillingMode;

mod status;
pub use status::JobStatus;

mod spec;
pub use spec::JobSpec;

mod result;
pub use result::JobResult;

mod report;
pub use report::{JobReport, LedgerSummary};
