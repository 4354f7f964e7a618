//! OS integration for the governor: launching child processes, reading their
//! resource usage, and stopping them gracefully-then-forcibly.

mod error;
pub use error::LaunchError;

mod launch;
pub use launch::{JobHandle, launch};

pub mod probe;
pub use probe::{ProbeError, ProcessProbe, ProcfsProbe};

mod signal;
pub use signal::escalate;
