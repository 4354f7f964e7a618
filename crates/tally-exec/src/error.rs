use thiserror::Error;

/// Failure to create the child process.
///
/// A launch failure produces no job record and never touches the ledger;
/// the caller reports it and moves on.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("executable not found: {0}")]
    NotFound(String),

    #[error("permission denied executing: {0}")]
    PermissionDenied(String),

    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("spawned process for '{0}' has no pid")]
    NoPid(String),
}
