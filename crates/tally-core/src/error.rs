use thiserror::Error;

use tally_model::ModelError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid governor configuration: {0}")]
    InvalidConfig(String),

    #[error("model error: {0}")]
    Model(#[from] ModelError),
}
