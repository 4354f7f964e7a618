use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown billing mode: {0}")]
    UnknownBillingMode(String),

    #[error("invalid job spec: {0}")]
    InvalidSpec(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
