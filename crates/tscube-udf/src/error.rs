use thiserror::Error;

pub type Result<T> = std::result::Result<T, UdfError>;

#[derive(Debug, Error)]
pub enum UdfError {
    #[error("user function failed: {0}")]
    Failed(String),

    #[error("shape error: {0}")]
    Shape(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
