use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid job document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid job: {0}")]
    Invalid(String),

    #[error("chunk height must be at least 1")]
    ZeroChunkRows,

    #[error(transparent)]
    Core(#[from] tscube_core::Error),
}
