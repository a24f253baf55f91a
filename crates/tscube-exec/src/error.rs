use thiserror::Error;

use tscube_io::IoError;
use tscube_planner::PlanError;
use tscube_udf::UdfError;

/// Every failure is fatal to the run. Output maps opened before the failure
/// are closed with whatever rows they received; nothing is rolled back.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("function produced no output slices on the probe chunk")]
    NoOutputs,

    #[error("cardinality changed at {at}: expected {expected} output slices, found {found}")]
    Cardinality {
        at: String,
        expected: usize,
        found: usize,
    },

    #[error("shape error at {at}: {detail}")]
    Shape { at: String, detail: String },

    #[error("function '{udf}' failed at {at}: {source}")]
    Udf {
        udf: String,
        at: String,
        source: UdfError,
    },

    #[error("unknown function '{0}'")]
    Registry(String),

    #[error("{0}")]
    Budget(tscube_core::Error),

    #[error("finalize: {0}")]
    Finalize(String),

    #[error("invalid state: {0}")]
    Invariant(String),

    #[error("hashing error: {0}")]
    Hash(String),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Core(tscube_core::Error),
}

impl From<tscube_core::Error> for ExecError {
    fn from(e: tscube_core::Error) -> Self {
        match e {
            e @ tscube_core::Error::BudgetExceeded { .. } => ExecError::Budget(e),
            other => ExecError::Core(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExecError>;
