//! The user-function port.

use crate::cube::UdfData;
use crate::error::Result;
use crate::result::ResultTensor;

/// Tensors returned by one call; the first one is written.
pub type UdfOutput = Vec<ResultTensor>;

/// A function evaluated once per chunk (plus once for the probe).
///
/// Implementations must produce the same number of output slices for every
/// chunk of a run.
pub trait Udf {
    /// Stable name, used in logs, errors, and the job hash.
    fn name(&self) -> &str;

    fn apply(&self, data: UdfData) -> Result<UdfOutput>;
}

/// Adapts a closure into a [`Udf`].
pub struct FnUdf<F> {
    name: String,
    f: F,
}

impl<F> FnUdf<F>
where
    F: Fn(UdfData) -> Result<UdfOutput>,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Udf for FnUdf<F>
where
    F: Fn(UdfData) -> Result<UdfOutput>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, data: UdfData) -> Result<UdfOutput> {
        (self.f)(data)
    }
}
