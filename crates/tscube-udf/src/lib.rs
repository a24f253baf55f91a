#![forbid(unsafe_code)]
//! tscube-udf: the boundary between the engine and user code.
//!
//! Design intent:
//! - User functions see chunk-scoped [`cube::DataCube`]s, never whole rasters.
//! - Results are a tagged [`result::ResultTensor`] normalized right after the
//!   call, so the engine only ever handles a `(slices, rows, cols)` stack.
//! - Calls are synchronous and unsandboxed; the caller owns that trust boundary.

pub mod builtins;
pub mod cube;
pub mod error;
pub mod registry;
pub mod result;
pub mod traits;

pub use builtins::{PassThrough, Reducer, TimeReduce};
pub use cube::{DataCube, UdfData};
pub use error::UdfError;
pub use registry::Registry;
pub use result::{NormalizedResult, ResultTensor};
pub use traits::{FnUdf, Udf, UdfOutput};
