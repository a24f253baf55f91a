#![forbid(unsafe_code)]
//! tscube-exec: the streaming runtime.
//!
//! One run binds every input collection to the active region, probes the user
//! function on row 0 to learn how many outputs it produces, then walks the
//! region chunk by chunk (assemble, call, write) and finally registers the
//! outputs as a new collection. Everything is sequential and synchronous.

pub mod assembler;
pub mod binder;
pub mod error;
pub mod failpoints;
pub mod finalizer;
pub mod invoke;
pub mod metrics;
pub mod replay;
pub mod runtime;
pub mod stream;
pub mod writer;

pub use error::ExecError;
pub use runtime::{Backends, Engine, RunReport, RunRequest};
