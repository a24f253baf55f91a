#![forbid(unsafe_code)]
//! tscube-planner: how a run walks the region, and how jobs are described.
//!
//! - [`chunks`]: row offsets/heights per chunk, and a memory-driven height
//!   when none is configured.
//! - [`dsl::yaml`]: YAML job documents with an optional config overlay.
//!
//! No raster I/O here; the exec crate drives the plan.

pub mod chunks;
pub mod dsl;
pub mod error;

pub use chunks::{choose_chunk_rows, Chunk, ChunkPlan};
pub use dsl::yaml::{apply_job_config, parse_yaml_job, JobConfig, JobSpec};
pub use error::PlanError;
