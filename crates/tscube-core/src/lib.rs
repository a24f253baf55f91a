#![forbid(unsafe_code)]
//! tscube-core: shared vocabulary for the streaming raster time-series engine.
//!
//! Everything here is pure data plus small invariant checks: the analysis
//! [`region::Region`], cell value types, timestamps, collection descriptors,
//! engine configuration, the per-chunk memory budget, hashing, and the run
//! manifest. No raster I/O and no user code live in this crate.

pub mod budget;
pub mod cell;
pub mod collection;
pub mod config;
pub mod error;
pub mod hash;
pub mod id;
pub mod manifest;
pub mod prelude;
pub mod region;
pub mod time;

pub use error::{Error, Result};

/// Engine version recorded in every run manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
