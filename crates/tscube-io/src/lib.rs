//! tscube-io: the surrounding GIS system as seen by the engine.
//!
//! - [`metadata::MetadataStore`]: collection lookup, member listing, registration.
//! - [`raster::RasterStore`]: row-granular raster readers and writers.
//! - [`raster::RegionSource`]: the active analysis window.
//! - [`memory::MemoryBackend`]: thread-safe in-memory implementation of all three.

pub mod error;
pub mod filter;
pub mod memory;
pub mod metadata;
pub mod raster;

pub use error::{IoError, Result};
pub use filter::MemberFilter;
pub use memory::MemoryBackend;
pub use metadata::{MemberOrder, MetadataStore, UpsertOutcome};
pub use raster::{RasterInfo, RasterStore, RegionSource, RowReader, RowWriter};
