//! Convenient re-exports for downstream crates.

pub use crate::budget::{ChunkBudget, Reservation};
pub use crate::cell::CellType;
pub use crate::collection::{CollectionExtent, CollectionInfo, MapId, RasterMapDescriptor};
pub use crate::config::EngineConfig;
pub use crate::error::{Error, Result};
pub use crate::hash::{Hash256, RowDigest};
pub use crate::id::{ChunkId, SlotId};
pub use crate::manifest::{ManifestId, OutputRecord, RunManifest};
pub use crate::region::{Bounds, Region};
pub use crate::time::{TemporalExtent, TemporalType, Timestamp, TimestampPolicy};
