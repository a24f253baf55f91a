//! Time-series collection metadata: map descriptors, collection info, and
//! the aggregate extent recomputed after registration.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cell::CellType;
use crate::region::Bounds;
use crate::time::{TemporalExtent, TemporalType, Timestamp};

/// Identifier of one raster map in the external store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapId(String);

impl MapId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MapId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One member of a time-series collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterMapDescriptor {
    pub id: MapId,
    pub extent: TemporalExtent,
    pub cell_type: CellType,
    #[serde(default)]
    pub semantic_label: Option<String>,
}

/// Identity and presentation fields of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub temporal_type: TemporalType,
    pub title: String,
    pub description: String,
    pub semantic_type: String,
}

impl CollectionInfo {
    pub fn new(name: impl Into<String>, temporal_type: TemporalType) -> Self {
        Self {
            name: name.into(),
            temporal_type,
            title: String::new(),
            description: String::new(),
            semantic_type: "mean".into(),
        }
    }
}

/// Aggregate temporal/spatial extent of a collection's current members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionExtent {
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
    pub map_count: usize,
    pub bounds: Option<Bounds>,
}

impl CollectionExtent {
    /// Fold member extents: earliest start, latest end-or-start.
    pub fn from_members<'a, I>(members: I) -> Self
    where
        I: IntoIterator<Item = (&'a RasterMapDescriptor, Option<Bounds>)>,
    {
        let mut out = CollectionExtent {
            start: None,
            end: None,
            map_count: 0,
            bounds: None,
        };
        for (m, b) in members {
            out.map_count += 1;
            let start = m.extent.start;
            let end = m.extent.latest();
            out.start = Some(out.start.map_or(start, |s| s.min(start)));
            out.end = Some(out.end.map_or(end, |e| e.max(end)));
            if let Some(b) = b {
                out.bounds = Some(out.bounds.map_or(b, |acc| acc.union(&b)));
            }
        }
        out
    }
}
