//! Time-series metadata store interface.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use tscube_core::collection::{CollectionExtent, CollectionInfo, MapId, RasterMapDescriptor};
use tscube_core::time::TemporalExtent;

use crate::error::{IoError, Result};
use crate::filter::MemberFilter;

/// Ordering applied to listed members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberOrder {
    #[default]
    StartTime,
    Name,
}

impl FromStr for MemberOrder {
    type Err = IoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "start_time" => Ok(MemberOrder::StartTime),
            "name" | "id" => Ok(MemberOrder::Name),
            other => Err(IoError::Filter(format!("unknown member order '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Catalogue of collections and their members.
///
/// Implementations decide their own locking; the engine calls these methods
/// from a single thread.
pub trait MetadataStore {
    fn collection(&self, name: &str) -> Result<CollectionInfo>;

    /// Members of `collection` passing `filter`, sorted by `order`.
    fn list_members(
        &self,
        collection: &str,
        filter: &MemberFilter,
        order: MemberOrder,
    ) -> Result<Vec<RasterMapDescriptor>>;

    /// Create an empty collection. An existing one is replaced only with `overwrite`.
    fn create_collection(&self, info: &CollectionInfo, overwrite: bool) -> Result<()>;

    /// Insert or update a map's metadata record.
    fn upsert_map(&self, map: &RasterMapDescriptor) -> Result<UpsertOutcome>;

    /// Attach an existing map to `collection` with the given valid time.
    fn register_member(
        &self,
        collection: &str,
        map: &MapId,
        extent: TemporalExtent,
        semantic_label: Option<&str>,
    ) -> Result<()>;

    /// Recompute and store the aggregate extent from the current members.
    fn recompute_extent(&self, collection: &str) -> Result<CollectionExtent>;
}
