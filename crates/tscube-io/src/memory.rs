//! In-memory backend for tests and embedding.
//!
//! Implements [`MetadataStore`], [`RasterStore`], and [`RegionSource`] over a
//! shared `Arc<Mutex<..>>`, so clones observe the same rasters and catalogue.
//! Writers buffer their rows and commit them on `close`; a writer dropped
//! without `close` still commits the rows it received.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tscube_core::cell::CellType;
use tscube_core::collection::{CollectionExtent, CollectionInfo, MapId, RasterMapDescriptor};
use tscube_core::region::Region;
use tscube_core::time::{TemporalExtent, Timestamp};

use crate::error::{IoError, Result};
use crate::filter::MemberFilter;
use crate::metadata::{MemberOrder, MetadataStore, UpsertOutcome};
use crate::raster::{RasterInfo, RasterStore, RegionSource, RowReader, RowWriter};

struct StoredRaster {
    cell_type: CellType,
    region: Region,
    rows: Vec<Vec<f64>>,
}

struct StoredCollection {
    info: CollectionInfo,
    members: Vec<MapId>,
    extent: Option<CollectionExtent>,
}

#[derive(Default)]
struct State {
    region: Option<Region>,
    rasters: HashMap<MapId, StoredRaster>,
    maps: HashMap<MapId, RasterMapDescriptor>,
    collections: HashMap<String, StoredCollection>,
    read_failures: HashSet<(MapId, usize)>,
    open_readers: usize,
    open_writers: usize,
}

/// Thread-safe in-memory raster store and catalogue.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

fn lock(state: &Mutex<State>) -> Result<MutexGuard<'_, State>> {
    state
        .lock()
        .map_err(|_| IoError::Backend("memory backend lock poisoned".into()))
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(region: Region) -> Self {
        let backend = Self::new();
        if let Ok(mut st) = backend.state.lock() {
            st.region = Some(region);
        }
        backend
    }

    pub fn set_region(&self, region: Region) -> Result<()> {
        lock(&self.state)?.region = Some(region);
        Ok(())
    }

    /// Store a raster from explicit rows (`region.rows` rows of `region.cols` cells).
    pub fn put_raster(
        &self,
        name: &str,
        cell_type: CellType,
        region: Region,
        rows: Vec<Vec<f64>>,
    ) -> Result<()> {
        let id = MapId::new(name);
        if rows.len() != region.rows {
            return Err(IoError::ShapeMismatch {
                map: id,
                rows: region.rows,
                cols: region.cols,
                found_rows: rows.len(),
                found_cols: rows.first().map_or(0, Vec::len),
            });
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != region.cols) {
            return Err(IoError::RowLength {
                map: id,
                expected: region.cols,
                found: bad.len(),
            });
        }
        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(|v| cell_type.coerce(v)).collect())
            .collect();
        lock(&self.state)?.rasters.insert(
            id,
            StoredRaster {
                cell_type,
                region,
                rows,
            },
        );
        Ok(())
    }

    /// Store a raster filled with `value` over the active region.
    pub fn put_constant_raster(&self, name: &str, cell_type: CellType, value: f64) -> Result<()> {
        let region = self.active_region()?;
        let rows = vec![vec![value; region.cols]; region.rows];
        self.put_raster(name, cell_type, region, rows)
    }

    /// Register existing rasters into `collection` as consecutive intervals of
    /// `step_seconds`, starting at `start`. A zero step registers instants.
    pub fn register_series(
        &self,
        collection: &str,
        maps: &[&str],
        start: Timestamp,
        step_seconds: i64,
    ) -> Result<()> {
        let mut t = start;
        for name in maps {
            let id = MapId::new(*name);
            let cell_type = self.describe(&id)?.cell_type;
            let extent = if step_seconds == 0 {
                TemporalExtent::instant(t)
            } else {
                TemporalExtent::interval(t, t.checked_add_seconds(step_seconds)?)?
            };
            self.upsert_map(&RasterMapDescriptor {
                id: id.clone(),
                extent,
                cell_type,
                semantic_label: None,
            })?;
            self.register_member(collection, &id, extent, None)?;
            t = t.checked_add_seconds(step_seconds)?;
        }
        self.recompute_extent(collection)?;
        Ok(())
    }

    /// All rows of a stored raster.
    pub fn raster_rows(&self, name: &str) -> Result<Vec<Vec<f64>>> {
        let st = lock(&self.state)?;
        st.rasters
            .get(&MapId::new(name))
            .map(|r| r.rows.clone())
            .ok_or_else(|| IoError::MapNotFound(MapId::new(name)))
    }

    /// (min, max) over non-null cells.
    pub fn raster_range(&self, name: &str) -> Result<(f64, f64)> {
        let info = self.describe(&MapId::new(name))?;
        match (info.min, info.max) {
            (Some(lo), Some(hi)) => Ok((lo, hi)),
            _ => Err(IoError::Backend(format!("raster '{name}' has no non-null cells"))),
        }
    }

    /// Make `read_row(row)` on `map` fail from now on.
    pub fn fail_read(&self, map: &str, row: usize) -> Result<()> {
        lock(&self.state)?.read_failures.insert((MapId::new(map), row));
        Ok(())
    }

    pub fn has_raster(&self, name: &str) -> bool {
        lock(&self.state).is_ok_and(|st| st.rasters.contains_key(&MapId::new(name)))
    }

    pub fn has_collection(&self, name: &str) -> bool {
        lock(&self.state).is_ok_and(|st| st.collections.contains_key(name))
    }

    /// Members of `name` in start-time order.
    pub fn collection_members(&self, name: &str) -> Result<Vec<RasterMapDescriptor>> {
        self.list_members(name, &MemberFilter::all(), MemberOrder::StartTime)
    }

    /// Extent stored by the last `recompute_extent`.
    pub fn collection_extent(&self, name: &str) -> Option<CollectionExtent> {
        lock(&self.state)
            .ok()
            .and_then(|st| st.collections.get(name).and_then(|c| c.extent.clone()))
    }

    /// Readers currently open (not yet closed or dropped).
    pub fn open_readers(&self) -> usize {
        lock(&self.state).map_or(0, |st| st.open_readers)
    }

    pub fn open_writers(&self) -> usize {
        lock(&self.state).map_or(0, |st| st.open_writers)
    }
}

impl RegionSource for MemoryBackend {
    fn active_region(&self) -> Result<Region> {
        lock(&self.state)?
            .region
            .ok_or_else(|| IoError::Backend("no active region set".into()))
    }
}

impl MetadataStore for MemoryBackend {
    fn collection(&self, name: &str) -> Result<CollectionInfo> {
        let st = lock(&self.state)?;
        st.collections
            .get(name)
            .map(|c| c.info.clone())
            .ok_or_else(|| IoError::CollectionNotFound(name.to_string()))
    }

    fn list_members(
        &self,
        collection: &str,
        filter: &MemberFilter,
        order: MemberOrder,
    ) -> Result<Vec<RasterMapDescriptor>> {
        let st = lock(&self.state)?;
        let coll = st
            .collections
            .get(collection)
            .ok_or_else(|| IoError::CollectionNotFound(collection.to_string()))?;
        let mut out: Vec<RasterMapDescriptor> = coll
            .members
            .iter()
            .filter_map(|id| st.maps.get(id))
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        match order {
            MemberOrder::StartTime => out.sort_by(|a, b| {
                a.extent
                    .start
                    .cmp(&b.extent.start)
                    .then_with(|| a.id.cmp(&b.id))
            }),
            MemberOrder::Name => out.sort_by(|a, b| a.id.cmp(&b.id)),
        }
        Ok(out)
    }

    fn create_collection(&self, info: &CollectionInfo, overwrite: bool) -> Result<()> {
        let mut st = lock(&self.state)?;
        if st.collections.contains_key(&info.name) && !overwrite {
            return Err(IoError::CollectionExists(info.name.clone()));
        }
        st.collections.insert(
            info.name.clone(),
            StoredCollection {
                info: info.clone(),
                members: Vec::new(),
                extent: None,
            },
        );
        Ok(())
    }

    fn upsert_map(&self, map: &RasterMapDescriptor) -> Result<UpsertOutcome> {
        let mut st = lock(&self.state)?;
        if !st.rasters.contains_key(&map.id) {
            return Err(IoError::MapNotFound(map.id.clone()));
        }
        match st.maps.insert(map.id.clone(), map.clone()) {
            Some(_) => Ok(UpsertOutcome::Updated),
            None => Ok(UpsertOutcome::Inserted),
        }
    }

    fn register_member(
        &self,
        collection: &str,
        map: &MapId,
        extent: TemporalExtent,
        semantic_label: Option<&str>,
    ) -> Result<()> {
        let mut st = lock(&self.state)?;
        let temporal_type = st
            .collections
            .get(collection)
            .map(|c| c.info.temporal_type)
            .ok_or_else(|| IoError::CollectionNotFound(collection.to_string()))?;
        if extent.start.temporal_type() != temporal_type {
            return Err(IoError::Backend(format!(
                "'{map}' has a {:?} time but '{collection}' is {:?}",
                extent.start.temporal_type(),
                temporal_type
            )));
        }
        let desc = st
            .maps
            .get_mut(map)
            .ok_or_else(|| IoError::MapNotFound(map.clone()))?;
        desc.extent = extent;
        if let Some(label) = semantic_label {
            desc.semantic_label = Some(label.to_string());
        }
        if let Some(coll) = st.collections.get_mut(collection) {
            if !coll.members.contains(map) {
                coll.members.push(map.clone());
            }
        }
        Ok(())
    }

    fn recompute_extent(&self, collection: &str) -> Result<CollectionExtent> {
        let mut st = lock(&self.state)?;
        let members = st
            .collections
            .get(collection)
            .map(|c| c.members.clone())
            .ok_or_else(|| IoError::CollectionNotFound(collection.to_string()))?;
        let extent = {
            let pairs = members.iter().filter_map(|id| {
                let desc = st.maps.get(id)?;
                let bounds = st.rasters.get(id).map(|r| r.region.bounds());
                Some((desc, bounds))
            });
            CollectionExtent::from_members(pairs)
        };
        if let Some(coll) = st.collections.get_mut(collection) {
            coll.extent = Some(extent.clone());
        }
        Ok(extent)
    }
}

impl RasterStore for MemoryBackend {
    fn open_for_read(&self, map: &MapId, region: &Region) -> Result<Box<dyn RowReader>> {
        let mut st = lock(&self.state)?;
        let raster = st
            .rasters
            .get(map)
            .ok_or_else(|| IoError::MapNotFound(map.clone()))?;
        if raster.region.rows != region.rows || raster.region.cols != region.cols {
            return Err(IoError::ShapeMismatch {
                map: map.clone(),
                rows: region.rows,
                cols: region.cols,
                found_rows: raster.region.rows,
                found_cols: raster.region.cols,
            });
        }
        let cell_type = raster.cell_type;
        st.open_readers += 1;
        Ok(Box::new(MemoryReader {
            state: Arc::clone(&self.state),
            map: map.clone(),
            cell_type,
            rows: region.rows,
            open: true,
        }))
    }

    fn open_for_write(
        &self,
        map: &MapId,
        cell_type: CellType,
        region: &Region,
        overwrite: bool,
    ) -> Result<Box<dyn RowWriter>> {
        let mut st = lock(&self.state)?;
        if st.rasters.contains_key(map) && !overwrite {
            return Err(IoError::MapExists(map.clone()));
        }
        st.open_writers += 1;
        Ok(Box::new(MemoryWriter {
            state: Arc::clone(&self.state),
            map: map.clone(),
            cell_type,
            region: *region,
            rows: Vec::with_capacity(region.rows),
            open: true,
        }))
    }

    fn describe(&self, map: &MapId) -> Result<RasterInfo> {
        let st = lock(&self.state)?;
        let raster = st
            .rasters
            .get(map)
            .ok_or_else(|| IoError::MapNotFound(map.clone()))?;
        let mut min: Option<f64> = None;
        let mut max: Option<f64> = None;
        for v in raster.rows.iter().flatten().filter(|v| !v.is_nan()) {
            min = Some(min.map_or(*v, |m| m.min(*v)));
            max = Some(max.map_or(*v, |m| m.max(*v)));
        }
        Ok(RasterInfo {
            cell_type: raster.cell_type,
            rows: raster.region.rows,
            cols: raster.region.cols,
            bounds: raster.region.bounds(),
            min,
            max,
        })
    }
}

struct MemoryReader {
    state: Arc<Mutex<State>>,
    map: MapId,
    cell_type: CellType,
    rows: usize,
    open: bool,
}

impl MemoryReader {
    fn release(&mut self) {
        if self.open {
            self.open = false;
            if let Ok(mut st) = self.state.lock() {
                st.open_readers = st.open_readers.saturating_sub(1);
            }
        }
    }
}

impl RowReader for MemoryReader {
    fn map(&self) -> &MapId {
        &self.map
    }

    fn cell_type(&self) -> CellType {
        self.cell_type
    }

    fn read_row(&mut self, row: usize) -> Result<Vec<f64>> {
        if !self.open {
            return Err(IoError::Closed(self.map.clone()));
        }
        if row >= self.rows {
            return Err(IoError::RowOutOfRange {
                map: self.map.clone(),
                row,
                rows: self.rows,
            });
        }
        let st = lock(&self.state)?;
        if st.read_failures.contains(&(self.map.clone(), row)) {
            return Err(IoError::Read {
                map: self.map.clone(),
                row,
                reason: "injected failure".into(),
            });
        }
        st.rasters
            .get(&self.map)
            .and_then(|r| r.rows.get(row).cloned())
            .ok_or_else(|| IoError::MapNotFound(self.map.clone()))
    }

    fn close(&mut self) -> Result<()> {
        self.release();
        Ok(())
    }
}

impl Drop for MemoryReader {
    fn drop(&mut self) {
        self.release();
    }
}

struct MemoryWriter {
    state: Arc<Mutex<State>>,
    map: MapId,
    cell_type: CellType,
    region: Region,
    rows: Vec<Vec<f64>>,
    open: bool,
}

impl MemoryWriter {
    fn commit(&mut self) -> Result<()> {
        self.open = false;
        let mut st = lock(&self.state)?;
        st.open_writers = st.open_writers.saturating_sub(1);
        st.rasters.insert(
            self.map.clone(),
            StoredRaster {
                cell_type: self.cell_type,
                region: self.region,
                rows: std::mem::take(&mut self.rows),
            },
        );
        Ok(())
    }
}

impl RowWriter for MemoryWriter {
    fn map(&self) -> &MapId {
        &self.map
    }

    fn cell_type(&self) -> CellType {
        self.cell_type
    }

    fn write_row(&mut self, row: &[f64]) -> Result<()> {
        if !self.open {
            return Err(IoError::Closed(self.map.clone()));
        }
        if row.len() != self.region.cols {
            return Err(IoError::RowLength {
                map: self.map.clone(),
                expected: self.region.cols,
                found: row.len(),
            });
        }
        if self.rows.len() >= self.region.rows {
            return Err(IoError::TooManyRows {
                map: self.map.clone(),
                rows: self.region.rows,
            });
        }
        let cell_type = self.cell_type;
        self.rows
            .push(row.iter().map(|v| cell_type.coerce(*v)).collect());
        Ok(())
    }

    fn rows_written(&self) -> usize {
        self.rows.len()
    }

    fn close(&mut self) -> Result<()> {
        if !self.open {
            return Err(IoError::Closed(self.map.clone()));
        }
        self.commit()
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        if self.open {
            let _ = self.commit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tscube_core::time::TemporalType;

    fn region() -> Region {
        Region::from_bounds(80.0, 0.0, 120.0, 0.0, 10.0, 10.0).unwrap()
    }

    fn day(s: &str) -> Timestamp {
        Timestamp::parse(s, TemporalType::Absolute).unwrap()
    }

    fn backend_with_series() -> MemoryBackend {
        let b = MemoryBackend::with_region(region());
        for (name, v) in [("a1", 100.0), ("a2", 200.0), ("a3", 300.0)] {
            b.put_constant_raster(name, CellType::Float64, v).unwrap();
        }
        b.create_collection(&CollectionInfo::new("A", TemporalType::Absolute), false)
            .unwrap();
        b.register_series("A", &["a1", "a2", "a3"], day("2001-01-01"), 2 * 86_400)
            .unwrap();
        b
    }

    #[test]
    fn registered_series_lists_in_time_order() {
        let b = backend_with_series();
        let members = b.collection_members("A").unwrap();
        let names: Vec<_> = members.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(names, ["a1", "a2", "a3"]);
        assert_eq!(members[1].extent.start, day("2001-01-03"));
        assert_eq!(members[1].extent.end, Some(day("2001-01-05")));

        let ext = b.collection_extent("A").unwrap();
        assert_eq!(ext.map_count, 3);
        assert_eq!(ext.end, Some(day("2001-01-07")));
    }

    #[test]
    fn filter_narrows_members() {
        let b = backend_with_series();
        let f = MemberFilter::parse("start_time > '2001-01-01'", TemporalType::Absolute).unwrap();
        let members = b.list_members("A", &f, MemberOrder::Name).unwrap();
        assert_eq!(members.len(), 2);
        assert!(matches!(
            b.list_members("missing", &f, MemberOrder::Name),
            Err(IoError::CollectionNotFound(_))
        ));
    }

    #[test]
    fn reader_counts_and_injected_failures() {
        let b = backend_with_series();
        b.fail_read("a2", 4).unwrap();
        let mut r = b.open_for_read(&MapId::new("a2"), &region()).unwrap();
        assert_eq!(b.open_readers(), 1);
        assert_eq!(r.read_row(0).unwrap(), vec![200.0; 12]);
        assert!(matches!(r.read_row(4), Err(IoError::Read { row: 4, .. })));
        assert!(matches!(r.read_row(8), Err(IoError::RowOutOfRange { .. })));
        drop(r);
        assert_eq!(b.open_readers(), 0);
    }

    #[test]
    fn writer_commits_on_close_and_coerces() {
        let b = MemoryBackend::with_region(region());
        let id = MapId::new("out");
        let mut w = b
            .open_for_write(&id, CellType::Int32, &region(), false)
            .unwrap();
        for _ in 0..8 {
            w.write_row(&[1.7; 12]).unwrap();
        }
        assert!(matches!(w.write_row(&[0.0; 12]), Err(IoError::TooManyRows { .. })));
        assert!(!b.has_raster("out"));
        w.close().unwrap();
        assert!(matches!(w.close(), Err(IoError::Closed(_))));
        assert_eq!(b.raster_range("out").unwrap(), (1.0, 1.0));
        assert_eq!(b.open_writers(), 0);

        assert!(matches!(
            b.open_for_write(&id, CellType::Int32, &region(), false),
            Err(IoError::MapExists(_))
        ));
        assert!(b.open_for_write(&id, CellType::Int32, &region(), true).is_ok());
    }

    #[test]
    fn dropped_writer_keeps_partial_rows() {
        let b = MemoryBackend::with_region(region());
        {
            let mut w = b
                .open_for_write(&MapId::new("partial"), CellType::Float64, &region(), false)
                .unwrap();
            w.write_row(&[5.0; 12]).unwrap();
        }
        assert_eq!(b.raster_rows("partial").unwrap().len(), 1);
    }

    #[test]
    fn collections_are_replaced_only_with_overwrite() {
        let b = backend_with_series();
        let info = CollectionInfo::new("A", TemporalType::Absolute);
        assert!(matches!(
            b.create_collection(&info, false),
            Err(IoError::CollectionExists(_))
        ));
        b.create_collection(&info, true).unwrap();
        assert!(b.collection_members("A").unwrap().is_empty());
    }

    #[test]
    fn registration_rejects_mismatched_time_kind() {
        let b = backend_with_series();
        b.create_collection(&CollectionInfo::new("R", TemporalType::Relative), false)
            .unwrap();
        let err = b.register_member(
            "R",
            &MapId::new("a1"),
            TemporalExtent::instant(day("2001-01-01")),
            None,
        );
        assert!(err.is_err());
    }
}
