//! Time-series streams: one input collection resolved to members, then bound
//! to open row readers.
//!
//! Opening only touches metadata. Binding opens one reader per member and
//! checks that the collection has a single cell type. A [`BoundStream`] closes
//! its readers when dropped, so every exit path releases them.

use tscube_core::cell::CellType;
use tscube_core::collection::{CollectionInfo, RasterMapDescriptor};
use tscube_core::region::Region;
use tscube_core::time::{TemporalType, Timestamp};
use tscube_io::filter::MemberFilter;
use tscube_io::metadata::{MemberOrder, MetadataStore};
use tscube_io::raster::{RasterStore, RowReader};

use crate::error::{ExecError, Result};

/// A collection's selected members, not yet opened.
#[derive(Debug, Clone)]
pub struct OpenedStream {
    pub info: CollectionInfo,
    pub members: Vec<RasterMapDescriptor>,
}

/// Look up `collection` and list the members passing `where_clause`.
pub fn open(
    meta: &dyn MetadataStore,
    collection: &str,
    where_clause: Option<&str>,
    order: MemberOrder,
) -> Result<OpenedStream> {
    let info = meta.collection(collection)?;
    let filter = match where_clause {
        Some(expr) => MemberFilter::parse(expr, info.temporal_type)?,
        None => MemberFilter::all(),
    };
    let members = meta.list_members(collection, &filter, order)?;
    if members.is_empty() {
        return Err(ExecError::Precondition(format!(
            "collection '{collection}' has no members matching the filter"
        )));
    }
    Ok(OpenedStream { info, members })
}

impl OpenedStream {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Open one reader per member against `region`.
    pub fn bind(self, rasters: &dyn RasterStore, region: &Region) -> Result<BoundStream> {
        let first = self
            .members
            .first()
            .ok_or_else(|| ExecError::Precondition(format!("'{}' is empty", self.info.name)))?;
        let cell_type = first.cell_type;
        if let Some(odd) = self.members.iter().find(|m| m.cell_type != cell_type) {
            return Err(mixed_types(&self.info.name, cell_type, odd.cell_type));
        }

        let mut readers: Vec<Box<dyn RowReader>> = Vec::with_capacity(self.members.len());
        for m in &self.members {
            let opened = rasters.open_for_read(&m.id, region).and_then(|r| {
                if r.cell_type() != cell_type {
                    Err(tscube_io::IoError::Backend(format!(
                        "'{}' is stored as {} but catalogued as {}",
                        m.id,
                        r.cell_type(),
                        cell_type
                    )))
                } else {
                    Ok(r)
                }
            });
            match opened {
                Ok(r) => readers.push(r),
                Err(e) => {
                    close_all(&mut readers);
                    return Err(e.into());
                }
            }
        }

        Ok(BoundStream {
            info: self.info,
            members: self.members,
            readers,
            cell_type,
            closed: false,
        })
    }
}

fn mixed_types(name: &str, expected: CellType, found: CellType) -> ExecError {
    ExecError::Precondition(format!(
        "collection '{name}' mixes cell types {expected} and {found}"
    ))
}

fn close_all(readers: &mut Vec<Box<dyn RowReader>>) {
    for mut r in readers.drain(..) {
        if let Err(e) = r.close() {
            tracing::warn!(map = %r.map(), error = %e, "failed to close reader");
        }
    }
}

/// An input collection with one open reader per member.
pub struct BoundStream {
    info: CollectionInfo,
    members: Vec<RasterMapDescriptor>,
    readers: Vec<Box<dyn RowReader>>,
    cell_type: CellType,
    closed: bool,
}

impl BoundStream {
    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn temporal_type(&self) -> TemporalType {
        self.info.temporal_type
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    /// Number of members (the time depth of every cube built from this stream).
    pub fn depth(&self) -> usize {
        self.members.len()
    }

    pub fn members(&self) -> &[RasterMapDescriptor] {
        &self.members
    }

    pub fn start_times(&self) -> Vec<Timestamp> {
        self.members.iter().map(|m| m.extent.start).collect()
    }

    pub fn end_times(&self) -> Vec<Option<Timestamp>> {
        self.members.iter().map(|m| m.extent.end).collect()
    }

    pub fn read_row(&mut self, member: usize, row: usize) -> Result<Vec<f64>> {
        if self.closed {
            return Err(ExecError::Invariant(format!(
                "stream '{}' read after close",
                self.info.name
            )));
        }
        let reader = self.readers.get_mut(member).ok_or_else(|| {
            ExecError::Invariant(format!("member {member} out of range for '{}'", self.info.name))
        })?;
        Ok(reader.read_row(row)?)
    }

    /// Close every reader, reporting the first failure.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut first_err = None;
        for r in self.readers.iter_mut() {
            if let Err(e) = r.close() {
                first_err.get_or_insert(e);
            }
        }
        self.readers.clear();
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

impl Drop for BoundStream {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            close_all(&mut self.readers);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tscube_core::collection::MapId;
    use tscube_io::MemoryBackend;

    fn setup() -> (MemoryBackend, Region) {
        let region = Region::from_bounds(80.0, 0.0, 120.0, 0.0, 10.0, 10.0).unwrap();
        let b = MemoryBackend::with_region(region);
        for (name, v) in [("a1", 100.0), ("a2", 200.0), ("a3", 300.0)] {
            b.put_constant_raster(name, CellType::Float64, v).unwrap();
        }
        b.create_collection(&CollectionInfo::new("A", TemporalType::Absolute), false)
            .unwrap();
        let start = Timestamp::parse("2001-01-01", TemporalType::Absolute).unwrap();
        b.register_series("A", &["a1", "a2", "a3"], start, 2 * 86_400)
            .unwrap();
        (b, region)
    }

    #[test]
    fn empty_selection_fails_before_binding() {
        let (b, _) = setup();
        let err = open(&b, "A", Some("name = 'zz'"), MemberOrder::StartTime).unwrap_err();
        assert!(matches!(err, ExecError::Precondition(_)));
        assert_eq!(b.open_readers(), 0);
    }

    #[test]
    fn bound_stream_reads_and_releases() {
        let (b, region) = setup();
        let mut s = open(&b, "A", None, MemberOrder::StartTime)
            .unwrap()
            .bind(&b, &region)
            .unwrap();
        assert_eq!(s.depth(), 3);
        assert_eq!(b.open_readers(), 3);
        assert_eq!(s.read_row(2, 7).unwrap()[0], 300.0);
        s.close().unwrap();
        assert_eq!(b.open_readers(), 0);
        assert!(s.read_row(0, 0).is_err());
    }

    #[test]
    fn member_times_follow_the_series() {
        let (b, region) = setup();
        let s = open(&b, "A", Some("name != 'a1'"), MemberOrder::Name)
            .unwrap()
            .bind(&b, &region)
            .unwrap();
        let day = |d| Timestamp::parse(d, TemporalType::Absolute).unwrap();
        let names: Vec<&str> = s.members().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(names, ["a2", "a3"]);
        assert_eq!(s.start_times(), [day("2001-01-03"), day("2001-01-05")]);
        assert_eq!(
            s.end_times(),
            [Some(day("2001-01-05")), Some(day("2001-01-07"))]
        );
    }

    #[test]
    fn drop_closes_readers() {
        let (b, region) = setup();
        {
            let _s = open(&b, "A", None, MemberOrder::StartTime)
                .unwrap()
                .bind(&b, &region)
                .unwrap();
            assert_eq!(b.open_readers(), 3);
        }
        assert_eq!(b.open_readers(), 0);
    }

    #[test]
    fn mixed_cell_types_are_rejected_before_reading() {
        let (b, region) = setup();
        let mut opened = open(&b, "A", None, MemberOrder::StartTime).unwrap();
        opened.members[1].cell_type = CellType::Int32;
        assert!(matches!(
            opened.bind(&b, &region),
            Err(ExecError::Precondition(_))
        ));
        assert_eq!(b.open_readers(), 0);
    }

    #[test]
    fn failed_open_releases_earlier_readers() {
        let (b, region) = setup();
        let mut opened = open(&b, "A", None, MemberOrder::StartTime).unwrap();
        opened.members[2].id = MapId::new("gone");
        assert!(matches!(opened.bind(&b, &region), Err(ExecError::Io(_))));
        assert_eq!(b.open_readers(), 0);
    }
}
