//! Row-granular raster I/O.
//!
//! Readers and writers are bound to one map and to the run's [`Region`]: every
//! row handed across this boundary has exactly `region.cols` cells. Values are
//! `f64`, with NaN as null.

use tscube_core::cell::CellType;
use tscube_core::collection::MapId;
use tscube_core::region::{Bounds, Region};

use crate::error::Result;

pub trait RowReader {
    fn map(&self) -> &MapId;

    /// Storage type of the underlying map.
    fn cell_type(&self) -> CellType;

    /// Read global row `row` of the region.
    fn read_row(&mut self, row: usize) -> Result<Vec<f64>>;

    fn close(&mut self) -> Result<()>;
}

pub trait RowWriter {
    fn map(&self) -> &MapId;

    fn cell_type(&self) -> CellType;

    /// Append the next row; values are coerced to the writer's cell type.
    fn write_row(&mut self, row: &[f64]) -> Result<()>;

    fn rows_written(&self) -> usize;

    fn close(&mut self) -> Result<()>;
}

/// Summary of a stored raster.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterInfo {
    pub cell_type: CellType,
    pub rows: usize,
    pub cols: usize,
    pub bounds: Bounds,
    /// Smallest non-null value, if any cell is non-null.
    pub min: Option<f64>,
    pub max: Option<f64>,
}

pub trait RasterStore {
    fn open_for_read(&self, map: &MapId, region: &Region) -> Result<Box<dyn RowReader>>;

    /// Open a new map for writing. An existing map is replaced only with `overwrite`.
    fn open_for_write(
        &self,
        map: &MapId,
        cell_type: CellType,
        region: &Region,
        overwrite: bool,
    ) -> Result<Box<dyn RowWriter>>;

    fn describe(&self, map: &MapId) -> Result<RasterInfo>;
}

/// Provider of the current analysis window.
pub trait RegionSource {
    fn active_region(&self) -> Result<Region>;
}
