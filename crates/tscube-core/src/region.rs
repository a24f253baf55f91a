//! The shared analysis window every raster in a run conforms to.
//!
//! Row 0 is the northernmost row; column 0 is the westernmost column. Cell
//! coordinates are cell centres. Row coordinates count up from `north` by
//! `nsres` per row, which is the convention user functions receive.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Geographic bounds of a raster or collection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl Bounds {
    /// Smallest bounds covering both `self` and `other`.
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            north: self.north.max(other.north),
            south: self.south.min(other.south),
            east: self.east.max(other.east),
            west: self.west.min(other.west),
        }
    }
}

/// Immutable analysis window: shape, bounds, and cell resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub rows: usize,
    pub cols: usize,
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
    /// North-south cell size.
    pub nsres: f64,
    /// East-west cell size.
    pub ewres: f64,
}

impl Region {
    /// Build a region from its bounds and resolutions, deriving rows/cols.
    pub fn from_bounds(
        north: f64,
        south: f64,
        east: f64,
        west: f64,
        nsres: f64,
        ewres: f64,
    ) -> Result<Self> {
        if !(nsres > 0.0 && ewres > 0.0) {
            return Err(Error::Region(format!(
                "resolutions must be positive (nsres={nsres}, ewres={ewres})"
            )));
        }
        let rows = ((north - south) / nsres).round();
        let cols = ((east - west) / ewres).round();
        let region = Self {
            rows: if rows > 0.0 { rows as usize } else { 0 },
            cols: if cols > 0.0 { cols as usize } else { 0 },
            north,
            south,
            east,
            west,
            nsres,
            ewres,
        };
        region.validate()?;
        Ok(region)
    }

    /// Reject windows no raster can be read or written against.
    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(Error::Region(format!(
                "region has {} rows and {} columns",
                self.rows, self.cols
            )));
        }
        let finite = [
            self.north, self.south, self.east, self.west, self.nsres, self.ewres,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !finite {
            return Err(Error::Region("non-finite bound or resolution".into()));
        }
        if self.nsres <= 0.0 || self.ewres <= 0.0 {
            return Err(Error::Region(format!(
                "resolutions must be positive (nsres={}, ewres={})",
                self.nsres, self.ewres
            )));
        }
        if self.north <= self.south || self.east <= self.west {
            return Err(Error::Region(format!(
                "inverted bounds n={} s={} e={} w={}",
                self.north, self.south, self.east, self.west
            )));
        }
        Ok(())
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            north: self.north,
            south: self.south,
            east: self.east,
            west: self.west,
        }
    }

    /// Number of cells in one full-extent raster.
    pub fn cells(&self) -> usize {
        self.rows * self.cols
    }

    /// Easting of the centre of column `col`.
    pub fn col_coord(&self, col: usize) -> f64 {
        self.west + col as f64 * self.ewres + self.ewres / 2.0
    }

    /// Coordinate handed to user functions for global row `row`: the chunk
    /// top `north + row * nsres` plus half a cell.
    pub fn row_coord(&self, row: usize) -> f64 {
        self.north + row as f64 * self.nsres + self.nsres / 2.0
    }

    /// Column-centre eastings for the whole window.
    pub fn x_coords(&self) -> Vec<f64> {
        (0..self.cols).map(|c| self.col_coord(c)).collect()
    }

    /// Row coordinates for `rows` rows starting at `row_offset`.
    pub fn y_coords(&self, row_offset: usize, rows: usize) -> Vec<f64> {
        (0..rows).map(|i| self.row_coord(row_offset + i)).collect()
    }

    /// Rows actually available for a chunk of `height` starting at `row_offset`.
    pub fn clip_rows(&self, row_offset: usize, height: usize) -> usize {
        height.min(self.rows.saturating_sub(row_offset))
    }
}
