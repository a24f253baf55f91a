//! Chunk-scoped tensors handed to user functions.

use ndarray::Array3;

use tscube_core::time::Timestamp;

use crate::error::{Result, UdfError};

/// One input collection's slice of the current chunk.
///
/// `array` is laid out `(t, y, x)`: one slice per member, one row per chunk
/// row, one column per region column.
#[derive(Debug, Clone, PartialEq)]
pub struct DataCube {
    /// Name of the source collection.
    pub id: String,
    pub array: Array3<f64>,
    /// Start time of each member.
    pub times: Vec<Timestamp>,
    /// Row coordinates, `north + row * nsres + nsres / 2` per global row.
    pub ys: Vec<f64>,
    /// Column-centre eastings.
    pub xs: Vec<f64>,
}

impl DataCube {
    pub fn new(
        id: impl Into<String>,
        array: Array3<f64>,
        times: Vec<Timestamp>,
        ys: Vec<f64>,
        xs: Vec<f64>,
    ) -> Result<Self> {
        let (t, y, x) = array.dim();
        if (t, y, x) != (times.len(), ys.len(), xs.len()) {
            return Err(UdfError::Shape(format!(
                "array is {t}x{y}x{x} but coordinates are {}x{}x{}",
                times.len(),
                ys.len(),
                xs.len()
            )));
        }
        Ok(Self {
            id: id.into(),
            array,
            times,
            ys,
            xs,
        })
    }

    pub fn depth(&self) -> usize {
        self.array.dim().0
    }

    pub fn rows(&self) -> usize {
        self.array.dim().1
    }

    pub fn cols(&self) -> usize {
        self.array.dim().2
    }
}

/// Everything a user function receives for one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct UdfData {
    /// EPSG code of the region's projection, when known.
    pub proj: Option<u32>,
    /// One cube per input, in input order.
    pub cubes: Vec<DataCube>,
}

impl UdfData {
    pub fn new(proj: Option<u32>, cubes: Vec<DataCube>) -> Self {
        Self { proj, cubes }
    }
}
