//! Tagged function results and their normalization.

use ndarray::{Array2, Array3, ArrayView2, Axis};

use tscube_core::time::Timestamp;

use crate::cube::DataCube;
use crate::error::{Result, UdfError};

/// One tensor returned by a user function.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultTensor {
    /// `(y, x)`: the time axis was reduced away; exactly one output.
    Plane { label: String, array: Array2<f64> },
    /// `(t, y, x)`: one output per leading slice, optionally dated.
    Stack {
        label: String,
        array: Array3<f64>,
        times: Option<Vec<Timestamp>>,
    },
}

impl ResultTensor {
    pub fn plane(label: impl Into<String>, array: Array2<f64>) -> Self {
        ResultTensor::Plane {
            label: label.into(),
            array,
        }
    }

    pub fn stack(label: impl Into<String>, array: Array3<f64>, times: Option<Vec<Timestamp>>) -> Self {
        ResultTensor::Stack {
            label: label.into(),
            array,
            times,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ResultTensor::Plane { label, .. } | ResultTensor::Stack { label, .. } => label,
        }
    }
}

impl From<DataCube> for ResultTensor {
    fn from(cube: DataCube) -> Self {
        ResultTensor::Stack {
            label: cube.id,
            array: cube.array,
            times: Some(cube.times),
        }
    }
}

/// The first returned tensor, lifted to `(slices, rows, cols)`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedResult {
    pub label: String,
    pub array: Array3<f64>,
    pub times: Option<Vec<Timestamp>>,
}

impl NormalizedResult {
    /// Only the first tensor is kept. An empty result normalizes to zero slices.
    pub fn normalize(results: Vec<ResultTensor>) -> Result<Self> {
        let Some(first) = results.into_iter().next() else {
            return Ok(Self {
                label: String::new(),
                array: Array3::zeros((0, 0, 0)),
                times: None,
            });
        };
        match first {
            ResultTensor::Plane { label, array } => Ok(Self {
                label,
                array: array.insert_axis(Axis(0)),
                times: None,
            }),
            ResultTensor::Stack {
                label,
                array,
                times,
            } => {
                if let Some(t) = &times {
                    if t.len() != array.dim().0 {
                        return Err(UdfError::Shape(format!(
                            "'{label}' has {} slices but {} timestamps",
                            array.dim().0,
                            t.len()
                        )));
                    }
                }
                Ok(Self {
                    label,
                    array,
                    times,
                })
            }
        }
    }

    /// Number of output maps this result feeds.
    pub fn cardinality(&self) -> usize {
        self.array.dim().0
    }

    pub fn rows(&self) -> usize {
        self.array.dim().1
    }

    pub fn cols(&self) -> usize {
        self.array.dim().2
    }

    pub fn slice(&self, index: usize) -> ArrayView2<'_, f64> {
        self.array.index_axis(Axis(0), index)
    }
}
