//! Raster cell value types.
//!
//! Tensors handed to user code are always `f64`. The cell type only governs
//! how values are stored when a row is written, and how many bytes a cell
//! costs in the external raster layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellType {
    /// Integer cells (`CELL`).
    Int32,
    /// Single-precision cells (`FCELL`).
    Float32,
    /// Double-precision cells (`DCELL`).
    Float64,
}

impl CellType {
    pub fn byte_width(self) -> usize {
        match self {
            CellType::Int32 | CellType::Float32 => 4,
            CellType::Float64 => 8,
        }
    }

    /// Convert a tensor value into what this cell type can hold.
    /// NaN is the null value for every type and passes through unchanged.
    pub fn coerce(self, v: f64) -> f64 {
        if v.is_nan() {
            return v;
        }
        match self {
            CellType::Int32 => v.trunc().clamp(i32::MIN as f64, i32::MAX as f64),
            CellType::Float32 => v as f32 as f64,
            CellType::Float64 => v,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CellType::Int32 => "CELL",
            CellType::Float32 => "FCELL",
            CellType::Float64 => "DCELL",
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CellType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "CELL" | "Int32" | "int32" | "i32" => Ok(CellType::Int32),
            "FCELL" | "Float32" | "float32" | "f32" => Ok(CellType::Float32),
            "DCELL" | "Float64" | "float64" | "f64" => Ok(CellType::Float64),
            other => Err(Error::Config(format!("unknown cell type '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_follows_storage_type() {
        assert_eq!(CellType::Int32.coerce(2.9), 2.0);
        assert_eq!(CellType::Int32.coerce(-2.9), -2.0);
        assert_eq!(CellType::Float32.coerce(0.1), 0.1f32 as f64);
        assert_eq!(CellType::Float64.coerce(0.1), 0.1);
        assert!(CellType::Int32.coerce(f64::NAN).is_nan());
    }

    #[test]
    fn parses_grass_and_rust_names() {
        assert_eq!("DCELL".parse::<CellType>().unwrap(), CellType::Float64);
        assert_eq!("i32".parse::<CellType>().unwrap(), CellType::Int32);
        assert!("u8".parse::<CellType>().is_err());
    }
}
