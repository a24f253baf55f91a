use thiserror::Error;

use tscube_core::collection::MapId;

pub type Result<T> = std::result::Result<T, IoError>;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("collection '{0}' not found")]
    CollectionNotFound(String),

    #[error("collection '{0}' already exists")]
    CollectionExists(String),

    #[error("raster map '{0}' not found")]
    MapNotFound(MapId),

    #[error("raster map '{0}' already exists")]
    MapExists(MapId),

    #[error("raster map '{map}' is {found_rows}x{found_cols}, region is {rows}x{cols}")]
    ShapeMismatch {
        map: MapId,
        rows: usize,
        cols: usize,
        found_rows: usize,
        found_cols: usize,
    },

    #[error("row {row} out of range for '{map}' ({rows} rows)")]
    RowOutOfRange { map: MapId, row: usize, rows: usize },

    #[error("row for '{map}' has {found} cells, expected {expected}")]
    RowLength {
        map: MapId,
        expected: usize,
        found: usize,
    },

    #[error("'{map}' already holds all {rows} rows")]
    TooManyRows { map: MapId, rows: usize },

    #[error("handle for '{0}' is closed")]
    Closed(MapId),

    #[error("bad filter expression: {0}")]
    Filter(String),

    #[error("failed to read row {row} of '{map}': {reason}")]
    Read {
        map: MapId,
        row: usize,
        reason: String,
    },

    #[error("backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Core(#[from] tscube_core::Error),
}
