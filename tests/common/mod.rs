//! Shared fixtures: an 8x12 region and a three-member collection `A`.

#![allow(dead_code)]

use tscube_core::cell::CellType;
use tscube_core::collection::CollectionInfo;
use tscube_core::region::Region;
use tscube_core::time::{TemporalType, Timestamp};
use tscube_io::metadata::MetadataStore;
use tscube_io::MemoryBackend;

pub const TWO_DAYS: i64 = 2 * 86_400;

pub fn region() -> Region {
    Region::from_bounds(80.0, 0.0, 120.0, 0.0, 10.0, 10.0).expect("valid region")
}

pub fn day(s: &str) -> Timestamp {
    Timestamp::parse(s, TemporalType::Absolute).expect("valid date")
}

/// `A` holds a1/a2/a3 (constant 100/200/300) starting 2001-01-01, two days apart.
pub fn backend_with_a() -> MemoryBackend {
    let b = MemoryBackend::with_region(region());
    for (name, value) in [("a1", 100.0), ("a2", 200.0), ("a3", 300.0)] {
        b.put_constant_raster(name, CellType::Float64, value)
            .expect("put raster");
    }
    b.create_collection(&CollectionInfo::new("A", TemporalType::Absolute), false)
        .expect("create A");
    b.register_series("A", &["a1", "a2", "a3"], day("2001-01-01"), TWO_DAYS)
        .expect("register A");
    b
}

/// Rows numbered by their index, so chunk placement is visible in the output.
pub fn add_row_ramp(b: &MemoryBackend, collection: &str, maps: &[&str]) {
    let r = region();
    for (i, name) in maps.iter().enumerate() {
        let rows: Vec<Vec<f64>> = (0..r.rows)
            .map(|row| vec![(row + 10 * i) as f64; r.cols])
            .collect();
        b.put_raster(name, CellType::Float64, r, rows)
            .expect("put raster");
    }
    b.create_collection(&CollectionInfo::new(collection, TemporalType::Absolute), false)
        .expect("create collection");
    b.register_series(collection, maps, day("2010-01-01"), 86_400)
        .expect("register series");
}
