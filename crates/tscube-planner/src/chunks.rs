//! Row-chunk planning.
//!
//! A run walks the region top to bottom in chunks of `chunk_rows` rows; the
//! last chunk is clipped to the rows that remain. Before the loop, a one-row
//! probe chunk at offset 0 discovers the output count.

use serde::{Deserialize, Serialize};
use std::fmt;

use tscube_core::id::ChunkId;
use tscube_core::region::Region;

use crate::error::PlanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    /// First global row.
    pub row_offset: usize,
    /// Rows actually read (already clipped).
    pub rows: usize,
    pub probe: bool,
}

impl Chunk {
    /// The single-row chunk read before the main loop.
    pub fn probe() -> Self {
        Self {
            id: ChunkId::new(0),
            row_offset: 0,
            rows: 1,
            probe: true,
        }
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.probe {
            f.write_str("probe")
        } else {
            write!(f, "{}", self.id)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPlan {
    pub region_rows: usize,
    pub chunk_rows: usize,
}

impl ChunkPlan {
    pub fn new(region_rows: usize, chunk_rows: usize) -> Result<Self, PlanError> {
        if chunk_rows == 0 {
            return Err(PlanError::ZeroChunkRows);
        }
        Ok(Self {
            region_rows,
            chunk_rows,
        })
    }

    pub fn for_region(region: &Region, chunk_rows: usize) -> Result<Self, PlanError> {
        Self::new(region.rows, chunk_rows)
    }

    pub fn len(&self) -> usize {
        self.region_rows.div_ceil(self.chunk_rows)
    }

    pub fn is_empty(&self) -> bool {
        self.region_rows == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Chunk> + '_ {
        (0..self.len()).map(move |i| {
            let row_offset = i * self.chunk_rows;
            Chunk {
                id: ChunkId::new(i),
                row_offset,
                rows: self
                    .chunk_rows
                    .min(self.region_rows.saturating_sub(row_offset)),
                probe: false,
            }
        })
    }
}

/// Pick a chunk height when none is configured.
///
/// Target chunk payload ≈ mem_cap/3 across all input members, so one chunk of
/// inputs plus the function's result and the rows being written stay under
/// the cap. Always at least one row and at most the whole region.
pub fn choose_chunk_rows(mem_cap_bytes: usize, region: &Region, total_members: usize) -> usize {
    let k = 3;
    let target = (mem_cap_bytes / k).max(1);
    let bytes_per_row = region
        .cols
        .saturating_mul(std::mem::size_of::<f64>())
        .saturating_mul(total_members.max(1))
        .max(1);
    (target / bytes_per_row).clamp(1, region.rows.max(1))
}
