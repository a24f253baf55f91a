//! DataCube assembly: read one chunk of rows from every member of a stream
//! into a `(t, y, x)` tensor with cell-centre coordinates.

use ndarray::Array3;

use tscube_core::budget::{ChunkBudget, Reservation};
use tscube_core::region::Region;
use tscube_planner::Chunk;
use tscube_udf::DataCube;

use crate::error::{ExecError, Result};
use crate::stream::BoundStream;

/// A cube plus the budget bytes it holds. Keep the reservation alive until
/// the chunk's results are written.
pub struct Assembled {
    pub cube: DataCube,
    pub reservation: Reservation,
}

pub struct Assembler {
    region: Region,
    budget: ChunkBudget,
}

impl Assembler {
    pub fn new(region: Region, budget: ChunkBudget) -> Self {
        Self { region, budget }
    }

    pub fn budget(&self) -> &ChunkBudget {
        &self.budget
    }

    pub fn assemble(&self, stream: &mut BoundStream, chunk: &Chunk) -> Result<Assembled> {
        let rows = self.region.clip_rows(chunk.row_offset, chunk.rows);
        if rows == 0 {
            return Err(ExecError::Invariant(format!(
                "{chunk} starts at row {} past the region's {} rows",
                chunk.row_offset, self.region.rows
            )));
        }
        let cols = self.region.cols;
        let depth = stream.depth();
        let cells = depth * rows * cols;

        let reservation = self
            .budget
            .reserve(cells * std::mem::size_of::<f64>(), "datacube")?;
        tracing::trace!(
            stream = stream.name(),
            %chunk,
            bytes = reservation.bytes(),
            used = self.budget.used_bytes(),
            peak = self.budget.peak_bytes(),
            "reserved datacube"
        );

        let mut flat = Vec::with_capacity(cells);
        for member in 0..depth {
            for i in 0..rows {
                let row = stream.read_row(member, chunk.row_offset + i)?;
                if row.len() != cols {
                    return Err(ExecError::Shape {
                        at: chunk.to_string(),
                        detail: format!(
                            "member {member} of '{}' returned {} cells, region has {cols}",
                            stream.name(),
                            row.len()
                        ),
                    });
                }
                flat.extend_from_slice(&row);
            }
        }
        let array = Array3::from_shape_vec((depth, rows, cols), flat).map_err(|e| {
            ExecError::Shape {
                at: chunk.to_string(),
                detail: e.to_string(),
            }
        })?;

        let cube = DataCube::new(
            stream.name(),
            array,
            stream.start_times(),
            self.region.y_coords(chunk.row_offset, rows),
            self.region.x_coords(),
        )
        .map_err(|e| ExecError::Shape {
            at: chunk.to_string(),
            detail: e.to_string(),
        })?;

        Ok(Assembled { cube, reservation })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tscube_core::cell::CellType;
    use tscube_core::collection::CollectionInfo;
    use tscube_core::time::{TemporalType, Timestamp};
    use tscube_io::metadata::{MemberOrder, MetadataStore as _};
    use tscube_io::MemoryBackend;
    use tscube_planner::ChunkPlan;

    use crate::stream;

    fn setup() -> (MemoryBackend, Region) {
        let region = Region::from_bounds(80.0, 0.0, 120.0, 0.0, 10.0, 10.0).unwrap();
        let b = MemoryBackend::with_region(region);
        let rows: Vec<Vec<f64>> = (0..8).map(|r| vec![r as f64; 12]).collect();
        b.put_raster("g1", CellType::Float64, region, rows.clone()).unwrap();
        b.put_raster("g2", CellType::Float64, region, rows).unwrap();
        b.create_collection(&CollectionInfo::new("G", TemporalType::Relative), false)
            .unwrap();
        b.register_series("G", &["g1", "g2"], Timestamp::Relative(0), 10)
            .unwrap();
        (b, region)
    }

    #[test]
    fn tail_chunk_is_clipped_with_coordinates() {
        let (b, region) = setup();
        let mut s = stream::open(&b, "G", None, MemberOrder::StartTime)
            .unwrap()
            .bind(&b, &region)
            .unwrap();
        let asm = Assembler::new(region, ChunkBudget::new(1 << 20));
        let tail = ChunkPlan::new(8, 3).unwrap().iter().last().unwrap();

        let Assembled { cube, reservation } = asm.assemble(&mut s, &tail).unwrap();
        assert_eq!(cube.array.dim(), (2, 2, 12));
        assert_eq!(cube.array[[1, 0, 0]], 6.0);
        assert_eq!(cube.array[[0, 1, 11]], 7.0);
        assert_eq!(cube.ys, vec![145.0, 155.0]);
        assert_eq!(cube.xs[0], 5.0);
        assert_eq!(cube.times, vec![Timestamp::Relative(0), Timestamp::Relative(10)]);
        assert_eq!(cube.id, "G");
        assert_eq!(reservation.bytes(), 2 * 2 * 12 * 8);
        drop(reservation);
        assert_eq!(asm.budget().used_bytes(), 0);
    }

    #[test]
    fn oversized_chunk_exceeds_budget() {
        let (b, region) = setup();
        let mut s = stream::open(&b, "G", None, MemberOrder::StartTime)
            .unwrap()
            .bind(&b, &region)
            .unwrap();
        let asm = Assembler::new(region, ChunkBudget::new(100));
        let chunk = ChunkPlan::new(8, 8).unwrap().iter().next().unwrap();
        assert!(matches!(asm.assemble(&mut s, &chunk), Err(ExecError::Budget(_))));
        assert_eq!(asm.budget().used_bytes(), 0);
    }
}
