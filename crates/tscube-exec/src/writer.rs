//! Output fan-out: one writer per output slot, fed row by row in chunk order.

use tscube_core::cell::CellType;
use tscube_core::collection::MapId;
use tscube_core::hash::{Hash256, RowDigest};
use tscube_core::id::SlotId;
use tscube_core::region::Region;
use tscube_io::raster::{RasterStore, RowWriter};
use tscube_planner::Chunk;
use tscube_udf::NormalizedResult;

use crate::error::{ExecError, Result};

/// `basename` for a single output, `basename_<i>` otherwise.
pub fn output_names(basename: &str, count: usize) -> Vec<MapId> {
    if count == 1 {
        vec![MapId::new(basename)]
    } else {
        (0..count)
            .map(|i| MapId::new(format!("{basename}_{i}")))
            .collect()
    }
}

/// A fully written and closed output map.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedOutput {
    pub slot: SlotId,
    pub map: MapId,
    pub cell_type: CellType,
    pub rows: usize,
    pub digest: Hash256,
}

struct OutputSlot {
    slot: SlotId,
    writer: Box<dyn RowWriter>,
    digest: RowDigest,
    open: bool,
}

impl OutputSlot {
    fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.writer.close()?;
        Ok(())
    }
}

pub struct OutputFanout {
    region: Region,
    cell_type: CellType,
    slots: Vec<OutputSlot>,
}

impl OutputFanout {
    /// Open `count` output maps. Called exactly once, after the probe.
    pub fn ensure_outputs(
        rasters: &dyn RasterStore,
        region: &Region,
        basename: &str,
        count: usize,
        cell_type: CellType,
        overwrite: bool,
    ) -> Result<Self> {
        if count == 0 {
            return Err(ExecError::NoOutputs);
        }
        let mut fanout = Self {
            region: *region,
            cell_type,
            slots: Vec::with_capacity(count),
        };
        for (i, name) in output_names(basename, count).into_iter().enumerate() {
            // on failure, `fanout` drops and closes what was already opened
            let writer = rasters.open_for_write(&name, cell_type, region, overwrite)?;
            fanout.slots.push(OutputSlot {
                slot: SlotId::new(i),
                writer,
                digest: RowDigest::new(),
                open: true,
            });
        }
        Ok(fanout)
    }

    pub fn cardinality(&self) -> usize {
        self.slots.len()
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    pub fn names(&self) -> Vec<MapId> {
        self.slots.iter().map(|s| s.writer.map().clone()).collect()
    }

    /// Write slice `i` of `result` to slot `i`, one row at a time.
    pub fn write_chunk(&mut self, chunk: &Chunk, result: &NormalizedResult) -> Result<()> {
        if result.cardinality() != self.slots.len() {
            return Err(ExecError::Cardinality {
                at: chunk.to_string(),
                expected: self.slots.len(),
                found: result.cardinality(),
            });
        }
        if result.rows() != chunk.rows || result.cols() != self.region.cols {
            return Err(ExecError::Shape {
                at: chunk.to_string(),
                detail: format!(
                    "result slices are {}x{}, chunk needs {}x{}",
                    result.rows(),
                    result.cols(),
                    chunk.rows,
                    self.region.cols
                ),
            });
        }

        let cell_type = self.cell_type;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            let plane = result.slice(i);
            for r in 0..chunk.rows {
                let row: Vec<f64> = plane.row(r).iter().map(|v| cell_type.coerce(*v)).collect();
                slot.writer.write_row(&row)?;
                slot.digest.update_row(&row);
            }
        }
        Ok(())
    }

    /// Verify every slot holds `region.rows` rows, then close them all.
    pub fn finish(mut self) -> Result<Vec<ClosedOutput>> {
        let expected = self.region.rows;
        if let Some(short) = self.slots.iter().find(|s| s.writer.rows_written() != expected) {
            let err = ExecError::Invariant(format!(
                "'{}' received {} of {expected} rows",
                short.writer.map(),
                short.writer.rows_written()
            ));
            self.abort();
            return Err(err);
        }

        let mut closed = Vec::with_capacity(self.slots.len());
        for slot in self.slots.iter_mut() {
            slot.close()?;
            closed.push(ClosedOutput {
                slot: slot.slot,
                map: slot.writer.map().clone(),
                cell_type: self.cell_type,
                rows: slot.writer.rows_written(),
                digest: slot.digest.finish(),
            });
        }
        Ok(closed)
    }

    /// Close every still-open writer, keeping the rows already written.
    /// Returns how many writers were closed.
    pub fn abort(&mut self) -> usize {
        let mut closed = 0;
        for slot in self.slots.iter_mut().filter(|s| s.open) {
            if let Err(e) = slot.close() {
                tracing::warn!(map = %slot.writer.map(), error = %e, "failed to close output");
            }
            closed += 1;
        }
        if closed > 0 {
            tracing::warn!(outputs = closed, "aborted run; partial outputs left in place");
        }
        closed
    }
}

impl Drop for OutputFanout {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use tscube_io::MemoryBackend;
    use tscube_planner::ChunkPlan;
    use tscube_udf::ResultTensor;

    fn region() -> Region {
        Region::from_bounds(80.0, 0.0, 120.0, 0.0, 10.0, 10.0).unwrap()
    }

    fn result(depth: usize, rows: usize, value: f64) -> NormalizedResult {
        NormalizedResult::normalize(vec![ResultTensor::stack(
            "r",
            Array3::from_elem((depth, rows, 12), value),
            None,
        )])
        .unwrap()
    }

    #[test]
    fn names_follow_cardinality() {
        assert_eq!(output_names("aggr_a", 1), [MapId::new("aggr_a")]);
        assert_eq!(
            output_names("pass_a", 2),
            [MapId::new("pass_a_0"), MapId::new("pass_a_1")]
        );
    }

    #[test]
    fn writes_every_row_then_closes() {
        let b = MemoryBackend::with_region(region());
        let mut out =
            OutputFanout::ensure_outputs(&b, &region(), "o", 2, CellType::Int32, false).unwrap();
        for chunk in ChunkPlan::new(8, 3).unwrap().iter() {
            out.write_chunk(&chunk, &result(2, chunk.rows, 4.6)).unwrap();
        }
        let closed = out.finish().unwrap();
        assert_eq!(closed.len(), 2);
        assert!(closed.iter().all(|c| c.rows == 8));
        assert_eq!(closed[0].digest, closed[1].digest);
        assert_eq!(b.raster_range("o_1").unwrap(), (4.0, 4.0));
        assert_eq!(b.open_writers(), 0);
    }

    #[test]
    fn rejects_wrong_depth_and_height() {
        let b = MemoryBackend::with_region(region());
        let mut out =
            OutputFanout::ensure_outputs(&b, &region(), "o", 2, CellType::Float64, false).unwrap();
        let chunk = ChunkPlan::new(8, 3).unwrap().iter().next().unwrap();
        assert!(matches!(
            out.write_chunk(&chunk, &result(3, 3, 1.0)),
            Err(ExecError::Cardinality { expected: 2, found: 3, .. })
        ));
        assert!(matches!(
            out.write_chunk(&chunk, &result(2, 2, 1.0)),
            Err(ExecError::Shape { .. })
        ));
    }

    #[test]
    fn short_outputs_fail_finish_and_keep_rows() {
        let b = MemoryBackend::with_region(region());
        let mut out =
            OutputFanout::ensure_outputs(&b, &region(), "short", 1, CellType::Float64, false)
                .unwrap();
        let chunk = ChunkPlan::new(8, 3).unwrap().iter().next().unwrap();
        out.write_chunk(&chunk, &result(1, 3, 1.0)).unwrap();
        assert!(matches!(out.finish(), Err(ExecError::Invariant(_))));
        assert_eq!(b.raster_rows("short").unwrap().len(), 3);
        assert_eq!(b.open_writers(), 0);
    }

    #[test]
    fn abort_reports_closed_writers() {
        let b = MemoryBackend::with_region(region());
        let mut out =
            OutputFanout::ensure_outputs(&b, &region(), "x", 3, CellType::Float64, false).unwrap();
        assert_eq!(out.abort(), 3);
        assert_eq!(out.abort(), 0);
        assert_eq!(b.open_writers(), 0);
    }

    #[test]
    fn existing_output_blocks_without_overwrite() {
        let b = MemoryBackend::with_region(region());
        b.put_constant_raster("taken_1", CellType::Float64, 0.0).unwrap();
        let err = OutputFanout::ensure_outputs(&b, &region(), "taken", 3, CellType::Float64, false);
        assert!(matches!(err, Err(ExecError::Io(_))));
        assert_eq!(b.open_writers(), 0);
    }
}
