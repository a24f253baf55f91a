//! UDF invocation: the probe that discovers output cardinality, and the
//! per-chunk call that must keep producing it.

use tscube_core::budget::Reservation;
use tscube_planner::Chunk;
use tscube_udf::{NormalizedResult, Udf, UdfData};

use crate::assembler::Assembler;
use crate::error::{ExecError, Result};
use crate::stream::BoundStream;

pub struct Invoker<'u> {
    udf: &'u dyn Udf,
    proj: Option<u32>,
}

/// A normalized result and the input bytes still held for its chunk.
pub struct ChunkOutput {
    pub result: NormalizedResult,
    pub held: Vec<Reservation>,
}

impl<'u> Invoker<'u> {
    pub fn new(udf: &'u dyn Udf, proj: Option<u32>) -> Self {
        Self { udf, proj }
    }

    /// Assemble `chunk` from every stream and call the function once.
    pub fn call(
        &self,
        assembler: &Assembler,
        streams: &mut [BoundStream],
        chunk: &Chunk,
    ) -> Result<ChunkOutput> {
        let mut cubes = Vec::with_capacity(streams.len());
        let mut held = Vec::with_capacity(streams.len());
        for s in streams.iter_mut() {
            let a = assembler.assemble(s, chunk)?;
            cubes.push(a.cube);
            held.push(a.reservation);
        }

        let wrap = |source| ExecError::Udf {
            udf: self.udf.name().to_string(),
            at: chunk.to_string(),
            source,
        };
        let raw = self
            .udf
            .apply(UdfData::new(self.proj, cubes))
            .map_err(wrap)?;
        let result = NormalizedResult::normalize(raw).map_err(wrap)?;
        Ok(ChunkOutput { result, held })
    }

    /// Run the function on a single row at offset 0 and return its output count.
    pub fn probe(&self, assembler: &Assembler, streams: &mut [BoundStream]) -> Result<usize> {
        let probe = Chunk::probe();
        let out = self.call(assembler, streams, &probe)?;
        let n = out.result.cardinality();
        if n == 0 {
            return Err(ExecError::NoOutputs);
        }
        tracing::debug!(udf = self.udf.name(), cardinality = n, "probe complete");
        Ok(n)
    }

    /// Call the function on `chunk` and check it against the probed cardinality.
    pub fn run(
        &self,
        assembler: &Assembler,
        streams: &mut [BoundStream],
        chunk: &Chunk,
        expected: usize,
    ) -> Result<ChunkOutput> {
        let out = self.call(assembler, streams, chunk)?;
        let found = out.result.cardinality();
        if found != expected {
            return Err(ExecError::Cardinality {
                at: chunk.to_string(),
                expected,
                found,
            });
        }
        Ok(out)
    }
}
