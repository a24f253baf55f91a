//! Run counters and tracing hooks.
//!
//! No telemetry stack here; the embedding binary installs a `tracing`
//! subscriber if it wants the events.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use tscube_core::hash::Hash256;
use tscube_planner::Chunk;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Main-loop chunks (the probe is not counted).
    pub chunks: usize,
    pub cells_read: u64,
    pub cells_written: u64,
    /// Function calls, probe included.
    pub udf_calls: usize,
    pub udf_micros: u64,
}

impl RunStats {
    pub fn record_call(&mut self, elapsed: Duration) {
        self.udf_calls += 1;
        self.udf_micros = self
            .udf_micros
            .saturating_add(u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX));
    }

    pub fn record_chunk(&mut self, chunk: &Chunk, cells_read: usize, cells_written: usize) {
        self.chunks += 1;
        self.cells_read += cells_read as u64;
        self.cells_written += cells_written as u64;
        tracing::debug!(
            %chunk,
            offset = chunk.row_offset,
            rows = chunk.rows,
            cells_read,
            cells_written,
            "chunk written"
        );
    }

    pub fn emit(&self, job_hash: &Hash256) {
        tracing::info!(
            job = %job_hash,
            chunks = self.chunks,
            cells_read = self.cells_read,
            cells_written = self.cells_written,
            udf_calls = self.udf_calls,
            udf_micros = self.udf_micros,
            "run stats"
        );
    }
}
