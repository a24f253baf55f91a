//! Run manifest emitted after a successful run, for audit and replay checks.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::hash::Hash256;
use crate::time::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManifestId(pub Uuid);

/// One finalized output map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub name: String,
    pub rows: usize,
    pub digest: Hash256,
    pub start: Timestamp,
    #[serde(default)]
    pub end: Option<Timestamp>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub id: ManifestId,

    /// Stable hash of the run request (inputs, filters, function, config).
    pub job_hash: Hash256,

    pub engine_version: String,

    /// Collection the outputs were registered into.
    pub collection: String,

    /// Output count discovered by the probe.
    pub cardinality: usize,

    pub chunk_rows: usize,
    pub chunks: usize,

    /// Largest number of bytes held by one chunk's input tensors.
    pub peak_chunk_bytes: usize,

    pub outputs: Vec<OutputRecord>,

    /// Milliseconds since Unix epoch (UTC).
    pub started_ms: u64,
    pub finished_ms: u64,
}

impl RunManifest {
    pub fn new(job_hash: Hash256, collection: impl Into<String>, started_ms: u64) -> Self {
        Self {
            id: ManifestId(Uuid::new_v4()),
            job_hash,
            engine_version: crate::VERSION.to_string(),
            collection: collection.into(),
            cardinality: 0,
            chunk_rows: 0,
            chunks: 0,
            peak_chunk_bytes: 0,
            outputs: Vec::new(),
            started_ms,
            finished_ms: started_ms,
        }
    }

    pub fn finish(mut self, finished_ms: u64, outputs: Vec<OutputRecord>) -> Self {
        self.finished_ms = finished_ms;
        self.cardinality = outputs.len();
        self.outputs = outputs;
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_bytes;

    #[test]
    fn finish_records_outputs() {
        let m = RunManifest::new(hash_bytes(b"job"), "B", 10).finish(
            25,
            vec![OutputRecord {
                name: "b_0".into(),
                rows: 8,
                digest: hash_bytes(b"rows"),
                start: Timestamp::Relative(0),
                end: None,
            }],
        );
        assert_eq!(m.cardinality, 1);
        assert_eq!(m.finished_ms, 25);
        let json = m.to_json().unwrap();
        assert!(json.contains("\"collection\": \"B\""));
    }
}
