//! Stable hashing helpers for jobs, manifests, and written raster content.

use blake3::Hasher;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(64);
        for b in &self.0 {
            use std::fmt::Write as _;
            let _ = write!(&mut s, "{:02x}", b);
        }
        s
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

pub fn hash_bytes(bytes: &[u8]) -> Hash256 {
    Hash256(blake3::hash(bytes).into())
}

/// Hash any serde-serializable value deterministically (via JSON).
pub fn hash_serde<T: Serialize>(v: &T) -> crate::error::Result<Hash256> {
    let bytes = serde_json::to_vec(v)?;
    Ok(hash_bytes(&bytes))
}

/// Running digest over the rows written to one output raster.
///
/// Values are fed as little-endian `f64` after cell-type coercion, so two
/// outputs with identical stored content hash identically.
pub struct RowDigest {
    hasher: Hasher,
    rows: usize,
}

impl RowDigest {
    pub fn new() -> Self {
        Self {
            hasher: Hasher::new(),
            rows: 0,
        }
    }

    pub fn update_row(&mut self, row: &[f64]) {
        for v in row {
            self.hasher.update(&v.to_le_bytes());
        }
        self.rows += 1;
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(&self) -> Hash256 {
        Hash256(self.hasher.finalize().into())
    }
}

impl Default for RowDigest {
    fn default() -> Self {
        Self::new()
    }
}
