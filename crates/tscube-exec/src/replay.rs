//! Deterministic replay & provenance helpers.
//!
//! The job hash covers the request, the function name, and the effective
//! engine config. With identical inputs, two runs with the same job hash must
//! write outputs with identical digests.

use serde::Serialize;

use tscube_core::config::EngineConfig;
use tscube_core::hash::{hash_serde, Hash256};
use tscube_core::manifest::RunManifest;

use crate::error::{ExecError, Result};
use crate::runtime::RunRequest;

#[derive(Serialize)]
struct JobFingerprint<'a> {
    request: &'a RunRequest,
    udf: &'a str,
    config: &'a EngineConfig,
}

pub fn hash_request(request: &RunRequest, udf: &str, config: &EngineConfig) -> Result<Hash256> {
    hash_serde(&JobFingerprint {
        request,
        udf,
        config,
    })
    .map_err(|e| ExecError::Hash(e.to_string()))
}

/// True when both manifests describe the same job and wrote the same bytes.
pub fn same_outputs(a: &RunManifest, b: &RunManifest) -> bool {
    a.job_hash == b.job_hash
        && a.outputs.len() == b.outputs.len()
        && a
            .outputs
            .iter()
            .zip(&b.outputs)
            .all(|(x, y)| x.name == y.name && x.rows == y.rows && x.digest == y.digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_tracks_request_and_config() {
        let req = RunRequest::new(["A"], "B", "b");
        let cfg = EngineConfig::default();
        let h1 = hash_request(&req, "sum", &cfg).unwrap();
        assert_eq!(h1, hash_request(&req, "sum", &cfg).unwrap());
        assert_ne!(h1, hash_request(&req, "mean", &cfg).unwrap());

        let cfg2 = EngineConfig {
            chunk_rows: Some(4),
            ..cfg
        };
        assert_ne!(h1, hash_request(&req, "sum", &cfg2).unwrap());
    }
}
