//! Engine configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::time::TimestampPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rows per chunk. `None` lets the planner derive a height from `mem_cap_bytes`.
    pub chunk_rows: Option<usize>,

    /// Cap (in bytes) on the input tensors assembled for one chunk.
    pub mem_cap_bytes: usize,

    /// Projection code handed to user functions.
    pub epsg: Option<u32>,

    /// Stamp used for output slots the function result leaves undated.
    pub timestamp_policy: TimestampPolicy,

    /// Replace existing output maps and collections.
    pub overwrite: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_rows: Some(1),
            mem_cap_bytes: 512 * 1024 * 1024, // 512 MiB default
            epsg: None,
            timestamp_policy: TimestampPolicy::default(),
            overwrite: false,
        }
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `TSCUBE_CHUNK_ROWS`: rows per chunk, or `auto`
    /// - `TSCUBE_MEM_CAP_BYTES`: per-chunk memory cap in bytes
    /// - `TSCUBE_EPSG`: projection code
    /// - `TSCUBE_TIMESTAMP_POLICY`: `run_completion`, `first_input_start`, `last_input_start`
    /// - `TSCUBE_OVERWRITE`: `1`/`true` to replace existing outputs
    ///
    /// Unparsable values are ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("TSCUBE_CHUNK_ROWS") {
            if s.trim().eq_ignore_ascii_case("auto") {
                cfg.chunk_rows = None;
            } else if let Ok(v) = s.trim().parse::<usize>() {
                cfg.chunk_rows = Some(v);
            }
        }

        if let Ok(s) = std::env::var("TSCUBE_MEM_CAP_BYTES") {
            if let Ok(v) = s.trim().parse::<usize>() {
                cfg.mem_cap_bytes = v;
            }
        }

        if let Ok(s) = std::env::var("TSCUBE_EPSG") {
            if let Ok(v) = s.trim().parse::<u32>() {
                cfg.epsg = Some(v);
            }
        }

        if let Ok(s) = std::env::var("TSCUBE_TIMESTAMP_POLICY") {
            if let Ok(p) = s.parse::<TimestampPolicy>() {
                cfg.timestamp_policy = p;
            }
        }

        if let Ok(s) = std::env::var("TSCUBE_OVERWRITE") {
            if let Some(v) = parse_flag(&s) {
                cfg.overwrite = v;
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_rows == Some(0) {
            return Err(Error::Config("chunk_rows must be at least 1".into()));
        }
        if self.mem_cap_bytes == 0 {
            return Err(Error::Config("mem_cap_bytes must be positive".into()));
        }
        Ok(())
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_stream_one_row_at_a_time() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.chunk_rows, Some(1));
        assert_eq!(cfg.timestamp_policy, TimestampPolicy::RunCompletion);
        assert!(!cfg.overwrite);
        cfg.validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_sizes() {
        let cfg = EngineConfig {
            chunk_rows: Some(0),
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = EngineConfig {
            mem_cap_bytes: 0,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"chunk_rows": null, "epsg": 3035}"#).unwrap();
        assert_eq!(cfg.chunk_rows, None);
        assert_eq!(cfg.epsg, Some(3035));
        assert_eq!(cfg.mem_cap_bytes, EngineConfig::default().mem_cap_bytes);
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
