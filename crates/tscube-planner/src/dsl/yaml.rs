//! YAML job documents.
//!
//! Example:
//! ```yaml
//! inputs: [A, A, A]
//! output: B
//! basename: pass_a
//! udf: identity
//! nrows: 1
//! where: "start_time >= '2001-01-01'"
//! config:
//!   timestamp_policy: first_input_start
//! ```

use serde::{Deserialize, Serialize};

use tscube_core::config::EngineConfig;
use tscube_core::time::TimestampPolicy;
use tscube_io::metadata::MemberOrder;

use crate::error::PlanError;

pub const DEFAULT_TITLE: &str = "new STRDS";
pub const DEFAULT_DESCRIPTION: &str = "New STRDS from UDF";
pub const DEFAULT_SEMANTIC_TYPE: &str = "UDF";

fn default_title() -> String {
    DEFAULT_TITLE.into()
}

fn default_description() -> String {
    DEFAULT_DESCRIPTION.into()
}

fn default_semantic_type() -> String {
    DEFAULT_SEMANTIC_TYPE.into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Input collections, paired member-by-member.
    pub inputs: Vec<String>,
    /// Name of the collection created for the outputs.
    pub output: String,
    /// Output map name, suffixed `_<i>` when there is more than one.
    pub basename: String,
    /// Registry key of the function to run.
    pub udf: String,
    #[serde(default, rename = "where")]
    pub where_clause: Option<String>,
    #[serde(default)]
    pub order: MemberOrder,
    /// Rows per chunk; overrides `config.chunk_rows`.
    #[serde(default)]
    pub nrows: Option<usize>,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default = "default_semantic_type")]
    pub semantic_type: String,
    #[serde(default)]
    pub config: Option<JobConfig>,
}

/// Per-job overrides layered over the environment-derived engine config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub chunk_rows: Option<usize>,
    /// `true` derives the chunk height from the memory cap.
    pub auto_chunk_rows: Option<bool>,
    pub mem_cap_bytes: Option<usize>,
    pub epsg: Option<u32>,
    pub timestamp_policy: Option<TimestampPolicy>,
    pub overwrite: Option<bool>,
}

impl JobSpec {
    fn validate(&self) -> Result<(), PlanError> {
        if self.inputs.is_empty() {
            return Err(PlanError::Invalid("at least one input is required".into()));
        }
        if let Some(blank) = self.inputs.iter().find(|s| s.trim().is_empty()) {
            return Err(PlanError::Invalid(format!("blank input name {blank:?}")));
        }
        for (field, value) in [
            ("output", &self.output),
            ("basename", &self.basename),
            ("udf", &self.udf),
        ] {
            if value.trim().is_empty() {
                return Err(PlanError::Invalid(format!("'{field}' must not be empty")));
            }
        }
        if self.nrows == Some(0) {
            return Err(PlanError::ZeroChunkRows);
        }
        Ok(())
    }
}

pub fn parse_yaml_job(yaml_src: &str) -> Result<JobSpec, PlanError> {
    let job: JobSpec = serde_yaml::from_str(yaml_src)?;
    job.validate()?;
    Ok(job)
}

/// Overlay `job`'s settings onto `cfg`; `nrows` wins over `config.chunk_rows`.
pub fn apply_job_config(cfg: &mut EngineConfig, job: &JobSpec) -> Result<(), PlanError> {
    if let Some(over) = &job.config {
        if let Some(v) = over.chunk_rows {
            cfg.chunk_rows = Some(v);
        }
        if over.auto_chunk_rows == Some(true) {
            cfg.chunk_rows = None;
        }
        if let Some(v) = over.mem_cap_bytes {
            cfg.mem_cap_bytes = v;
        }
        if let Some(v) = over.epsg {
            cfg.epsg = Some(v);
        }
        if let Some(v) = over.timestamp_policy {
            cfg.timestamp_policy = v;
        }
        if let Some(v) = over.overwrite {
            cfg.overwrite = v;
        }
    }
    if let Some(n) = job.nrows {
        cfg.chunk_rows = Some(n);
    }
    cfg.validate()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASS: &str = r#"
inputs: [A, A, A]
output: B
basename: pass_a
udf: identity
nrows: 1
"#;

    #[test]
    fn minimal_job_gets_defaults() {
        let job = parse_yaml_job(PASS).unwrap();
        assert_eq!(job.inputs, ["A", "A", "A"]);
        assert_eq!(job.order, MemberOrder::StartTime);
        assert_eq!(job.title, DEFAULT_TITLE);
        assert_eq!(job.semantic_type, "UDF");
        assert!(job.where_clause.is_none());
    }

    #[test]
    fn config_section_overlays_engine_config() {
        let src = r#"
inputs: [A]
output: C
basename: aggr_a
udf: sum
where: "start_time >= '2001-01-03'"
order: name
nrows: 3
config:
  chunk_rows: 5
  epsg: 4326
  timestamp_policy: last_input_start
  overwrite: true
"#;
        let job = parse_yaml_job(src).unwrap();
        assert_eq!(job.order, MemberOrder::Name);
        assert_eq!(job.where_clause.as_deref(), Some("start_time >= '2001-01-03'"));

        let mut cfg = EngineConfig::default();
        apply_job_config(&mut cfg, &job).unwrap();
        assert_eq!(cfg.chunk_rows, Some(3));
        assert_eq!(cfg.epsg, Some(4326));
        assert_eq!(cfg.timestamp_policy, TimestampPolicy::LastInputStart);
        assert!(cfg.overwrite);
    }

    #[test]
    fn auto_chunk_rows_clears_height() {
        let src = "inputs: [A]\noutput: C\nbasename: c\nudf: mean\nconfig: { auto_chunk_rows: true }\n";
        let job = parse_yaml_job(src).unwrap();
        let mut cfg = EngineConfig::default();
        apply_job_config(&mut cfg, &job).unwrap();
        assert_eq!(cfg.chunk_rows, None);
    }

    #[test]
    fn rejects_incomplete_jobs() {
        assert!(matches!(
            parse_yaml_job("inputs: []\noutput: B\nbasename: b\nudf: sum\n"),
            Err(PlanError::Invalid(_))
        ));
        assert!(matches!(
            parse_yaml_job("inputs: [A]\noutput: B\nbasename: b\nudf: sum\nnrows: 0\n"),
            Err(PlanError::ZeroChunkRows)
        ));
        assert!(matches!(
            parse_yaml_job("inputs: [A]\nbasename: b\n"),
            Err(PlanError::Yaml(_))
        ));
    }
}
