//! Runtime: bind inputs, probe, stream every chunk through the function, and
//! register the outputs. Emits a `RunManifest` on success.
//!
//! Any failure ends the run. Readers and writers are released on every exit
//! path; outputs keep the rows written before the failure and no output
//! collection is created.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use tscube_core::budget::ChunkBudget;
use tscube_core::collection::{CollectionExtent, CollectionInfo};
use tscube_core::config::EngineConfig;
use tscube_core::manifest::RunManifest;
use tscube_core::region::Region;
use tscube_core::time::{Timestamp, TimestampPolicy};
use tscube_io::metadata::{MemberOrder, MetadataStore};
use tscube_io::raster::{RasterStore, RegionSource};
use tscube_io::IoError;
use tscube_planner::dsl::yaml::{DEFAULT_DESCRIPTION, DEFAULT_SEMANTIC_TYPE, DEFAULT_TITLE};
use tscube_planner::{apply_job_config, choose_chunk_rows, ChunkPlan, JobSpec};
use tscube_udf::{Registry, Udf};

use crate::assembler::Assembler;
use crate::binder::bind_region;
use crate::error::{ExecError, Result};
use crate::fail_point;
use crate::finalizer::{resolve_extents, TemporalFinalizer, TimeContext};
use crate::invoke::Invoker;
use crate::metrics::RunStats;
use crate::replay::hash_request;
use crate::stream::{self, BoundStream};
use crate::writer::OutputFanout;

/// What to run, independent of which function runs it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRequest {
    /// Input collections, paired member-by-member by position.
    pub inputs: Vec<String>,
    pub where_clause: Option<String>,
    pub order: MemberOrder,
    /// Output collection name.
    pub output: String,
    pub basename: String,
    pub title: String,
    pub description: String,
    pub semantic_type: String,
}

impl RunRequest {
    pub fn new<I, S>(inputs: I, output: impl Into<String>, basename: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            where_clause: None,
            order: MemberOrder::default(),
            output: output.into(),
            basename: basename.into(),
            title: DEFAULT_TITLE.into(),
            description: DEFAULT_DESCRIPTION.into(),
            semantic_type: DEFAULT_SEMANTIC_TYPE.into(),
        }
    }

    pub fn with_where(mut self, expr: impl Into<String>) -> Self {
        self.where_clause = Some(expr.into());
        self
    }

    pub fn with_order(mut self, order: MemberOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_semantic_type(mut self, semantic_type: impl Into<String>) -> Self {
        self.semantic_type = semantic_type.into();
        self
    }

    fn check(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(ExecError::Precondition("no input collections".into()));
        }
        if self.output.trim().is_empty() || self.basename.trim().is_empty() {
            return Err(ExecError::Precondition(
                "output collection and basename must be set".into(),
            ));
        }
        Ok(())
    }
}

impl From<&JobSpec> for RunRequest {
    fn from(job: &JobSpec) -> Self {
        Self {
            inputs: job.inputs.clone(),
            where_clause: job.where_clause.clone(),
            order: job.order,
            output: job.output.clone(),
            basename: job.basename.clone(),
            title: job.title.clone(),
            description: job.description.clone(),
            semantic_type: job.semantic_type.clone(),
        }
    }
}

/// The three ports a run talks to.
#[derive(Clone, Copy)]
pub struct Backends<'a> {
    pub metadata: &'a dyn MetadataStore,
    pub rasters: &'a dyn RasterStore,
    pub region: &'a dyn RegionSource,
}

impl<'a> Backends<'a> {
    /// Use one backend for every port.
    pub fn from_backend<B>(backend: &'a B) -> Self
    where
        B: MetadataStore + RasterStore + RegionSource,
    {
        Self {
            metadata: backend,
            rasters: backend,
            region: backend,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub manifest: RunManifest,
    /// Extent of the new output collection.
    pub extent: CollectionExtent,
    pub stats: RunStats,
}

pub struct Engine {
    cfg: EngineConfig,
    registry: Registry,
}

impl Engine {
    /// Engine with the built-in functions registered.
    pub fn new(cfg: EngineConfig) -> Self {
        Self::with_registry(cfg, Registry::with_builtins())
    }

    pub fn with_registry(cfg: EngineConfig, registry: Registry) -> Self {
        Self { cfg, registry }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Run `udf` over `request` with the engine's config.
    pub fn run(&self, request: &RunRequest, udf: &dyn Udf, io: &Backends<'_>) -> Result<RunReport> {
        execute(&self.cfg, request, udf, io)
    }

    /// Run a job document: its config overlays the engine's, and its function
    /// is looked up in the registry.
    pub fn run_job(&self, job: &JobSpec, io: &Backends<'_>) -> Result<RunReport> {
        let mut cfg = self.cfg.clone();
        apply_job_config(&mut cfg, job)?;
        let udf = self
            .registry
            .get(&job.udf)
            .ok_or_else(|| ExecError::Registry(job.udf.clone()))?;
        execute(&cfg, &RunRequest::from(job), udf, io)
    }
}

fn execute(
    cfg: &EngineConfig,
    request: &RunRequest,
    udf: &dyn Udf,
    io: &Backends<'_>,
) -> Result<RunReport> {
    cfg.validate()
        .map_err(|e| ExecError::Precondition(e.to_string()))?;
    request.check()?;

    let started_ms = now_millis();
    let job_hash = hash_request(request, udf.name(), cfg)?;
    tracing::info!(
        job = %job_hash,
        udf = udf.name(),
        inputs = ?request.inputs,
        output = %request.output,
        "run started"
    );

    let region = bind_region(io.region)?;
    preflight_output(io.metadata, &request.output, cfg.overwrite)?;

    let mut streams = bind_streams(io, request, &region)?;
    let total_members: usize = streams.iter().map(BoundStream::depth).sum();

    let chunk_rows = cfg
        .chunk_rows
        .unwrap_or_else(|| choose_chunk_rows(cfg.mem_cap_bytes, &region, total_members));
    let plan = ChunkPlan::for_region(&region, chunk_rows)?;
    tracing::debug!(chunk_rows, chunks = plan.len(), rows = region.rows, "chunk plan");

    let budget = ChunkBudget::new(cfg.mem_cap_bytes);
    let assembler = Assembler::new(region, budget.clone());
    let invoker = Invoker::new(udf, cfg.epsg);
    let mut stats = RunStats::default();

    let t0 = Instant::now();
    let cardinality = invoker.probe(&assembler, &mut streams)?;
    stats.record_call(t0.elapsed());

    // The last bound stream decides the output cell type.
    let cell_type = streams
        .last()
        .map(BoundStream::cell_type)
        .ok_or_else(|| ExecError::Invariant("no bound streams".into()))?;
    let mut fanout = OutputFanout::ensure_outputs(
        io.rasters,
        &region,
        &request.basename,
        cardinality,
        cell_type,
        cfg.overwrite,
    )?;

    let explicit_times = match stream_chunks(
        &plan,
        &region,
        &invoker,
        &assembler,
        &mut streams,
        &mut fanout,
        cardinality,
        &mut stats,
    ) {
        Ok(times) => times,
        Err(e) => {
            let closed = fanout.abort();
            tracing::warn!(job = %job_hash, error = %e, outputs = closed, "run failed");
            return Err(e);
        }
    };
    let completed_at = Timestamp::now();

    let closed = fanout.finish()?;
    let ctx = time_context(&streams, completed_at)?;
    for s in streams.iter_mut() {
        s.close()?;
    }

    let extents = resolve_extents(
        closed.len(),
        explicit_times.as_deref(),
        cfg.timestamp_policy,
        &ctx,
    )?;
    if explicit_times.is_none() && cfg.timestamp_policy == TimestampPolicy::RunCompletion {
        tracing::debug!(stamp = %ctx.completed_at, "outputs stamped with completion time");
    }

    let mut info = CollectionInfo::new(request.output.clone(), ctx.temporal_type);
    info.title = request.title.clone();
    info.description = request.description.clone();
    info.semantic_type = request.semantic_type.clone();

    let mut finalizer = TemporalFinalizer::new(io.metadata, info);
    finalizer.create(cfg.overwrite)?;
    finalizer.populate(&closed, &extents)?;
    let extent = finalizer.finalize()?;

    let mut manifest = RunManifest::new(job_hash, request.output.clone(), started_ms);
    manifest.chunk_rows = chunk_rows;
    manifest.chunks = plan.len();
    manifest.peak_chunk_bytes = budget.peak_bytes();
    let manifest = manifest.finish(now_millis(), finalizer.into_records());

    stats.emit(&job_hash);
    tracing::info!(
        job = %job_hash,
        outputs = manifest.cardinality,
        collection = %manifest.collection,
        elapsed_ms = manifest.finished_ms.saturating_sub(manifest.started_ms),
        "run finished"
    );

    Ok(RunReport {
        manifest,
        extent,
        stats,
    })
}

/// An existing output collection is an error unless overwriting.
fn preflight_output(meta: &dyn MetadataStore, output: &str, overwrite: bool) -> Result<()> {
    match meta.collection(output) {
        Ok(_) if !overwrite => Err(ExecError::Precondition(format!(
            "output collection '{output}' exists and overwrite is off"
        ))),
        Ok(_) | Err(IoError::CollectionNotFound(_)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn bind_streams(
    io: &Backends<'_>,
    request: &RunRequest,
    region: &Region,
) -> Result<Vec<BoundStream>> {
    let mut opened = Vec::with_capacity(request.inputs.len());
    for name in &request.inputs {
        opened.push(stream::open(
            io.metadata,
            name,
            request.where_clause.as_deref(),
            request.order,
        )?);
    }

    let depth = opened.first().map(|s| s.len()).unwrap_or(0);
    if let Some((odd, s)) = request
        .inputs
        .iter()
        .zip(&opened)
        .find(|(_, s)| s.len() != depth)
    {
        return Err(ExecError::Precondition(format!(
            "input '{odd}' has {} members, '{}' has {depth}",
            s.len(),
            request.inputs[0]
        )));
    }

    let mut bound = Vec::with_capacity(opened.len());
    for s in opened {
        // already-bound streams close on drop if this fails
        bound.push(s.bind(io.rasters, region)?);
    }
    Ok(bound)
}

/// Walk the plan; returns the result times of the first chunk the loop
/// writes (never the probe's), if any.
#[allow(clippy::too_many_arguments)]
fn stream_chunks(
    plan: &ChunkPlan,
    region: &Region,
    invoker: &Invoker<'_>,
    assembler: &Assembler,
    streams: &mut [BoundStream],
    fanout: &mut OutputFanout,
    cardinality: usize,
    stats: &mut RunStats,
) -> Result<Option<Vec<Timestamp>>> {
    let mut times = None;
    let mut first = true;
    for chunk in plan.iter() {
        fail_point!("exec::before_chunk");

        let t0 = Instant::now();
        let out = invoker.run(assembler, streams, &chunk, cardinality)?;
        stats.record_call(t0.elapsed());

        if first {
            times = out.result.times.clone();
            first = false;
        }
        fanout.write_chunk(&chunk, &out.result)?;

        let per_member = chunk.rows * region.cols;
        let depth: usize = streams.iter().map(BoundStream::depth).sum();
        stats.record_chunk(&chunk, depth * per_member, cardinality * per_member);

        fail_point!("panic_exec::after_write");
        // `out.held` drops here, releasing the chunk's budget
    }
    Ok(times)
}

fn time_context(streams: &[BoundStream], completed_at: Timestamp) -> Result<TimeContext> {
    let first = streams
        .first()
        .ok_or_else(|| ExecError::Invariant("no bound streams".into()))?;
    let starts = first.start_times();
    match (starts.first(), starts.last()) {
        (Some(&first_start), Some(&last_start)) => Ok(TimeContext {
            temporal_type: first.temporal_type(),
            first_start,
            last_start,
            completed_at,
        }),
        _ => Err(ExecError::Invariant(format!(
            "stream '{}' has no members",
            first.name()
        ))),
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
