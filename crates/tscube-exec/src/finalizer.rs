//! Temporal finalization: date the closed outputs and register them as a new
//! collection.
//!
//! The finalizer is a one-way state machine:
//! `Idle → Created → Populated → Finalized`. Calling a step out of order is an
//! invariant error and performs no catalogue mutation.

use tscube_core::collection::{CollectionExtent, CollectionInfo, RasterMapDescriptor};
use tscube_core::manifest::OutputRecord;
use tscube_core::time::{TemporalExtent, TemporalType, Timestamp, TimestampPolicy};
use tscube_io::metadata::{MetadataStore, UpsertOutcome};

use crate::error::{ExecError, Result};
use crate::writer::ClosedOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizerState {
    Idle,
    Created,
    Populated,
    Finalized,
}

/// Times available for stamping outputs that carry no explicit time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeContext {
    pub temporal_type: TemporalType,
    /// Start of the first member of the first input.
    pub first_start: Timestamp,
    /// Start of the last member of the first input.
    pub last_start: Timestamp,
    /// Wall-clock time when the row loop finished.
    pub completed_at: Timestamp,
}

impl TimeContext {
    fn fallback(&self, policy: TimestampPolicy) -> Timestamp {
        match (policy, self.temporal_type) {
            (TimestampPolicy::RunCompletion, TemporalType::Absolute) => self.completed_at,
            (TimestampPolicy::RunCompletion, TemporalType::Relative) => self.first_start,
            (TimestampPolicy::FirstInputStart, _) => self.first_start,
            (TimestampPolicy::LastInputStart, _) => self.last_start,
        }
    }
}

/// Valid time of each output slot.
///
/// Explicit times (the result's time coordinate from the first chunk) win;
/// otherwise every slot gets the policy's fallback stamp.
pub fn resolve_extents(
    count: usize,
    explicit: Option<&[Timestamp]>,
    policy: TimestampPolicy,
    ctx: &TimeContext,
) -> Result<Vec<TemporalExtent>> {
    match explicit {
        Some(times) => {
            if times.len() != count {
                return Err(ExecError::Finalize(format!(
                    "{} explicit timestamps for {count} outputs",
                    times.len()
                )));
            }
            times
                .iter()
                .map(|t| {
                    if t.temporal_type() != ctx.temporal_type {
                        Err(ExecError::Finalize(format!(
                            "timestamp {t} is not {:?} like the input collection",
                            ctx.temporal_type
                        )))
                    } else {
                        Ok(TemporalExtent::instant(*t))
                    }
                })
                .collect()
        }
        None => Ok(vec![TemporalExtent::instant(ctx.fallback(policy)); count]),
    }
}

pub struct TemporalFinalizer<'m> {
    meta: &'m dyn MetadataStore,
    info: CollectionInfo,
    state: FinalizerState,
    records: Vec<OutputRecord>,
}

impl<'m> TemporalFinalizer<'m> {
    pub fn new(meta: &'m dyn MetadataStore, info: CollectionInfo) -> Self {
        Self {
            meta,
            info,
            state: FinalizerState::Idle,
            records: Vec::new(),
        }
    }

    pub fn state(&self) -> FinalizerState {
        self.state
    }

    fn require(&self, want: FinalizerState, step: &str) -> Result<()> {
        if self.state != want {
            return Err(ExecError::Invariant(format!(
                "finalizer cannot {step} from {:?}",
                self.state
            )));
        }
        Ok(())
    }

    /// `Idle → Created`: create the empty output collection.
    pub fn create(&mut self, overwrite: bool) -> Result<()> {
        self.require(FinalizerState::Idle, "create")?;
        self.meta.create_collection(&self.info, overwrite)?;
        self.state = FinalizerState::Created;
        Ok(())
    }

    /// `Created → Populated`: upsert each output's metadata and register it.
    pub fn populate(
        &mut self,
        outputs: &[ClosedOutput],
        extents: &[TemporalExtent],
    ) -> Result<&[OutputRecord]> {
        self.require(FinalizerState::Created, "populate")?;
        if outputs.is_empty() {
            return Err(ExecError::NoOutputs);
        }
        if outputs.len() != extents.len() {
            return Err(ExecError::Invariant(format!(
                "{} outputs but {} extents",
                outputs.len(),
                extents.len()
            )));
        }

        for (out, extent) in outputs.iter().zip(extents) {
            let desc = RasterMapDescriptor {
                id: out.map.clone(),
                extent: *extent,
                cell_type: out.cell_type,
                semantic_label: None,
            };
            let outcome = self.meta.upsert_map(&desc)?;
            if outcome == UpsertOutcome::Updated {
                tracing::debug!(map = %out.map, "replaced existing map metadata");
            }
            self.meta
                .register_member(&self.info.name, &out.map, *extent, None)?;
            self.records.push(OutputRecord {
                name: out.map.to_string(),
                rows: out.rows,
                digest: out.digest,
                start: extent.start,
                end: extent.end,
            });
        }
        self.state = FinalizerState::Populated;
        Ok(&self.records)
    }

    /// `Populated → Finalized`: recompute the collection's extent.
    pub fn finalize(&mut self) -> Result<CollectionExtent> {
        self.require(FinalizerState::Populated, "finalize")?;
        let extent = self.meta.recompute_extent(&self.info.name)?;
        self.state = FinalizerState::Finalized;
        Ok(extent)
    }

    pub fn into_records(self) -> Vec<OutputRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tscube_core::cell::CellType;
    use tscube_core::collection::MapId;
    use tscube_core::hash::hash_bytes;
    use tscube_core::id::SlotId;
    use tscube_core::region::Region;
    use tscube_io::MemoryBackend;

    fn day(s: &str) -> Timestamp {
        Timestamp::parse(s, TemporalType::Absolute).unwrap()
    }

    fn ctx() -> TimeContext {
        TimeContext {
            temporal_type: TemporalType::Absolute,
            first_start: day("2001-01-01"),
            last_start: day("2001-01-05"),
            completed_at: day("2024-06-01"),
        }
    }

    fn closed(name: &str, slot: usize) -> ClosedOutput {
        ClosedOutput {
            slot: SlotId::new(slot),
            map: MapId::new(name),
            cell_type: CellType::Float64,
            rows: 8,
            digest: hash_bytes(name.as_bytes()),
        }
    }

    #[test]
    fn policies_pick_fallback_stamps() {
        let c = ctx();
        let stamp = |p| resolve_extents(2, None, p, &c).unwrap()[1].start;
        assert_eq!(stamp(TimestampPolicy::RunCompletion), day("2024-06-01"));
        assert_eq!(stamp(TimestampPolicy::FirstInputStart), day("2001-01-01"));
        assert_eq!(stamp(TimestampPolicy::LastInputStart), day("2001-01-05"));

        let rel = TimeContext {
            temporal_type: TemporalType::Relative,
            first_start: Timestamp::Relative(3),
            last_start: Timestamp::Relative(9),
            completed_at: day("2024-06-01"),
        };
        let ext = resolve_extents(1, None, TimestampPolicy::RunCompletion, &rel).unwrap();
        assert_eq!(ext[0].start, Timestamp::Relative(3));
    }

    #[test]
    fn explicit_times_must_match_collection_type() {
        let c = ctx();
        let times = [day("2001-01-01"), day("2001-01-03")];
        let ext = resolve_extents(2, Some(&times[..]), TimestampPolicy::RunCompletion, &c).unwrap();
        assert_eq!(ext[1], TemporalExtent::instant(day("2001-01-03")));

        let bad = [Timestamp::Relative(1)];
        assert!(matches!(
            resolve_extents(1, Some(&bad[..]), TimestampPolicy::RunCompletion, &c),
            Err(ExecError::Finalize(_))
        ));
    }

    #[test]
    fn state_machine_runs_in_order() {
        let region = Region::from_bounds(80.0, 0.0, 120.0, 0.0, 10.0, 10.0).unwrap();
        let b = MemoryBackend::with_region(region);
        b.put_constant_raster("o_0", CellType::Float64, 1.0).unwrap();
        b.put_constant_raster("o_1", CellType::Float64, 2.0).unwrap();

        let mut f = TemporalFinalizer::new(&b, CollectionInfo::new("B", TemporalType::Absolute));
        assert!(matches!(f.finalize(), Err(ExecError::Invariant(_))));
        assert!(!b.has_collection("B"));

        f.create(false).unwrap();
        assert!(matches!(f.create(false), Err(ExecError::Invariant(_))));

        let outs = [closed("o_0", 0), closed("o_1", 1)];
        let ext = resolve_extents(2, None, TimestampPolicy::FirstInputStart, &ctx()).unwrap();
        let records = f.populate(&outs, &ext).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(f.state(), FinalizerState::Populated);

        let extent = f.finalize().unwrap();
        assert_eq!(extent.map_count, 2);
        assert_eq!(extent.start, Some(day("2001-01-01")));
        assert_eq!(f.state(), FinalizerState::Finalized);
        assert!(matches!(f.populate(&outs, &ext), Err(ExecError::Invariant(_))));
    }
}
