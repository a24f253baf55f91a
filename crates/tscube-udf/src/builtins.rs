//! Built-in functions: pass-through and time-axis reductions.

use ndarray::Axis;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::cube::UdfData;
use crate::error::{Result, UdfError};
use crate::result::ResultTensor;
use crate::traits::{Udf, UdfOutput};

/// Returns every input cube unchanged; the first cube becomes the output,
/// one map per member, dated with the members' start times.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl Udf for PassThrough {
    fn name(&self) -> &str {
        "identity"
    }

    fn apply(&self, data: UdfData) -> Result<UdfOutput> {
        Ok(data.cubes.into_iter().map(ResultTensor::from).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    Sum,
    Mean,
    Min,
    Max,
}

impl Reducer {
    pub fn as_str(self) -> &'static str {
        match self {
            Reducer::Sum => "sum",
            Reducer::Mean => "mean",
            Reducer::Min => "min",
            Reducer::Max => "max",
        }
    }

    /// Reduce one pixel's time series, skipping NaN. All-NaN stays NaN.
    fn reduce<'a>(self, values: impl Iterator<Item = &'a f64>) -> f64 {
        let mut count = 0usize;
        let mut acc = match self {
            Reducer::Sum | Reducer::Mean => 0.0,
            Reducer::Min => f64::INFINITY,
            Reducer::Max => f64::NEG_INFINITY,
        };
        for v in values.filter(|v| !v.is_nan()) {
            count += 1;
            acc = match self {
                Reducer::Sum | Reducer::Mean => acc + v,
                Reducer::Min => acc.min(*v),
                Reducer::Max => acc.max(*v),
            };
        }
        match (self, count) {
            (_, 0) => f64::NAN,
            (Reducer::Mean, n) => acc / n as f64,
            _ => acc,
        }
    }
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reducer {
    type Err = UdfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "sum" => Ok(Reducer::Sum),
            "mean" => Ok(Reducer::Mean),
            "min" => Ok(Reducer::Min),
            "max" => Ok(Reducer::Max),
            other => Err(UdfError::Failed(format!("unknown reducer '{other}'"))),
        }
    }
}

/// Collapses the time axis of every input cube into one plane, labelled
/// `<cube id>_<reducer>`.
#[derive(Debug, Clone, Copy)]
pub struct TimeReduce {
    reducer: Reducer,
}

impl TimeReduce {
    pub fn new(reducer: Reducer) -> Self {
        Self { reducer }
    }
}

impl Udf for TimeReduce {
    fn name(&self) -> &str {
        self.reducer.as_str()
    }

    fn apply(&self, data: UdfData) -> Result<UdfOutput> {
        let reducer = self.reducer;
        Ok(data
            .cubes
            .into_iter()
            .map(|cube| {
                let plane = cube.array.map_axis(Axis(0), |lane| reducer.reduce(lane.iter()));
                ResultTensor::plane(format!("{}_{}", cube.id, reducer), plane)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cube::DataCube;
    use crate::result::NormalizedResult;
    use ndarray::Array3;
    use tscube_core::time::Timestamp;

    fn cube(id: &str, slices: &[f64]) -> DataCube {
        let array = Array3::from_shape_fn((slices.len(), 2, 2), |(t, _, _)| slices[t]);
        DataCube::new(
            id,
            array,
            (0..slices.len() as i64).map(Timestamp::Relative).collect(),
            vec![15.0, 5.0],
            vec![5.0, 15.0],
        )
        .unwrap()
    }

    #[test]
    fn pass_through_keeps_every_slice_and_time() {
        let data = UdfData::new(Some(4326), vec![cube("A", &[100.0, 200.0, 300.0])]);
        let out = NormalizedResult::normalize(PassThrough.apply(data).unwrap()).unwrap();
        assert_eq!(out.cardinality(), 3);
        assert_eq!(out.slice(2)[[0, 0]], 300.0);
        assert_eq!(out.times.as_ref().map(Vec::len), Some(3));
    }

    #[test]
    fn reductions_collapse_time() {
        let data = || UdfData::new(None, vec![cube("A", &[100.0, 200.0, 300.0])]);
        let expect = [
            (Reducer::Sum, 600.0),
            (Reducer::Mean, 200.0),
            (Reducer::Min, 100.0),
            (Reducer::Max, 300.0),
        ];
        for (r, want) in expect {
            let out = TimeReduce::new(r).apply(data()).unwrap();
            assert_eq!(out[0].label(), format!("A_{r}"));
            let n = NormalizedResult::normalize(out).unwrap();
            assert_eq!(n.cardinality(), 1);
            assert!(n.array.iter().all(|v| *v == want), "{r}");
        }
    }

    #[test]
    fn reductions_skip_nulls() {
        let data = UdfData::new(None, vec![cube("A", &[f64::NAN, 2.0, 4.0]), cube("B", &[f64::NAN])]);
        let out = TimeReduce::new(Reducer::Mean).apply(data).unwrap();
        assert_eq!(out.len(), 2);
        match &out[0] {
            ResultTensor::Plane { array, .. } => assert_eq!(array[[1, 1]], 3.0),
            other => panic!("expected plane, got {other:?}"),
        }
        match &out[1] {
            ResultTensor::Plane { array, .. } => assert!(array[[0, 0]].is_nan()),
            other => panic!("expected plane, got {other:?}"),
        }
    }
}
