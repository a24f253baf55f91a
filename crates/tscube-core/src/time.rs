//! Timestamps, temporal extents, and the fallback policy used when a UDF
//! collapses the time axis.

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Whether a collection is stamped with calendar time or with offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalType {
    Absolute,
    Relative,
}

/// A point in time. Relative offsets are counted in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timestamp {
    Absolute(NaiveDateTime),
    Relative(i64),
}

const ABSOLUTE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

impl Timestamp {
    /// Parse a timestamp of the given temporal type.
    ///
    /// Absolute values accept `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, or the `T`
    /// separated form; relative values are integers.
    pub fn parse(s: &str, kind: TemporalType) -> Result<Self> {
        let s = s.trim();
        match kind {
            TemporalType::Absolute => {
                for fmt in ABSOLUTE_FORMATS {
                    if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                        return Ok(Timestamp::Absolute(dt));
                    }
                }
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(Timestamp::Absolute)
                    .ok_or_else(|| Error::Time(format!("'{s}' is not an absolute time")))
            }
            TemporalType::Relative => s
                .parse::<i64>()
                .map(Timestamp::Relative)
                .map_err(|_| Error::Time(format!("'{s}' is not a relative time"))),
        }
    }

    /// Wall-clock "now", used as the run-completion stamp.
    pub fn now() -> Self {
        Timestamp::Absolute(Local::now().naive_local())
    }

    pub fn temporal_type(&self) -> TemporalType {
        match self {
            Timestamp::Absolute(_) => TemporalType::Absolute,
            Timestamp::Relative(_) => TemporalType::Relative,
        }
    }

    /// Shift by `seconds`, failing on calendar overflow.
    pub fn checked_add_seconds(&self, seconds: i64) -> Result<Self> {
        match self {
            Timestamp::Absolute(dt) => Duration::try_seconds(seconds)
                .and_then(|d| dt.checked_add_signed(d))
                .map(Timestamp::Absolute)
                .ok_or_else(|| Error::Time(format!("{dt} + {seconds}s overflows"))),
            Timestamp::Relative(v) => v
                .checked_add(seconds)
                .map(Timestamp::Relative)
                .ok_or_else(|| Error::Time(format!("{v} + {seconds} overflows"))),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::Absolute(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Timestamp::Relative(v) => write!(f, "{v}"),
        }
    }
}

/// Valid time of one raster map: a start and an optional end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalExtent {
    pub start: Timestamp,
    pub end: Option<Timestamp>,
}

impl TemporalExtent {
    pub fn instant(start: Timestamp) -> Self {
        Self { start, end: None }
    }

    pub fn interval(start: Timestamp, end: Timestamp) -> Result<Self> {
        if start.temporal_type() != end.temporal_type() {
            return Err(Error::Time(format!(
                "interval mixes temporal types: {start} .. {end}"
            )));
        }
        if end < start {
            return Err(Error::Time(format!("interval ends before it starts: {start} .. {end}")));
        }
        Ok(Self {
            start,
            end: Some(end),
        })
    }

    /// The end if present, otherwise the start.
    pub fn latest(&self) -> Timestamp {
        self.end.unwrap_or(self.start)
    }
}

/// How an output slot is stamped when the UDF result carries no time for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampPolicy {
    /// Wall-clock time at the end of the row loop.
    #[default]
    RunCompletion,
    /// Start of the first member of the first input.
    FirstInputStart,
    /// Start of the last member of the first input.
    LastInputStart,
}

impl FromStr for TimestampPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "run_completion" | "now" => Ok(TimestampPolicy::RunCompletion),
            "first_input_start" | "first" => Ok(TimestampPolicy::FirstInputStart),
            "last_input_start" | "last" => Ok(TimestampPolicy::LastInputStart),
            other => Err(Error::Config(format!("unknown timestamp policy '{other}'"))),
        }
    }
}
