//! Timing records as they appear in the timing log

use serde::{Deserialize, Serialize};

/// One completed `sampleStart`/`sampleEnd` measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingRecord {
    /// Encoded sample name
    pub name: String,

    /// Elapsed milliseconds
    pub duration: f64,

    /// Start offset from the scenario clock origin, in milliseconds
    #[serde(rename = "startTime", default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,

    /// End offset from the scenario clock origin, in milliseconds
    #[serde(rename = "endTime", default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
}

impl TimingRecord {
    pub fn new(name: impl Into<String>, duration: f64) -> Self {
        Self {
            name: name.into(),
            duration,
            start_time: None,
            end_time: None,
        }
    }
}

/// A mean computed upstream, as found in the pre-averaged log format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AveragedTiming {
    pub name: String,
    #[serde(rename = "avgTime")]
    pub avg_time: f64,
}

/// Why a log entry was not handed to the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkipReason {
    /// Line carries no record marker (console noise, reporter output)
    NoMarker,
    /// Line has the marker but is not a timing JSON object
    InvalidJson,
    /// Name does not decode into four fields
    MalformedName,
    /// Name belongs to an excluded scenario group or throttle condition
    Excluded,
    /// Duration is negative or not a finite number
    InvalidDuration,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoMarker => "no-marker",
            SkipReason::InvalidJson => "invalid-json",
            SkipReason::MalformedName => "malformed-name",
            SkipReason::Excluded => "excluded",
            SkipReason::InvalidDuration => "invalid-duration",
        }
    }
}

/// One item yielded by a log reader
#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    Sample(TimingRecord),
    Averaged(AveragedTiming),
    Skipped { line: usize, reason: SkipReason },
}
