//! Timing aggregation
//!
//! One [`Aggregator`] is built per aggregation run. It owns every bucket and run
//! counter for that run and is dropped once the report is written.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::error::{Error, PipelineStage, Result};
use crate::log_reader::LogReader;
use crate::record::{AveragedTiming, LogEntry, SkipReason, TimingRecord};
use crate::sample_name::{TimingSampleName, KNOWN_APPLICATIONS};
use crate::throttle;

/// Running sum and count for one encoded sample name
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateBucket {
    sum_duration: f64,
    sample_count: u64,
    pre_averaged: bool,
}

impl AggregateBucket {
    fn first(duration: f64) -> Self {
        Self {
            sum_duration: duration,
            sample_count: 1,
            pre_averaged: false,
        }
    }

    fn averaged(mean: f64) -> Self {
        Self {
            sum_duration: mean,
            sample_count: 1,
            pre_averaged: true,
        }
    }

    pub fn sum_duration(&self) -> f64 {
        self.sum_duration
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// True when the mean was supplied by the log rather than computed here
    pub fn is_pre_averaged(&self) -> bool {
        self.pre_averaged
    }

    pub fn mean(&self) -> f64 {
        self.sum_duration / self.sample_count as f64
    }
}

/// Counts of what happened to each log entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationStats {
    pub samples: u64,
    pub averaged: u64,
    pub skipped: BTreeMap<SkipReason, u64>,
}

impl AggregationStats {
    pub fn accepted(&self) -> u64 {
        self.samples + self.averaged
    }

    pub fn total_skipped(&self) -> u64 {
        self.skipped.values().sum()
    }

    fn skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_insert(0) += 1;
    }
}

#[derive(Debug, Clone, Default)]
pub struct AggregatorOptions {
    /// Fold `pre-load`/`post-load` samples into `TTRL`/`TTRS`
    pub legacy_phases: bool,
}

/// Per-key accumulation of timing samples
#[derive(Debug, Default)]
pub struct Aggregator {
    options: AggregatorOptions,
    buckets: BTreeMap<TimingSampleName, AggregateBucket>,
    /// (testName, throttleProfile) -> application -> completed runs
    runs: BTreeMap<(String, String), BTreeMap<String, u64>>,
    stats: AggregationStats,
}

impl Aggregator {
    pub fn new(options: AggregatorOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    fn key_for(&mut self, raw: &str) -> Option<TimingSampleName> {
        match TimingSampleName::decode(raw) {
            Ok(name) if self.options.legacy_phases => Some(name.with_legacy_phase_mapped()),
            Ok(name) => Some(name),
            Err(e) => {
                warn!("Skipping timing record: {}", e);
                self.stats.skip(SkipReason::MalformedName);
                None
            }
        }
    }

    /// Fold one raw measurement into its bucket
    pub fn add_sample(&mut self, record: &TimingRecord) -> bool {
        let Some(key) = self.key_for(&record.name) else {
            return false;
        };

        if key.phase_kind().is_some_and(|p| p.is_load()) {
            let counter = self
                .runs
                .entry((key.test_name.clone(), key.throttle_profile.clone()))
                .or_default()
                .entry(key.application.clone())
                .or_insert(0);
            *counter += 1;
        }

        self.buckets
            .entry(key)
            .and_modify(|b| {
                b.sum_duration += record.duration;
                b.sample_count += 1;
            })
            .or_insert_with(|| AggregateBucket::first(record.duration));
        self.stats.samples += 1;
        true
    }

    /// Store an upstream mean as-is
    pub fn add_averaged(&mut self, timing: &AveragedTiming) -> bool {
        let Some(key) = self.key_for(&timing.name) else {
            return false;
        };

        if self.buckets.insert(key, AggregateBucket::averaged(timing.avg_time)).is_some() {
            warn!("Duplicate pre-averaged entry for {}, keeping the last one", timing.name);
        }
        self.stats.averaged += 1;
        true
    }

    pub fn ingest(&mut self, entry: LogEntry) {
        match entry {
            LogEntry::Sample(record) => {
                self.add_sample(&record);
            }
            LogEntry::Averaged(timing) => {
                self.add_averaged(&timing);
            }
            LogEntry::Skipped { line, reason } => {
                match reason {
                    SkipReason::NoMarker => {}
                    SkipReason::MalformedName => {
                        warn!("Skipping entry {}: sample name does not decode into four fields", line)
                    }
                    _ => debug!("Skipped entry {} ({})", line, reason.as_str()),
                }
                self.stats.skip(reason);
            }
        }
    }

    /// Drain a reader into this aggregator
    pub fn consume(&mut self, reader: &dyn LogReader) -> Result<()> {
        for entry in reader.entries()? {
            let entry = entry.map_err(|e| match e {
                Error::Pipeline { .. } => e,
                other => other.at_stage(PipelineStage::Aggregate, reader.path()),
            })?;
            self.ingest(entry);
        }

        info!(
            "Aggregated {} ({} format): {} accepted, {} skipped, {} buckets",
            reader.path().display(),
            reader.format(),
            self.stats.accepted(),
            self.stats.total_skipped(),
            self.buckets.len()
        );
        Ok(())
    }

    pub fn bucket(&self, key: &TimingSampleName) -> Option<&AggregateBucket> {
        self.buckets.get(key)
    }

    pub fn buckets(&self) -> impl Iterator<Item = (&TimingSampleName, &AggregateBucket)> {
        self.buckets.iter()
    }

    /// Mean duration for a key
    pub fn mean_of(&self, key: &TimingSampleName) -> Result<f64> {
        self.buckets
            .get(key)
            .map(AggregateBucket::mean)
            .ok_or_else(|| Error::MissingBucket(key.encode()))
    }

    /// Completed runs for one (test, profile, application)
    pub fn run_count(&self, test_name: &str, throttle_profile: &str, application: &str) -> Option<u64> {
        self.runs
            .get(&(test_name.to_string(), throttle_profile.to_string()))
            .and_then(|apps| apps.get(application))
            .copied()
    }

    /// Completed runs per application for one (test, profile)
    pub fn run_counts(&self, test_name: &str, throttle_profile: &str) -> Option<&BTreeMap<String, u64>> {
        self.runs.get(&(test_name.to_string(), throttle_profile.to_string()))
    }

    pub fn stats(&self) -> &AggregationStats {
        &self.stats
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Observed throttle profiles, in profile-table order then by name
    pub fn throttle_profiles(&self) -> Vec<String> {
        let observed: BTreeSet<&str> = self.buckets.keys().map(|k| k.throttle_profile.as_str()).collect();
        let mut profiles: Vec<String> = observed.into_iter().map(String::from).collect();
        profiles.sort_by(|a, b| {
            let rank = |t: &str| throttle::rank(t).unwrap_or(usize::MAX);
            rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
        });
        profiles
    }

    /// Known applications followed by any other observed ones
    pub fn applications(&self) -> Vec<String> {
        let mut apps: Vec<String> = KNOWN_APPLICATIONS.iter().map(|a| a.to_string()).collect();
        let extra: BTreeSet<&str> = self
            .buckets
            .keys()
            .map(|k| k.application.as_str())
            .filter(|a| !KNOWN_APPLICATIONS.contains(a))
            .collect();
        apps.extend(extra.into_iter().map(String::from));
        apps
    }

    /// Distinct test names, sorted
    pub fn test_names(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self.buckets.keys().map(|k| k.test_name.as_str()).collect();
        names.into_iter().map(String::from).collect()
    }
}

/// Read a whole log into a fresh aggregator
pub fn aggregate(reader: &dyn LogReader, options: AggregatorOptions) -> Result<Aggregator> {
    let mut aggregator = Aggregator::new(options);
    aggregator.consume(reader)?;
    Ok(aggregator)
}
