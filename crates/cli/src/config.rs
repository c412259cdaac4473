//! SearchPerf configuration file
//!
//! ```toml
//! [collection]
//! timing_log = "perf-results/timings.log"
//! workers = 4
//! profiles = ["normal", "eth-2x"]
//!
//! [browser]
//! headless = true
//!
//! [aggregation]
//! output = "aggregated_averages.csv"
//! exclude_markers = ["test-search", "4x-slow-cpu"]
//!
//! [[applications]]
//! name = "scix"
//! base_url = "http://localhost:8000"
//! selectors = { search_bar = "#q", search_button = "#go", search_results = ".result" }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use searchperf_common::log_reader::{DEFAULT_EXCLUDE_MARKERS, DEFAULT_RECORD_MARKER};
use searchperf_common::{throttle, AggregatorOptions, LogFormat, ReaderOptions};
use searchperf_e2e::{AppTarget, PlaywrightConfig, RunnerConfig};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "searchperf.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PerfConfig {
    pub collection: CollectionConfig,
    pub browser: PlaywrightConfig,
    pub aggregation: AggregationConfig,

    /// Application target overrides
    pub applications: Vec<AppTarget>,
}

/// Collection phase settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Shared timing log every scenario appends to
    pub timing_log: PathBuf,

    /// Suite report written after a run
    pub report: PathBuf,

    /// Concurrent browser sessions
    pub workers: usize,

    /// Selector wait timeout in milliseconds
    pub timeout_ms: u64,

    /// Timeout multiplier for throttled profiles
    pub slow_multiplier: f64,

    pub profiles: Vec<String>,
    pub applications: Vec<String>,

    /// YAML query catalog replacing the built-in one
    pub queries_file: Option<PathBuf>,

    pub default_refinement: String,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        let runner = RunnerConfig::default();
        Self {
            timing_log: PathBuf::from("perf-results/timings.log"),
            report: PathBuf::from("perf-results/suite.json"),
            workers: runner.workers,
            timeout_ms: runner.timeout.as_millis() as u64,
            slow_multiplier: runner.slow_multiplier,
            profiles: vec![throttle::BASELINE.to_string()],
            applications: runner.applications,
            queries_file: None,
            default_refinement: runner.default_refinement,
        }
    }
}

/// Aggregation phase settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub input: PathBuf,
    pub format: LogFormat,
    pub output: PathBuf,
    pub exclude_markers: Vec<String>,
    pub record_marker: String,
    pub legacy_phases: bool,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("perf-results/timings.log"),
            format: LogFormat::Lines,
            output: PathBuf::from("aggregated_averages.csv"),
            exclude_markers: DEFAULT_EXCLUDE_MARKERS.iter().map(|m| m.to_string()).collect(),
            record_marker: DEFAULT_RECORD_MARKER.to_string(),
            legacy_phases: true,
        }
    }
}

impl AggregationConfig {
    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            record_marker: self.record_marker.clone(),
            exclude_markers: self.exclude_markers.clone(),
        }
    }

    pub fn aggregator_options(&self) -> AggregatorOptions {
        AggregatorOptions {
            legacy_phases: self.legacy_phases,
        }
    }
}

impl PerfConfig {
    /// Load configuration from file; a missing file yields defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Runner settings for the collection phase
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            applications: self.collection.applications.clone(),
            profiles: self.collection.profiles.clone(),
            workers: self.collection.workers,
            timeout: Duration::from_millis(self.collection.timeout_ms),
            slow_multiplier: self.collection.slow_multiplier,
            default_refinement: self.collection.default_refinement.clone(),
            app_overrides: self.applications.clone(),
        }
    }
}
