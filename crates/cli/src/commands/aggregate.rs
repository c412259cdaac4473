//! Aggregate Command
//!
//! Aggregation phase: read a finished timing log, average every sample name and
//! publish the wide CSV report.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use searchperf_common::{log_reader, Aggregator, LogFormat, PivotTable};
use tracing::{info, warn};

use crate::config::{AggregationConfig, PerfConfig};
use crate::output::{print_item, print_success, OutputFormat, TableDisplay};

#[derive(Args, Debug, Default)]
pub struct AggregateArgs {
    /// Timing log to read
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Shape of the timing log (lines, averaged)
    #[arg(long)]
    pub log_format: Option<LogFormat>,

    /// CSV report to write
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Drop samples whose name contains this marker (repeatable, replaces config list)
    #[arg(short, long = "exclude")]
    pub exclude: Vec<String>,

    /// Keep every sample regardless of exclusion markers
    #[arg(long, conflicts_with = "exclude")]
    pub no_exclude: bool,

    /// Map legacy pre-load/post-load phases onto TTRL/TTRS
    #[arg(long, conflicts_with = "no_legacy_phases")]
    pub legacy_phases: bool,

    /// Keep legacy phase names as they are
    #[arg(long)]
    pub no_legacy_phases: bool,
}

impl AggregateArgs {
    /// Fold command-line overrides into the file configuration
    pub fn apply(&self, config: &mut AggregationConfig) {
        if let Some(input) = &self.input {
            config.input = input.clone();
        }
        if let Some(format) = self.log_format {
            config.format = format;
        }
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        if self.no_exclude {
            config.exclude_markers.clear();
        } else if !self.exclude.is_empty() {
            config.exclude_markers = self.exclude.clone();
        }
        if self.legacy_phases {
            config.legacy_phases = true;
        }
        if self.no_legacy_phases {
            config.legacy_phases = false;
        }
    }
}

/// What one aggregation run did
#[derive(Debug, Serialize)]
pub struct AggregationSummary {
    pub input: PathBuf,
    pub format: LogFormat,
    pub samples: u64,
    pub averaged: u64,
    pub skipped: u64,
    pub tests: usize,
    pub profiles: Vec<String>,
    pub applications: Vec<String>,
    pub output: PathBuf,
}

impl AggregationSummary {
    fn new(config: &AggregationConfig, aggregator: &Aggregator) -> Self {
        let stats = aggregator.stats();
        Self {
            input: config.input.clone(),
            format: config.format,
            samples: stats.samples,
            averaged: stats.averaged,
            skipped: stats.total_skipped(),
            tests: aggregator.test_names().len(),
            profiles: aggregator.throttle_profiles(),
            applications: aggregator.applications(),
            output: config.output.clone(),
        }
    }
}

impl TableDisplay for AggregationSummary {
    fn headers() -> Vec<&'static str> {
        vec![
            "Input",
            "Format",
            "Samples",
            "Averaged",
            "Skipped",
            "Tests",
            "Profiles",
            "Applications",
            "Output",
        ]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.input.display().to_string(),
            self.format.to_string(),
            self.samples.to_string(),
            self.averaged.to_string(),
            self.skipped.to_string(),
            self.tests.to_string(),
            self.profiles.join(", "),
            self.applications.join(", "),
            self.output.display().to_string(),
        ]
    }
}

/// Read, aggregate and write; the first failing stage aborts the run before any output
pub fn aggregate_to_csv(config: &AggregationConfig) -> searchperf_common::Result<AggregationSummary> {
    let reader = log_reader::open(config.format, &config.input, config.reader_options());
    let aggregator = searchperf_common::aggregate(reader.as_ref(), config.aggregator_options())?;

    for (reason, count) in &aggregator.stats().skipped {
        info!("Skipped {} entries ({})", count, reason.as_str());
    }
    if aggregator.is_empty() {
        warn!("No usable samples in {}", config.input.display());
    }

    let table = PivotTable::build(&aggregator);
    table.write_atomic(&config.output)?;
    Ok(AggregationSummary::new(config, &aggregator))
}

pub async fn execute(args: AggregateArgs, config: PerfConfig, format: OutputFormat) -> Result<()> {
    let mut aggregation = config.aggregation;
    args.apply(&mut aggregation);

    let summary = aggregate_to_csv(&aggregation)?;
    print_item(&summary, format);
    print_success(&format!("Report written to {}", summary.output.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use searchperf_common::PipelineStage;

    #[test]
    fn flags_override_config() {
        let mut config = AggregationConfig::default();
        AggregateArgs {
            log_format: Some(LogFormat::Averaged),
            exclude: vec!["flaky".to_string()],
            no_legacy_phases: true,
            ..Default::default()
        }
        .apply(&mut config);

        assert_eq!(config.format, LogFormat::Averaged);
        assert_eq!(config.exclude_markers, vec!["flaky"]);
        assert!(!config.legacy_phases);

        AggregateArgs {
            no_exclude: true,
            ..Default::default()
        }
        .apply(&mut config);
        assert!(config.exclude_markers.is_empty());
    }

    #[test]
    fn summary_reports_counts() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("timings.log");
        std::fs::write(
            &input,
            concat!(
                "{\"name\":\"scix.citations.normal.TTRL\",\"duration\":400}\n",
                "{\"name\":\"scix.citations.normal.TTRL\",\"duration\":600}\n",
                "{\"name\":\"scix.test-search.normal.TTRL\",\"duration\":1}\n",
                "Running 58 tests using 4 workers\n",
            ),
        )
        .unwrap();
        let config = AggregationConfig {
            input,
            output: dir.path().join("out.csv"),
            ..Default::default()
        };

        let summary = aggregate_to_csv(&config).unwrap();
        assert_eq!(summary.samples, 2);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.tests, 1);
        assert_eq!(summary.profiles, vec!["normal"]);

        let csv = std::fs::read_to_string(dir.path().join("out.csv")).unwrap();
        assert!(csv.lines().nth(1).unwrap().starts_with("citations,500,"));
    }

    #[test]
    fn failing_stage_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = AggregationConfig {
            input: dir.path().join("absent.log"),
            output: dir.path().join("out.csv"),
            ..Default::default()
        };

        let err = aggregate_to_csv(&config).unwrap_err();
        assert_eq!(err.stage(), Some(PipelineStage::Read));
        assert!(err.to_string().starts_with("read stage failed"));
        assert!(!config.output.exists());
    }
}
