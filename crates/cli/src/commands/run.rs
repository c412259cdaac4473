//! Run Command
//!
//! Collection phase: time every query against every application under every
//! requested throttle profile, appending samples to the timing log.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use searchperf_e2e::runner;
use searchperf_e2e::{
    JsonLinesSink, PerfRunner, PlaywrightLauncher, QueryCatalog, ScenarioReport, SuiteResult,
};
use tracing::info;

use crate::config::PerfConfig;
use crate::output::{or_dash, print_list, print_success, print_warning, OutputFormat, TableDisplay};

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Applications to time (repeatable, default from config)
    #[arg(short, long = "app")]
    pub apps: Vec<String>,

    /// Throttle profiles to run under (repeatable, default from config)
    #[arg(short, long = "profile")]
    pub profiles: Vec<String>,

    /// Only run these queries from the catalog (repeatable)
    #[arg(short, long = "query")]
    pub queries: Vec<String>,

    /// YAML query catalog replacing the built-in one
    #[arg(long)]
    pub query_file: Option<PathBuf>,

    /// Timing log to append to
    #[arg(long)]
    pub log: Option<PathBuf>,

    /// Concurrent browser sessions
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Selector wait timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Where to write the JSON suite report
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Plan the scenario matrix without launching a browser
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    /// Fold command-line overrides into the file configuration
    pub fn apply(&self, config: &mut PerfConfig) {
        let collection = &mut config.collection;
        if !self.apps.is_empty() {
            collection.applications = self.apps.clone();
        }
        if !self.profiles.is_empty() {
            collection.profiles = self.profiles.clone();
        }
        if let Some(file) = &self.query_file {
            collection.queries_file = Some(file.clone());
        }
        if let Some(log) = &self.log {
            collection.timing_log = log.clone();
        }
        if let Some(workers) = self.workers {
            collection.workers = workers;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            collection.timeout_ms = timeout_ms;
        }
        if let Some(report) = &self.report {
            collection.report = report.clone();
        }
        if self.headed {
            config.browser.headless = false;
        }
    }
}

/// Scenario outcome row
#[derive(Serialize)]
pub struct ScenarioDisplay {
    pub scenario: String,
    pub success: bool,
    pub samples: usize,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl From<&ScenarioReport> for ScenarioDisplay {
    fn from(report: &ScenarioReport) -> Self {
        Self {
            scenario: report.name.clone(),
            success: report.success,
            samples: report.samples_recorded,
            duration_ms: report.duration_ms,
            error: report.error.clone(),
        }
    }
}

impl TableDisplay for ScenarioDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Scenario", "Passed", "Samples", "Duration", "Error"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.scenario.clone(),
            if self.success { "✓" } else { "✗" }.to_string(),
            self.samples.to_string(),
            format!("{}ms", self.duration_ms),
            or_dash(self.error.as_deref()),
        ]
    }
}

fn load_catalog(config: &PerfConfig, only: &[String]) -> Result<QueryCatalog> {
    let catalog = QueryCatalog::load(config.collection.queries_file.as_deref())
        .context("failed to load query catalog")?;
    if only.is_empty() {
        Ok(catalog)
    } else {
        Ok(catalog.filter(only)?)
    }
}

/// Execute the collection run, returning whether every scenario passed
///
/// Errors returned here are fatal (bad configuration, unwritable log); failed
/// scenarios are reported in the suite result instead.
pub async fn execute(args: RunArgs, mut config: PerfConfig, format: OutputFormat) -> Result<bool> {
    args.apply(&mut config);
    let catalog = load_catalog(&config, &args.queries)?;

    if args.dry_run {
        return dry_run(&config, &catalog, format);
    }

    let scenarios = runner::plan(&config.runner_config(), &catalog)?;
    let launcher = PlaywrightLauncher::new(config.browser.clone())?;
    let sink = JsonLinesSink::open(&config.collection.timing_log).with_context(|| {
        format!("cannot open timing log {}", config.collection.timing_log.display())
    })?;
    let perf_runner = PerfRunner::new(config.runner_config(), Arc::new(launcher), Arc::new(sink));

    info!(
        "Appending samples to {}",
        config.collection.timing_log.display()
    );
    let suite = perf_runner.run(scenarios).await;

    suite
        .write_results(&config.collection.report)
        .with_context(|| format!("cannot write suite report {}", config.collection.report.display()))?;

    report(&suite, format);
    Ok(suite.success())
}

fn dry_run(config: &PerfConfig, catalog: &QueryCatalog, format: OutputFormat) -> Result<bool> {
    let scenarios = runner::plan(&config.runner_config(), catalog)?;
    let rows: Vec<ScenarioDisplay> = scenarios
        .iter()
        .map(|scenario| ScenarioDisplay {
            scenario: scenario.name(),
            success: true,
            samples: 0,
            duration_ms: 0,
            error: None,
        })
        .collect();

    print_list(&rows, format);
    print_success(&format!("{} scenario(s) planned", rows.len()));
    Ok(true)
}

fn report(suite: &SuiteResult, format: OutputFormat) {
    let rows: Vec<ScenarioDisplay> = suite.results.iter().map(ScenarioDisplay::from).collect();
    print_list(&rows, format);

    if suite.success() {
        print_success(&format!(
            "{} scenario(s) passed in {}ms",
            suite.passed, suite.duration_ms
        ));
    } else {
        print_warning(&format!(
            "{} of {} scenario(s) failed",
            suite.failed, suite.total
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file_values() {
        let mut config = PerfConfig::default();
        let args = RunArgs {
            profiles: vec!["eth-2x".to_string()],
            workers: Some(1),
            log: Some(PathBuf::from("/tmp/t.log")),
            headed: true,
            ..Default::default()
        };
        args.apply(&mut config);

        assert_eq!(config.collection.profiles, vec!["eth-2x"]);
        assert_eq!(config.collection.applications, vec!["scix", "bbb"]);
        assert_eq!(config.collection.workers, 1);
        assert_eq!(config.collection.timing_log, PathBuf::from("/tmp/t.log"));
        assert!(!config.browser.headless);
    }

    #[test]
    fn catalog_subset() {
        let config = PerfConfig::default();
        let catalog = load_catalog(&config, &["citations".to_string()]).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(load_catalog(&config, &["missing".to_string()]).is_err());
    }
}
