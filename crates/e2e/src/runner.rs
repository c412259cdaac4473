//! Collection runner that fans scenarios out over isolated browser sessions

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use searchperf_common::throttle::{self, ThrottleProfile};
use tracing::{debug, error, info, warn};

use crate::browser::BrowserLauncher;
use crate::catalog::{AppTarget, QueryCatalog};
use crate::error::{E2eError, E2eResult};
use crate::recorder::{TimingRecorder, TimingSink};
use crate::scenario::{run_scenario, Scenario};

/// Outcome of one scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    pub application: String,
    pub test_name: String,
    pub throttle_profile: String,
    pub success: bool,
    pub duration_ms: u64,

    /// Records persisted to the timing log
    pub samples_recorded: usize,

    /// Samples that were open when the scenario failed and were dropped
    #[serde(default)]
    pub abandoned_samples: Vec<String>,

    pub error: Option<String>,
}

/// Result of a whole collection run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioReport>,
}

impl SuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScenarioReport> {
        self.results.iter().filter(|r| !r.success)
    }

    /// Write the suite result as pretty JSON
    pub fn write_results(&self, path: &Path) -> E2eResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!("Results written to: {}", path.display());
        Ok(())
    }
}

/// Configuration for the collection runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Applications to time, by name
    pub applications: Vec<String>,

    /// Throttle profile tags to run every scenario under
    pub profiles: Vec<String>,

    /// Maximum number of concurrent browser sessions
    pub workers: usize,

    /// Selector wait timeout for the baseline profile
    pub timeout: Duration,

    /// Timeout multiplier for throttled profiles
    pub slow_multiplier: f64,

    /// Refinement token for queries that do not define one
    pub default_refinement: String,

    /// Replacement application targets, matched by name
    pub app_overrides: Vec<AppTarget>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            applications: vec!["scix".to_string(), "bbb".to_string()],
            profiles: vec![throttle::BASELINE.to_string()],
            workers: 4,
            timeout: Duration::from_secs(30),
            slow_multiplier: 3.0,
            default_refinement: "property:refereed".to_string(),
            app_overrides: Vec::new(),
        }
    }
}

impl RunnerConfig {
    /// Selector timeout for a profile; throttled runs get more time
    pub fn timeout_for(&self, profile: &ThrottleProfile) -> E2eResult<Duration> {
        if profile.is_baseline() {
            return Ok(self.timeout);
        }
        let scaled = self.timeout.as_secs_f64() * self.slow_multiplier.max(1.0);
        Duration::try_from_secs_f64(scaled).map_err(|_| {
            E2eError::Config(format!(
                "timeout of {}ms x slow_multiplier {} is out of range for profile '{}'",
                self.timeout.as_millis(),
                self.slow_multiplier,
                profile.tag
            ))
        })
    }
}

/// Expand profile x application x query into scenarios
///
/// Every profile tag and application is checked here, so a bad tag fails before
/// any browser is launched.
pub fn plan(config: &RunnerConfig, catalog: &QueryCatalog) -> E2eResult<Vec<Scenario>> {
    throttle::validate_tags(&config.profiles)?;
    catalog.validate()?;
    let targets = AppTarget::resolve(&config.applications, &config.app_overrides)?;

    let mut scenarios = Vec::new();
    for tag in &config.profiles {
        let profile = throttle::lookup(tag)?;
        let timeout = config.timeout_for(profile)?;
        for target in &targets {
            for query in &catalog.queries {
                scenarios.push(Scenario::new(
                    target.clone(),
                    query.clone(),
                    tag,
                    &config.default_refinement,
                    timeout,
                )?);
            }
        }
    }

    debug!(
        "Planned {} scenario(s): {} profile(s) x {} application(s) x {} queries",
        scenarios.len(),
        config.profiles.len(),
        targets.len(),
        catalog.len()
    );
    Ok(scenarios)
}

/// Runs scenario matrices against a browser launcher and timing sink
pub struct PerfRunner {
    config: RunnerConfig,
    launcher: Arc<dyn BrowserLauncher>,
    sink: Arc<dyn TimingSink>,
}

impl PerfRunner {
    pub fn new(config: RunnerConfig, launcher: Arc<dyn BrowserLauncher>, sink: Arc<dyn TimingSink>) -> Self {
        Self {
            config,
            launcher,
            sink,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Expand the configured matrix for a catalog, see [`plan`]
    pub fn plan(&self, catalog: &QueryCatalog) -> E2eResult<Vec<Scenario>> {
        plan(&self.config, catalog)
    }

    /// Plan and run the full matrix for a catalog
    pub async fn run_catalog(&self, catalog: &QueryCatalog) -> E2eResult<SuiteResult> {
        let scenarios = self.plan(catalog)?;
        Ok(self.run(scenarios).await)
    }

    /// Run scenarios with at most `workers` browser sessions at once
    ///
    /// Reports come back in plan order regardless of completion order.
    pub async fn run(&self, scenarios: Vec<Scenario>) -> SuiteResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let total = scenarios.len();
        let workers = self.config.workers.max(1);

        info!("Running {} scenario(s) with {} worker(s)...", total, workers);

        let results: Vec<ScenarioReport> = stream::iter(scenarios)
            .map(|scenario| self.run_one(scenario))
            .buffered(workers)
            .collect()
            .await;

        let passed = results.iter().filter(|r| r.success).count();
        let failed = total - passed;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Collection results: {} passed, {} failed ({} ms)",
            passed, failed, duration_ms
        );

        SuiteResult {
            started_at,
            total,
            passed,
            failed,
            duration_ms,
            results,
        }
    }

    /// Run a single scenario in its own browser session
    pub async fn run_one(&self, scenario: Scenario) -> ScenarioReport {
        let start = Instant::now();
        let name = scenario.name();
        let mut recorder = TimingRecorder::new(self.sink.clone());
        let mut abandoned = Vec::new();

        let outcome = match self.launcher.launch(&scenario.target.base_url).await {
            Ok(mut browser) => {
                let result = run_scenario(browser.as_mut(), &mut recorder, &scenario).await;
                if result.is_err() {
                    abandoned = recorder.abandon();
                }
                if let Err(e) = browser.close().await {
                    warn!("Failed to close browser for {}: {}", name, e);
                }
                result
            }
            Err(e) => Err(e),
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let prefix = scenario.prefix();
        let error = match &outcome {
            Ok(()) => {
                info!("✓ {} ({} ms)", name, duration_ms);
                None
            }
            Err(e) => {
                error!("✗ {} - {}", name, e);
                Some(e.to_string())
            }
        };

        ScenarioReport {
            name: name.clone(),
            application: prefix.application().to_string(),
            test_name: prefix.test_name().to_string(),
            throttle_profile: prefix.throttle_profile().to_string(),
            success: outcome.is_ok(),
            duration_ms,
            samples_recorded: recorder.recorded(),
            abandoned_samples: abandoned,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttled_profiles_get_longer_timeouts() {
        let config = RunnerConfig {
            timeout: Duration::from_secs(10),
            slow_multiplier: 3.0,
            ..Default::default()
        };
        let normal = throttle::lookup("normal").unwrap();
        let slow = throttle::lookup("3g-4x").unwrap();
        assert_eq!(config.timeout_for(normal).unwrap(), Duration::from_secs(10));
        assert_eq!(config.timeout_for(slow).unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn out_of_range_timeouts_are_rejected_at_planning() {
        let slow = throttle::lookup("3g-4x").unwrap();
        for slow_multiplier in [1e30, f64::INFINITY] {
            let config = RunnerConfig {
                profiles: vec!["normal".to_string(), "3g-4x".to_string()],
                slow_multiplier,
                ..Default::default()
            };
            assert!(matches!(config.timeout_for(slow), Err(E2eError::Config(_))));
            assert!(matches!(
                plan(&config, &QueryCatalog::builtin()),
                Err(E2eError::Config(_))
            ));
        }

        let huge = RunnerConfig {
            timeout: Duration::from_secs(u64::MAX / 2),
            ..Default::default()
        };
        assert!(huge.timeout_for(slow).is_err());
        assert_eq!(
            huge.timeout_for(throttle::lookup("normal").unwrap()).unwrap(),
            Duration::from_secs(u64::MAX / 2)
        );
    }

    #[test]
    fn suite_result_round_trips_through_json() {
        let result = SuiteResult {
            started_at: Utc::now(),
            total: 1,
            passed: 0,
            failed: 1,
            duration_ms: 12,
            results: vec![ScenarioReport {
                name: "scix.citations.normal".to_string(),
                application: "scix".to_string(),
                test_name: "citations".to_string(),
                throttle_profile: "normal".to_string(),
                success: false,
                duration_ms: 12,
                samples_recorded: 1,
                abandoned_samples: vec!["scix.citations.normal.TTRL".to_string()],
                error: Some("Timeout waiting for: wait:#results a>span".to_string()),
            }],
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("suite.json");
        result.write_results(&path).unwrap();

        let parsed: SuiteResult = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(!parsed.success());
        assert_eq!(parsed.failures().count(), 1);
        assert_eq!(parsed.results[0].abandoned_samples.len(), 1);
    }
}
