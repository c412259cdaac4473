//! Scenario and collection runner tests against a scripted in-process browser
//!
//! Run with: cargo test --package searchperf-e2e --test scenario

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use searchperf_common::{NetworkConditions, TimingRecord};
use searchperf_e2e::{
    run_scenario, AppTarget, Browser, BrowserLauncher, E2eError, E2eResult, MemorySink, PerfRunner,
    QueryCatalog, QuerySpec, RunnerConfig, Scenario, TimingRecorder, TimingSink, WaitUntil,
};
use test_case::test_case;

/// Shared log of every browser call, in order
type CallLog = Arc<Mutex<Vec<String>>>;

struct FakeBrowser {
    calls: CallLog,
    fail_on: Option<String>,
    step_delay: Duration,
}

impl FakeBrowser {
    fn new(calls: CallLog) -> Self {
        Self {
            calls,
            fail_on: None,
            step_delay: Duration::from_millis(2),
        }
    }

    async fn step(&self, call: String, selector: Option<&str>) -> E2eResult<()> {
        self.calls.lock().push(call.clone());
        tokio::time::sleep(self.step_delay).await;
        match (&self.fail_on, selector) {
            (Some(bad), Some(sel)) if bad == sel => Err(E2eError::Timeout(call)),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn apply_cpu_throttle(&mut self, rate: f64) -> E2eResult<()> {
        self.step(format!("cpu:{}", rate), None).await
    }

    async fn apply_network_conditions(&mut self, conditions: &NetworkConditions) -> E2eResult<()> {
        self.step(format!("network:{:?}", conditions.connection_type), None).await
    }

    async fn navigate(&mut self, url: &str, wait_until: WaitUntil) -> E2eResult<()> {
        self.step(format!("navigate:{}:{}", url, wait_until), None).await
    }

    async fn fill(&mut self, selector: &str, text: &str) -> E2eResult<()> {
        self.step(format!("fill:{}={}", selector, text), None).await
    }

    async fn click(&mut self, selector: &str) -> E2eResult<()> {
        self.step(format!("click:{}", selector), None).await
    }

    async fn wait_for_selector(&mut self, selector: &str, _timeout: Duration) -> E2eResult<()> {
        self.step(format!("wait:{}", selector), Some(selector)).await
    }

    async fn close(&mut self) -> E2eResult<()> {
        self.calls.lock().push("close".to_string());
        Ok(())
    }
}

#[derive(Default)]
struct FakeLauncher {
    calls: CallLog,
    launches: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, base_url: &str) -> E2eResult<Box<dyn Browser>> {
        self.launches.lock().push(base_url.to_string());
        let mut browser = FakeBrowser::new(self.calls.clone());
        browser.fail_on = self.fail_on.clone();
        Ok(Box::new(browser))
    }
}

fn scenario(profile: &str) -> Scenario {
    Scenario::new(
        AppTarget::scix(),
        QuerySpec::new("first-author", "first author search", r#"author:"^Solanki, Sami""#),
        profile,
        "property:refereed",
        Duration::from_secs(5),
    )
    .unwrap()
}

fn record(sink: &MemorySink, name: &str) -> TimingRecord {
    sink.find(name).unwrap_or_else(|| panic!("missing record {}", name))
}

#[tokio::test]
async fn successful_scenario_records_well_nested_samples() {
    let sink = Arc::new(MemorySink::new());
    let calls = CallLog::default();
    let mut browser = FakeBrowser::new(calls.clone());
    let mut recorder = TimingRecorder::new(sink.clone());

    run_scenario(&mut browser, &mut recorder, &scenario("normal")).await.unwrap();

    let ttrl = record(&sink, "scix.first-author.normal.TTRL");
    let ttsbi = record(&sink, "scix.first-author.normal.TTSBI");
    let ttrs = record(&sink, "scix.first-author.normal.TTRS");
    let ttrr = record(&sink, "scix.first-author.normal.TTRR");
    assert_eq!(sink.records().len(), 4);

    let start = |r: &TimingRecord| r.start_time.unwrap();
    let end = |r: &TimingRecord| r.end_time.unwrap();

    assert_eq!(start(&ttrl), start(&ttsbi));
    assert!(end(&ttsbi) <= start(&ttrs));
    assert!(start(&ttrs) <= end(&ttrs));
    assert!(end(&ttrs) <= end(&ttrl));
    assert!(end(&ttrl) <= start(&ttrr));
    assert!(ttrl.duration >= ttsbi.duration + ttrs.duration);
    assert!(recorder.open_samples().is_empty());
}

#[tokio::test]
async fn scenario_submits_query_then_refinement() {
    let sink = Arc::new(MemorySink::new());
    let calls = CallLog::default();
    let mut browser = FakeBrowser::new(calls.clone());
    let mut recorder = TimingRecorder::new(sink);

    run_scenario(&mut browser, &mut recorder, &scenario("normal")).await.unwrap();

    let calls = calls.lock().clone();
    assert_eq!(
        calls,
        vec![
            "navigate:/:load",
            r#"wait:[data-testid="search-input"]"#,
            r#"fill:[data-testid="search-input"]=author:"^Solanki, Sami""#,
            r#"click:[data-testid="search-submit"]"#,
            "wait:#results a>span",
            r#"fill:[data-testid="search-input"]=author:"^Solanki, Sami" property:refereed"#,
            r#"click:[data-testid="search-submit"]"#,
            "wait:#results a>span",
        ]
    );
}

#[test_case("normal", &[]; "baseline applies nothing")]
#[test_case("6x", &["cpu:6"]; "cpu only")]
#[test_case("eth-2x", &["cpu:2", "network:Ethernet"]; "cpu and network")]
#[test_case("3g-4x", &["cpu:4", "network:Cellular3g"]; "cellular")]
#[tokio::test]
async fn throttle_is_applied_before_navigation(profile: &str, expected: &[&str]) {
    let calls = CallLog::default();
    let mut browser = FakeBrowser::new(calls.clone());
    let mut recorder = TimingRecorder::new(Arc::new(MemorySink::new()));

    run_scenario(&mut browser, &mut recorder, &scenario(profile)).await.unwrap();

    let calls = calls.lock().clone();
    let navigate = calls.iter().position(|c| c.starts_with("navigate:")).unwrap();
    assert_eq!(&calls[..navigate], expected);
}

#[tokio::test]
async fn results_timeout_leaves_no_partial_records() {
    let sink = Arc::new(MemorySink::new());
    let calls = CallLog::default();
    let mut browser = FakeBrowser::new(calls);
    browser.fail_on = Some("#results a>span".to_string());
    let mut recorder = TimingRecorder::new(sink.clone());

    let err = run_scenario(&mut browser, &mut recorder, &scenario("normal"))
        .await
        .unwrap_err();
    assert!(matches!(err, E2eError::Timeout(_)));

    // Only TTSBI completed before the results wait timed out
    let names: Vec<String> = sink.records().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["scix.first-author.normal.TTSBI"]);

    let abandoned = recorder.abandon();
    assert_eq!(
        abandoned,
        vec!["scix.first-author.normal.TTRL", "scix.first-author.normal.TTRS"]
    );
    assert!(sink.find("scix.first-author.normal.TTRL").is_none());
}

#[test]
fn unknown_profile_is_rejected_when_building_a_scenario() {
    let err = Scenario::new(
        AppTarget::bbb(),
        QuerySpec::new("citations", "", "citations(abs:\"JWST\")"),
        "10x",
        "property:refereed",
        Duration::from_secs(1),
    )
    .unwrap_err();
    assert!(matches!(err, E2eError::Common(searchperf_common::Error::UnknownProfile(_))));
}

fn small_catalog() -> QueryCatalog {
    QueryCatalog {
        queries: vec![
            QuerySpec::new("first-author", "", r#"author:"^Solanki, Sami""#),
            QuerySpec::new("year-range", "", "year:2010-2020"),
        ],
    }
}

#[tokio::test]
async fn runner_fails_fast_on_unknown_profile() {
    let launcher = Arc::new(FakeLauncher::default());
    let config = RunnerConfig {
        profiles: vec!["normal".to_string(), "warp-9".to_string()],
        ..Default::default()
    };
    let runner = PerfRunner::new(config, launcher.clone(), Arc::new(MemorySink::new()));

    let err = runner.run_catalog(&small_catalog()).await.unwrap_err();
    assert!(err.to_string().contains("warp-9"));
    assert!(launcher.launches.lock().is_empty());
}

#[tokio::test]
async fn runner_covers_the_matrix_in_plan_order() {
    let launcher = Arc::new(FakeLauncher::default());
    let sink = Arc::new(MemorySink::new());
    let config = RunnerConfig {
        profiles: vec!["normal".to_string(), "eth-2x".to_string()],
        workers: 3,
        ..Default::default()
    };
    let runner = PerfRunner::new(config, launcher.clone(), sink.clone());

    let suite = runner.run_catalog(&small_catalog()).await.unwrap();

    assert_eq!(suite.total, 8);
    assert!(suite.success());
    assert_eq!(suite.results[0].name, "scix.first-author.normal");
    assert_eq!(suite.results[7].name, "bbb.year-range.eth-2x");
    assert!(suite.results.iter().all(|r| r.samples_recorded == 4));
    assert_eq!(sink.records().len(), 32);
    assert_eq!(launcher.launches.lock().len(), 8);
    assert_eq!(
        launcher.calls.lock().iter().filter(|c| *c == "close").count(),
        8
    );
}

#[tokio::test]
async fn failed_scenarios_are_reported_not_fatal() {
    let launcher = Arc::new(FakeLauncher {
        fail_on: Some("h3.s-results-title".to_string()),
        ..Default::default()
    });
    let sink = Arc::new(MemorySink::new());
    let runner = PerfRunner::new(RunnerConfig::default(), launcher, sink.clone());

    let suite = runner.run_catalog(&small_catalog()).await.unwrap();

    assert_eq!(suite.passed, 2);
    assert_eq!(suite.failed, 2);
    let failure = suite.failures().next().unwrap();
    assert_eq!(failure.application, "bbb");
    assert_eq!(failure.samples_recorded, 1);
    assert_eq!(failure.abandoned_samples.len(), 2);
    assert!(failure.error.as_deref().unwrap().contains("h3.s-results-title"));
    assert!(sink.records().iter().all(|r| !r.name.starts_with("bbb.") || r.name.ends_with(".TTSBI")));
}

#[tokio::test]
async fn scenarios_share_one_sink_without_cross_talk() {
    let memory = Arc::new(MemorySink::new());
    let sink: Arc<dyn TimingSink> = memory.clone();
    let mut a = TimingRecorder::new(sink.clone());
    let mut b = TimingRecorder::new(sink);

    // Same sample name open in two scenarios at once
    a.sample_start("scix.citations.normal.TTRL").unwrap();
    b.sample_start("scix.citations.normal.TTRL").unwrap();
    a.sample_end("scix.citations.normal.TTRL").unwrap();
    b.sample_end("scix.citations.normal.TTRL").unwrap();
    a.finish().unwrap();
    b.finish().unwrap();
    assert_eq!(memory.records().len(), 2);
}
