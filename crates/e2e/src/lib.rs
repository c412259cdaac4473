//! SearchPerf collection framework
//!
//! Times search interactions in real browser sessions and appends one JSON line per
//! completed sample to a shared timing log:
//! - Drives Playwright through a long-lived Node driver process per session
//! - Applies CPU and network throttling before the page is loaded
//! - Records nested TTRL/TTSBI/TTRS/TTRR samples through a `TimingRecorder`
//! - Runs the application x query x profile matrix with bounded parallelism
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  PerfRunner (collection phase)              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  plan(catalog) -> [Scenario]    profiles validated first    │
//! │  run(scenarios) -> SuiteResult  `workers` sessions at once  │
//! │    └── per scenario:                                        │
//! │          BrowserLauncher::launch(base_url) -> dyn Browser   │
//! │          run_scenario(browser, TimingRecorder, scenario)    │
//! │          TimingRecorder ──> TimingSink (JSON lines, shared) │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod browser;
pub mod catalog;
pub mod error;
pub mod playwright;
pub mod recorder;
pub mod runner;
pub mod scenario;

pub use browser::{Browser, BrowserLauncher, WaitUntil};
pub use catalog::{AppTarget, QueryCatalog, QuerySpec, Selectors};
pub use error::{E2eError, E2eResult};
pub use playwright::{BrowserKind, PlaywrightConfig, PlaywrightLauncher};
pub use recorder::{JsonLinesSink, MemorySink, TimingRecorder, TimingSink};
pub use runner::{PerfRunner, RunnerConfig, ScenarioReport, SuiteResult};
pub use scenario::{run_scenario, Scenario};
