//! One timed search scenario
//!
//! Sample layout for a single run against one page:
//!
//! ```text
//! navigate       search bar      submit          results               results
//!    |<──────────────────── TTRL ───────────────────>|                    |
//!    |<──── TTSBI ────>|           |<──── TTRS ─────>|<────── TTRR ──────>|
//! ```

use std::time::Duration;

use searchperf_common::{throttle, Phase, SamplePrefix, ThrottleProfile};
use tracing::{debug, info};

use crate::browser::{Browser, WaitUntil};
use crate::catalog::{AppTarget, QuerySpec};
use crate::error::E2eResult;
use crate::recorder::TimingRecorder;

/// One (application, query, throttle profile) execution
#[derive(Debug, Clone)]
pub struct Scenario {
    pub target: AppTarget,
    pub query: QuerySpec,
    pub profile: &'static ThrottleProfile,

    /// Full query text submitted in the refinement phase
    pub refined_query: String,

    /// How long to wait for each selector
    pub timeout: Duration,

    prefix: SamplePrefix,
}

impl Scenario {
    /// Build a scenario, rejecting unknown profile tags and names unusable in sample names
    pub fn new(
        target: AppTarget,
        query: QuerySpec,
        profile_tag: &str,
        default_refinement: &str,
        timeout: Duration,
    ) -> E2eResult<Self> {
        let profile = throttle::lookup(profile_tag)?;
        let prefix = SamplePrefix::new(&target.name, &query.name, profile.tag)?;
        let refined_query = query.refined_query(default_refinement);
        Ok(Self {
            target,
            query,
            profile,
            refined_query,
            timeout,
            prefix,
        })
    }

    pub fn prefix(&self) -> &SamplePrefix {
        &self.prefix
    }

    pub fn name(&self) -> String {
        self.prefix().to_string()
    }
}

/// Apply a profile's CPU and network emulation; the baseline profile changes nothing
pub async fn apply_throttle(browser: &mut dyn Browser, profile: &ThrottleProfile) -> E2eResult<()> {
    if profile.is_baseline() {
        return Ok(());
    }
    debug!("Applying throttle profile {}", profile.tag);
    if profile.cpu_rate > 1.0 {
        browser.apply_cpu_throttle(profile.cpu_rate).await?;
    }
    if let Some(conditions) = &profile.network_conditions {
        browser.apply_network_conditions(conditions).await?;
    }
    Ok(())
}

/// Drive one scenario, recording TTRL, TTSBI, TTRS and TTRR
///
/// On error the recorder may still hold open samples; the caller decides whether to
/// abandon them. Completed samples have already been persisted.
pub async fn run_scenario(
    browser: &mut dyn Browser,
    recorder: &mut TimingRecorder,
    scenario: &Scenario,
) -> E2eResult<()> {
    let prefix = scenario.prefix();
    let ttrl = prefix.sample(Phase::Ttrl).encode();
    let ttsbi = prefix.sample(Phase::Ttsbi).encode();
    let ttrs = prefix.sample(Phase::Ttrs).encode();
    let ttrr = prefix.sample(Phase::Ttrr).encode();
    let selectors = &scenario.target.selectors;

    apply_throttle(browser, scenario.profile).await?;

    recorder.sample_start_all(&[ttrl.as_str(), ttsbi.as_str()])?;
    browser.navigate("/", WaitUntil::Load).await?;
    browser
        .wait_for_selector(&selectors.search_bar, scenario.timeout)
        .await?;
    recorder.sample_end(&ttsbi)?;

    browser.fill(&selectors.search_bar, &scenario.query.query).await?;
    recorder.sample_start(&ttrs)?;
    browser.click(&selectors.search_button).await?;
    browser
        .wait_for_selector(&selectors.search_results, scenario.timeout)
        .await?;
    recorder.sample_end_all(&[ttrs.as_str(), ttrl.as_str()])?;

    recorder.sample_start(&ttrr)?;
    browser.fill(&selectors.search_bar, &scenario.refined_query).await?;
    browser.click(&selectors.search_button).await?;
    browser
        .wait_for_selector(&selectors.search_results, scenario.timeout)
        .await?;
    recorder.sample_end(&ttrr)?;

    recorder.finish()?;
    info!("Scenario {} complete", prefix);
    Ok(())
}
