//! Browser capability used by timed scenarios

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use searchperf_common::NetworkConditions;

use crate::error::E2eResult;

/// Navigation completion condition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    #[default]
    Load,
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    Commit,
}

impl fmt::Display for WaitUntil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitUntil::Load => write!(f, "load"),
            WaitUntil::DomContentLoaded => write!(f, "domcontentloaded"),
            WaitUntil::Commit => write!(f, "commit"),
        }
    }
}

/// One browser session (one page) that a scenario drives
///
/// Navigation URLs are relative to the base URL the session was launched with.
#[async_trait]
pub trait Browser: Send {
    async fn apply_cpu_throttle(&mut self, rate: f64) -> E2eResult<()>;

    async fn apply_network_conditions(&mut self, conditions: &NetworkConditions) -> E2eResult<()>;

    async fn navigate(&mut self, url: &str, wait_until: WaitUntil) -> E2eResult<()>;

    async fn fill(&mut self, selector: &str, text: &str) -> E2eResult<()>;

    async fn click(&mut self, selector: &str) -> E2eResult<()>;

    /// Wait until `selector` is visible
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> E2eResult<()>;

    async fn close(&mut self) -> E2eResult<()>;
}

/// Opens a fresh, isolated browser session per scenario
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, base_url: &str) -> E2eResult<Box<dyn Browser>>;
}
