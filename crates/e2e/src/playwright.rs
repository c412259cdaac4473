//! Playwright browser automation
//!
//! Each session is a long-lived `node` process running a small driver script. Rust
//! sends one JSON command per line on stdin and the driver answers with one JSON
//! reply per line on stdout, so a whole scenario runs against the same page.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use searchperf_common::NetworkConditions;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::browser::{Browser, BrowserLauncher, WaitUntil};
use crate::error::{E2eError, E2eResult};

/// Extra time allowed on top of a command's own timeout for the driver to answer
const REPLY_GRACE: Duration = Duration::from_secs(5);

const DRIVER_SCRIPT: &str = r#"
const { chromium, firefox, webkit } = require('playwright');
const readline = require('readline');

const config = JSON.parse(process.argv[2]);
const reply = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');

(async () => {
  const browserType = { chromium, firefox, webkit }[config.browser];
  const browser = await browserType.launch({ headless: config.headless });
  const context = await browser.newContext({
    baseURL: config.baseUrl,
    viewport: { width: config.viewportWidth, height: config.viewportHeight },
    storageState: config.storageState || undefined,
  });
  const page = await context.newPage();
  let cdp = null;
  const devtools = async () => (cdp = cdp || (await context.newCDPSession(page)));

  reply({ id: 0, ok: true });

  const rl = readline.createInterface({ input: process.stdin, crlfDelay: Infinity });
  for await (const line of rl) {
    if (!line.trim()) continue;
    const req = JSON.parse(line);
    try {
      switch (req.op) {
        case 'goto':
          await page.goto(req.url, { waitUntil: req.waitUntil });
          break;
        case 'fill':
          await page.locator(req.selector).fill(req.text);
          break;
        case 'click':
          await page.locator(req.selector).click();
          break;
        case 'waitForSelector':
          await page.waitForSelector(req.selector, { state: 'visible', timeout: req.timeoutMs });
          break;
        case 'cpuThrottle':
          await (await devtools()).send('Emulation.setCPUThrottlingRate', { rate: req.rate });
          break;
        case 'networkConditions':
          await (await devtools()).send('Network.emulateNetworkConditions', req.conditions);
          break;
        case 'close':
          await browser.close();
          reply({ id: req.id, ok: true });
          process.exit(0);
        default:
          throw new Error('unknown op ' + req.op);
      }
      reply({ id: req.id, ok: true });
    } catch (error) {
      reply({ id: req.id, ok: false, error: error.message, timeout: error.name === 'TimeoutError' });
    }
  }
  await browser.close();
})().catch((error) => {
  process.stderr.write(String(error && error.stack ? error.stack : error) + '\n');
  process.exit(1);
});
"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chromium => "chromium",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for BrowserKind {
    type Err = E2eError;

    fn from_str(s: &str) -> E2eResult<Self> {
        match s {
            "chromium" => Ok(BrowserKind::Chromium),
            "firefox" => Ok(BrowserKind::Firefox),
            "webkit" => Ok(BrowserKind::Webkit),
            other => Err(E2eError::Playwright(format!("unsupported browser: {}", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaywrightConfig {
    /// Node.js executable
    pub node_binary: PathBuf,

    /// `node_modules` directory that provides `playwright`
    pub node_path: Option<PathBuf>,

    pub browser: BrowserKind,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Playwright storage state for pre-authenticated sessions
    pub storage_state: Option<PathBuf>,

    #[serde(with = "millis")]
    pub startup_timeout: Duration,

    /// Upper bound for commands that carry no timeout of their own
    #[serde(with = "millis")]
    pub command_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            node_binary: PathBuf::from("node"),
            node_path: None,
            browser: BrowserKind::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            storage_state: None,
            startup_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(60),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DriverConfig<'a> {
    browser: &'static str,
    headless: bool,
    base_url: &'a str,
    viewport_width: u32,
    viewport_height: u32,
    storage_state: Option<String>,
}

/// One command understood by the driver script
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
enum DriverCommand<'a> {
    Goto {
        url: &'a str,
        #[serde(rename = "waitUntil")]
        wait_until: WaitUntil,
    },
    Fill {
        selector: &'a str,
        text: &'a str,
    },
    Click {
        selector: &'a str,
    },
    WaitForSelector {
        selector: &'a str,
        #[serde(rename = "timeoutMs")]
        timeout_ms: u64,
    },
    CpuThrottle {
        rate: f64,
    },
    NetworkConditions {
        conditions: &'a NetworkConditions,
    },
    Close,
}

impl DriverCommand<'_> {
    fn describe(&self) -> String {
        match self {
            DriverCommand::Goto { url, .. } => format!("navigate:{}", url),
            DriverCommand::Fill { selector, .. } => format!("fill:{}", selector),
            DriverCommand::Click { selector } => format!("click:{}", selector),
            DriverCommand::WaitForSelector { selector, .. } => format!("wait:{}", selector),
            DriverCommand::CpuThrottle { rate } => format!("cpu-throttle:{}x", rate),
            DriverCommand::NetworkConditions { conditions } => {
                format!("network:{:?}", conditions.connection_type)
            }
            DriverCommand::Close => "close".to_string(),
        }
    }
}

#[derive(Serialize)]
struct DriverRequest<'a> {
    id: u64,
    #[serde(flatten)]
    command: &'a DriverCommand<'a>,
}

#[derive(Debug, Deserialize)]
struct DriverReply {
    id: u64,
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    timeout: bool,
}

/// Launches one Playwright-controlled page per scenario
#[derive(Debug, Clone)]
pub struct PlaywrightLauncher {
    config: PlaywrightConfig,
}

impl PlaywrightLauncher {
    /// Create a launcher, failing early if Node or Playwright are missing
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed(&config)?;
        Ok(Self { config })
    }

    fn check_playwright_installed(config: &PlaywrightConfig) -> E2eResult<()> {
        let mut cmd = Command::new(&config.node_binary);
        cmd.args(["-e", "require('playwright')"])
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(node_path) = &config.node_path {
            cmd.env("NODE_PATH", node_path);
        }

        match cmd.status() {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    pub fn config(&self) -> &PlaywrightConfig {
        &self.config
    }
}

#[async_trait]
impl BrowserLauncher for PlaywrightLauncher {
    async fn launch(&self, base_url: &str) -> E2eResult<Box<dyn Browser>> {
        let session = PlaywrightSession::spawn(&self.config, base_url).await?;
        Ok(Box::new(session))
    }
}

/// A running driver process bound to one page
pub struct PlaywrightSession {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    command_timeout: Duration,
    closed: bool,
    // Holds the driver script on disk for the life of the process
    _script_dir: TempDir,
}

impl PlaywrightSession {
    pub async fn spawn(config: &PlaywrightConfig, base_url: &str) -> E2eResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("driver.js");
        tokio::fs::write(&script_path, DRIVER_SCRIPT).await?;

        let driver_config = serde_json::to_string(&DriverConfig {
            browser: config.browser.as_str(),
            headless: config.headless,
            base_url,
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
            storage_state: config
                .storage_state
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
        })?;

        let mut cmd = TokioCommand::new(&config.node_binary);
        cmd.arg(&script_path)
            .arg(driver_config)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(node_path) = &config.node_path {
            cmd.env("NODE_PATH", node_path);
        }

        debug!("Spawning Playwright driver for {}", base_url);
        let mut child = cmd
            .spawn()
            .map_err(|e| E2eError::Playwright(format!("failed to spawn {}: {}", config.node_binary.display(), e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Playwright("driver stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("driver stdout unavailable".to_string()))?;

        let mut session = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
            command_timeout: config.command_timeout,
            closed: false,
            _script_dir: script_dir,
        };

        session.await_reply(0, config.startup_timeout, "startup").await?;
        info!("Browser session ready ({}, {})", config.browser.as_str(), base_url);
        Ok(session)
    }

    async fn send(&mut self, command: DriverCommand<'_>, wait: Duration) -> E2eResult<()> {
        let id = self.next_id;
        self.next_id += 1;
        let step = command.describe();
        debug!("Executing step: {}", step);

        let mut line = serde_json::to_string(&DriverRequest { id, command: &command })?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        self.await_reply(id, wait + REPLY_GRACE, &step).await
    }

    async fn await_reply(&mut self, id: u64, wait: Duration, step: &str) -> E2eResult<()> {
        loop {
            let line = match timeout(wait, self.stdout.next_line()).await {
                Ok(Ok(Some(line))) => line,
                Ok(Ok(None)) => {
                    let status = self.child.try_wait().ok().flatten();
                    return Err(E2eError::DriverExited(format!(
                        "during {} (status: {:?})",
                        step, status
                    )));
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => return Err(E2eError::Timeout(step.to_string())),
            };

            let reply: DriverReply = match serde_json::from_str(&line) {
                Ok(reply) => reply,
                Err(_) => {
                    // Page console output or library warnings
                    debug!("driver: {}", line);
                    continue;
                }
            };

            if reply.id != id {
                warn!("Ignoring stale driver reply {} while waiting for {}", reply.id, id);
                continue;
            }

            if reply.ok {
                return Ok(());
            }
            let reason = reply.error.unwrap_or_else(|| "unknown error".to_string());
            if reply.timeout {
                return Err(E2eError::Timeout(format!("{} ({})", step, reason)));
            }
            return Err(E2eError::StepFailed {
                step: step.to_string(),
                reason,
            });
        }
    }
}

#[async_trait]
impl Browser for PlaywrightSession {
    async fn apply_cpu_throttle(&mut self, rate: f64) -> E2eResult<()> {
        let wait = self.command_timeout;
        self.send(DriverCommand::CpuThrottle { rate }, wait).await
    }

    async fn apply_network_conditions(&mut self, conditions: &NetworkConditions) -> E2eResult<()> {
        let wait = self.command_timeout;
        self.send(DriverCommand::NetworkConditions { conditions }, wait).await
    }

    async fn navigate(&mut self, url: &str, wait_until: WaitUntil) -> E2eResult<()> {
        let wait = self.command_timeout;
        self.send(DriverCommand::Goto { url, wait_until }, wait).await
    }

    async fn fill(&mut self, selector: &str, text: &str) -> E2eResult<()> {
        let wait = self.command_timeout;
        self.send(DriverCommand::Fill { selector, text }, wait).await
    }

    async fn click(&mut self, selector: &str) -> E2eResult<()> {
        let wait = self.command_timeout;
        self.send(DriverCommand::Click { selector }, wait).await
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> E2eResult<()> {
        let command = DriverCommand::WaitForSelector {
            selector,
            timeout_ms: timeout.as_millis() as u64,
        };
        self.send(command, timeout).await
    }

    async fn close(&mut self) -> E2eResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let wait = self.command_timeout;
        let result = self.send(DriverCommand::Close, wait).await;
        let _ = self.child.wait().await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use searchperf_common::throttle;

    #[test]
    fn commands_serialize_for_the_driver() {
        let cmd = DriverCommand::WaitForSelector {
            selector: "h3.s-results-title",
            timeout_ms: 30_000,
        };
        let json = serde_json::to_value(DriverRequest { id: 7, command: &cmd }).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["op"], "waitForSelector");
        assert_eq!(json["timeoutMs"], 30_000);

        let cmd = DriverCommand::Goto {
            url: "/",
            wait_until: WaitUntil::Load,
        };
        let json = serde_json::to_value(DriverRequest { id: 1, command: &cmd }).unwrap();
        assert_eq!(json["op"], "goto");
        assert_eq!(json["waitUntil"], "load");

        let conditions = throttle::lookup("eth-2x").unwrap().network_conditions.unwrap();
        let cmd = DriverCommand::NetworkConditions { conditions: &conditions };
        let json = serde_json::to_value(DriverRequest { id: 2, command: &cmd }).unwrap();
        assert_eq!(json["op"], "networkConditions");
        assert_eq!(json["conditions"]["connectionType"], "ethernet");
    }

    #[test]
    fn driver_handles_every_command() {
        for op in ["'goto'", "'fill'", "'click'", "'waitForSelector'", "'cpuThrottle'", "'networkConditions'", "'close'"] {
            assert!(DRIVER_SCRIPT.contains(op), "driver script lacks {}", op);
        }
    }

    #[test]
    fn replies_parse_with_optional_fields() {
        let reply: DriverReply = serde_json::from_str(r#"{"id":3,"ok":true}"#).unwrap();
        assert!(reply.ok);
        assert!(reply.error.is_none());

        let reply: DriverReply =
            serde_json::from_str(r#"{"id":4,"ok":false,"error":"Timeout 30000ms exceeded","timeout":true}"#).unwrap();
        assert!(reply.timeout);
    }

    #[test]
    fn browser_kind_parsing() {
        assert_eq!("webkit".parse::<BrowserKind>().unwrap(), BrowserKind::Webkit);
        assert!("lynx".parse::<BrowserKind>().is_err());
    }

    #[test]
    fn config_defaults_from_partial_toml_shape() {
        let config: PlaywrightConfig =
            serde_json::from_str(r#"{"headless":false,"startup_timeout":1000}"#).unwrap();
        assert!(!config.headless);
        assert_eq!(config.startup_timeout, Duration::from_secs(1));
        assert_eq!(config.viewport_width, 1280);
    }
}
