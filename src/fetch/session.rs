//! Browser debug-session management and the driver abstraction.
//!
//! The headless strategy relies on a long-lived browser exposing the
//! DevTools protocol on a known port. This module owns the cheap
//! liveness probe, the external recovery command with its exit-code
//! contract, and the `BrowserDriver` trait the strategies drive tabs
//! through. The chromiumoxide implementation lives here too; the
//! strategies themselves never name a protocol.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use serde::Deserialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::utils::constants::SESSION_PROBE_TIMEOUT_MS;

/// Failure to bring up or attach to the debug session.
///
/// Display renders the operator-facing remediation, not a stack trace;
/// the chain prints it once at the strategy transition.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("browser debug port is already in use; close the conflicting process or point --debug-endpoint at a different port")]
    PortConflict,
    #[error("browser recovery command rejected its arguments; check the configured session command line")]
    ParamError,
    #[error("permission denied starting the browser; check that the current user may execute the browser binary")]
    Permission,
    #[error("browser did not come up within its startup timeout; the machine may be overloaded, try again")]
    StartupTimeout,
    #[error("browser recovery command failed with exit code {0}")]
    RecoveryFailed(i32),
    #[error("no recovery command configured and the debug session at {0} is not responding; start the browser with --remote-debugging-port and retry")]
    NotRunning(String),
    #[error("failed to attach to browser session: {0}")]
    Attach(String),
}

/// Handle to the externally managed browser debug session.
#[derive(Debug, Clone)]
pub struct DebugSession {
    endpoint: String,
    recovery_cmd: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

impl DebugSession {
    #[must_use]
    pub fn new(endpoint: impl Into<String>, recovery_cmd: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            recovery_cmd,
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fast liveness probe of the debug endpoint (bounded at 2 s).
    ///
    /// Returns the WebSocket debugger URL when the session is warm, so
    /// repeated invocations skip the recovery command entirely.
    pub async fn probe(&self) -> Option<String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(SESSION_PROBE_TIMEOUT_MS))
            .build()
            .ok()?;
        let url = format!("{}/json/version", self.endpoint.trim_end_matches('/'));
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let info: VersionInfo = resp.json().await.ok()?;
                trace!("debug session alive at {}", self.endpoint);
                Some(info.web_socket_debugger_url)
            }
            Ok(resp) => {
                debug!("debug endpoint probe returned HTTP {}", resp.status());
                None
            }
            Err(e) => {
                debug!("debug endpoint probe failed: {e}");
                None
            }
        }
    }

    /// Ensure the session is up, invoking the recovery command if needed.
    pub async fn ensure(&self) -> Result<String, SessionError> {
        if let Some(ws) = self.probe().await {
            return Ok(ws);
        }

        let Some(cmd) = &self.recovery_cmd else {
            return Err(SessionError::NotRunning(self.endpoint.clone()));
        };

        info!("debug session down, running recovery command");
        let status = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .status()
            .await
            .map_err(|e| SessionError::Attach(format!("could not spawn recovery command: {e}")))?;

        match status.code() {
            Some(0) => {}
            Some(1) => return Err(SessionError::PortConflict),
            Some(2) => return Err(SessionError::ParamError),
            Some(3) => return Err(SessionError::Permission),
            Some(4) => return Err(SessionError::StartupTimeout),
            Some(code) => return Err(SessionError::RecoveryFailed(code)),
            None => return Err(SessionError::Attach("recovery command killed by signal".into())),
        }

        self.probe()
            .await
            .ok_or_else(|| SessionError::NotRunning(self.endpoint.clone()))
    }
}

/// Opaque tab identifier handed out by a driver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TabHandle(pub String);

/// The primitives the fetch strategies need from a browser.
///
/// Implementations own an attached session; the strategies stay protocol
/// agnostic and testable with an in-memory fake.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Open a tab and start navigation to `url`.
    async fn new_tab(&self, url: &str) -> anyhow::Result<TabHandle>;

    /// Wait for the tab to reach `domcontentloaded`.
    async fn wait_for_load(&self, tab: &TabHandle, timeout: Duration) -> anyhow::Result<()>;

    /// Evaluate a JavaScript expression in the tab.
    async fn evaluate(&self, tab: &TabHandle, expr: &str) -> anyhow::Result<serde_json::Value>;

    /// Current serialized DOM of the tab.
    async fn get_html(&self, tab: &TabHandle) -> anyhow::Result<String>;

    /// Current URL of the tab (after any redirects).
    async fn get_url(&self, tab: &TabHandle) -> anyhow::Result<String>;

    /// Close the tab, leaving the session alive.
    async fn close_tab(&self, tab: TabHandle) -> anyhow::Result<()>;

    /// The tab the operator is currently looking at.
    async fn active_tab(&self) -> anyhow::Result<TabHandle>;
}

/// `BrowserDriver` over an attached chromiumoxide session.
pub struct CdpDriver {
    browser: chromiumoxide::Browser,
    pages: DashMap<String, chromiumoxide::Page>,
    handler_task: JoinHandle<()>,
}

impl CdpDriver {
    /// Attach to a running browser via its WebSocket debugger URL.
    pub async fn attach(ws_url: &str) -> Result<Self, SessionError> {
        let (browser, mut handler) = chromiumoxide::Browser::connect(ws_url)
            .await
            .map_err(|e| SessionError::Attach(e.to_string()))?;

        // Drive the CDP connection for the lifetime of the attachment
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    trace!("CDP handler event error: {e}");
                }
            }
        });

        Ok(Self {
            browser,
            pages: DashMap::new(),
            handler_task,
        })
    }

    fn page(&self, tab: &TabHandle) -> anyhow::Result<chromiumoxide::Page> {
        self.pages
            .get(&tab.0)
            .map(|p| p.value().clone())
            .ok_or_else(|| anyhow::anyhow!("unknown tab {}", tab.0))
    }
}

impl Drop for CdpDriver {
    fn drop(&mut self) {
        // Detach only; the session itself stays alive for the next fetch
        self.handler_task.abort();
    }
}

#[async_trait]
impl BrowserDriver for CdpDriver {
    async fn new_tab(&self, url: &str) -> anyhow::Result<TabHandle> {
        let page = self.browser.new_page(url).await?;
        let id = format!("{:?}", page.target_id());
        self.pages.insert(id.clone(), page);
        Ok(TabHandle(id))
    }

    async fn wait_for_load(&self, tab: &TabHandle, timeout: Duration) -> anyhow::Result<()> {
        let page = self.page(tab)?;
        tokio::time::timeout(timeout, page.wait_for_navigation())
            .await
            .map_err(|_| anyhow::anyhow!("navigation timeout after {timeout:?}"))??;
        Ok(())
    }

    async fn evaluate(&self, tab: &TabHandle, expr: &str) -> anyhow::Result<serde_json::Value> {
        let page = self.page(tab)?;
        let result = page.evaluate(expr).await?;
        Ok(result
            .into_value::<serde_json::Value>()
            .unwrap_or(serde_json::Value::Null))
    }

    async fn get_html(&self, tab: &TabHandle) -> anyhow::Result<String> {
        let page = self.page(tab)?;
        Ok(page.content().await?)
    }

    async fn get_url(&self, tab: &TabHandle) -> anyhow::Result<String> {
        let page = self.page(tab)?;
        page.url()
            .await?
            .ok_or_else(|| anyhow::anyhow!("tab has no URL"))
    }

    async fn close_tab(&self, tab: TabHandle) -> anyhow::Result<()> {
        if let Some((_, page)) = self.pages.remove(&tab.0) {
            if let Err(e) = page.close().await {
                // Not fatal; the session reaper will collect the tab
                warn!("failed to close tab {}: {e}", tab.0);
            }
        }
        Ok(())
    }

    async fn active_tab(&self) -> anyhow::Result<TabHandle> {
        let pages = self.browser.pages().await?;
        // The most recently focused real page; skip blank scratch tabs
        for page in pages.into_iter().rev() {
            let url = page.url().await?.unwrap_or_default();
            if !url.is_empty() && url != "about:blank" {
                let id = format!("{:?}", page.target_id());
                self.pages.insert(id.clone(), page);
                return Ok(TabHandle(id));
            }
        }
        Err(anyhow::anyhow!("no active tab with content"))
    }
}
