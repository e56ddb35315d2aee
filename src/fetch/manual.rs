//! Operator-assisted fetch strategy of last resort.
//!
//! When the automated strategies have all failed (anti-bot walls, login
//! interstitials), the operator drives a visible browser to the page and
//! confirms; the DOM of the active tab is then captured over the debug
//! protocol. Gated by configuration and skipped silently when disabled.

use std::time::Instant;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::error::{Classification, ErrorKind};
use crate::fetch::session::{BrowserDriver, CdpDriver, DebugSession};
use crate::fetch::{FetchContext, StrategyResult};

pub struct ManualStrategy {
    session: DebugSession,
    enabled: bool,
}

impl ManualStrategy {
    #[must_use]
    pub fn new(session: DebugSession, enabled: bool) -> Self {
        Self { session, enabled }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Prompt the operator, wait for confirmation, then capture the
    /// active tab. An interrupt (Ctrl-C or closed stdin) cancels.
    pub async fn fetch(&self, ctx: &FetchContext, prior_failures: &[String]) -> StrategyResult {
        let start = Instant::now();

        eprintln!();
        eprintln!("=== Manual fetch required ===");
        eprintln!("URL: {}", ctx.url);
        if !prior_failures.is_empty() {
            eprintln!("Automated strategies failed:");
            for failure in prior_failures {
                eprintln!("  - {failure}");
            }
        }
        eprintln!("Open the page in the debug browser, wait for it to load,");
        eprintln!("then press Enter here to capture it (Ctrl-C to cancel).");

        if !self.wait_for_operator().await {
            return StrategyResult::failed(
                Classification {
                    kind: ErrorKind::Cancelled,
                    should_retry: false,
                    recommended_wait: None,
                    suggested_fallback: None,
                },
                "operator cancelled the manual fetch",
                1,
                start.elapsed(),
            );
        }

        let ws_url = match self.session.ensure().await {
            Ok(ws) => ws,
            Err(e) => return browser_unavailable(e.to_string(), start),
        };
        let driver = match CdpDriver::attach(&ws_url).await {
            Ok(d) => d,
            Err(e) => return browser_unavailable(e.to_string(), start),
        };

        self.capture_active_tab(&driver, ctx, start).await
    }

    /// Capture through an already-attached driver; split out for tests.
    pub async fn capture_active_tab<D: BrowserDriver + ?Sized>(
        &self,
        driver: &D,
        ctx: &FetchContext,
        start: Instant,
    ) -> StrategyResult {
        let capture = async {
            let tab = driver.active_tab().await?;
            let html = driver.get_html(&tab).await?;
            let url = driver.get_url(&tab).await.unwrap_or_else(|_| ctx.url.clone());
            anyhow::Ok((html, url))
        };

        match capture.await {
            Ok((html, final_url)) => {
                info!("captured operator tab for {}", ctx.url);
                let mut result = StrategyResult::succeeded(html, final_url, 1, start.elapsed());
                result.chrome_attached = true;
                result
            }
            Err(e) => browser_unavailable(format!("could not read active tab: {e}"), start),
        }
    }

    /// True when the operator confirmed, false on interrupt or EOF.
    async fn wait_for_operator(&self) -> bool {
        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        tokio::select! {
            read = stdin.read_line(&mut line) => matches!(read, Ok(n) if n > 0),
            _ = tokio::signal::ctrl_c() => false,
        }
    }
}

fn browser_unavailable(message: String, start: Instant) -> StrategyResult {
    StrategyResult::failed(
        Classification {
            kind: ErrorKind::BrowserUnavailable,
            should_retry: false,
            recommended_wait: None,
            suggested_fallback: None,
        },
        message,
        1,
        start.elapsed(),
    )
}
