//! Headless browser fetch strategy.
//!
//! Attaches to the long-lived debug session, renders the page in a fresh
//! tab, and captures the post-JavaScript DOM. The session itself is
//! externally managed; this strategy only probes, attaches, and leaves it
//! alive. Tab creation and close are serialized so concurrent crawl
//! workers cannot race the browser's target list.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{classify_message, Classification, ErrorKind};
use crate::fetch::retry::{run_with_retry, Attempt, AttemptError};
use crate::fetch::session::{BrowserDriver, CdpDriver, DebugSession, TabHandle};
use crate::fetch::{FetchContext, StrategyResult};
use crate::utils::constants::{PAGE_SETTLE_MS, SCROLL_SETTLE_MS};

pub struct HeadlessStrategy {
    session: DebugSession,
    scroll_to_bottom: bool,
    /// Serializes tab create/close across concurrent workers
    tab_gate: Arc<tokio::sync::Mutex<()>>,
}

impl HeadlessStrategy {
    #[must_use]
    pub fn new(session: DebugSession, scroll_to_bottom: bool) -> Self {
        Self {
            session,
            scroll_to_bottom,
            tab_gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Fetch via the debug session, retrying render attempts within the
    /// context budget. Session setup failures are terminal for this
    /// strategy and reported with their remediation text.
    pub async fn fetch(&self, ctx: &FetchContext) -> StrategyResult {
        let start = Instant::now();

        let ws_url = match self.session.ensure().await {
            Ok(ws) => ws,
            Err(e) => {
                return StrategyResult::failed(
                    Classification {
                        kind: ErrorKind::BrowserUnavailable,
                        should_retry: false,
                        recommended_wait: None,
                        suggested_fallback: None,
                    },
                    e.to_string(),
                    1,
                    start.elapsed(),
                );
            }
        };

        let driver = match CdpDriver::attach(&ws_url).await {
            Ok(driver) => driver,
            Err(e) => {
                return StrategyResult::failed(
                    Classification {
                        kind: ErrorKind::BrowserUnavailable,
                        should_retry: false,
                        recommended_wait: None,
                        suggested_fallback: None,
                    },
                    e.to_string(),
                    1,
                    start.elapsed(),
                );
            }
        };

        info!("attached to browser session at {}", self.session.endpoint());
        self.fetch_with_driver(&driver, ctx).await
    }

    /// Render through an already-attached driver. Split out so tests can
    /// substitute an in-memory driver.
    pub async fn fetch_with_driver<D: BrowserDriver + ?Sized>(
        &self,
        driver: &D,
        ctx: &FetchContext,
    ) -> StrategyResult {
        let mut result = run_with_retry(ctx, |_| self.attempt(driver, ctx)).await;
        result.chrome_attached = true;
        result
    }

    async fn attempt<D: BrowserDriver + ?Sized>(
        &self,
        driver: &D,
        ctx: &FetchContext,
    ) -> Result<Attempt, AttemptError> {
        let render_start = Instant::now();

        let tab = {
            let _gate = self.tab_gate.lock().await;
            driver.new_tab(&ctx.url).await.map_err(|e| {
                AttemptError::new(classify_message(&e.to_string()), e.to_string())
            })?
        };

        let captured = self.render_and_capture(driver, &tab, ctx).await;

        // Close on every exit path; a leaked tab is logged, not fatal
        {
            let _gate = self.tab_gate.lock().await;
            if let Err(e) = driver.close_tab(tab).await {
                warn!("tab close failed for {}: {e}", ctx.url);
            }
        }

        let (html, final_url) = captured?;
        Ok(Attempt {
            html,
            final_url,
            truncated: false,
            encoding: None,
            ssl_fallback_used: false,
            chrome_attached: true,
            render_secs: render_start.elapsed().as_secs_f64(),
        })
    }

    async fn render_and_capture<D: BrowserDriver + ?Sized>(
        &self,
        driver: &D,
        tab: &TabHandle,
        ctx: &FetchContext,
    ) -> Result<(String, String), AttemptError> {
        driver
            .wait_for_load(tab, ctx.timeout)
            .await
            .map_err(|e| AttemptError::new(classify_message(&e.to_string()), e.to_string()))?;

        // Let late scripts settle before reading the DOM
        tokio::time::sleep(Duration::from_millis(PAGE_SETTLE_MS)).await;

        if self.scroll_to_bottom {
            debug!("scrolling to bottom for lazy-loaded content: {}", ctx.url);
            if let Err(e) = driver
                .evaluate(tab, "window.scrollTo(0, document.body.scrollHeight)")
                .await
            {
                debug!("scroll failed (continuing without): {e}");
            }
            tokio::time::sleep(Duration::from_millis(SCROLL_SETTLE_MS)).await;
        }

        let html = driver
            .get_html(tab)
            .await
            .map_err(|e| AttemptError::new(classify_message(&e.to_string()), e.to_string()))?;
        let final_url = driver
            .get_url(tab)
            .await
            .unwrap_or_else(|_| ctx.url.clone());

        Ok((html, final_url))
    }
}
