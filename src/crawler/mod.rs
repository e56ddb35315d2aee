//! Bounded breadth-first site crawler.
//!
//! State is a FIFO frontier of `(original_url, depth)`, a visited set of
//! normalized URLs, and the normalized→original map. Dedup is therefore
//! case-insensitive on scheme/host while the fetcher always sees the
//! original casing. A configurable pool of workers drains the frontier;
//! visited-set insertion is an atomic check-and-insert, and the
//! politeness delay is a single gate all workers respect.

pub mod links;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use dashmap::{DashMap, DashSet};
use futures::future::join_all;
use log::{info, warn};
use tokio::sync::Mutex;

use crate::config::CrawlConfig;
use crate::fetch::{FallbackChain, StrategyExecutor};
use crate::metrics::{FetchMetrics, UrlMetadata};
use crate::routing::RoutingPolicy;
use crate::urlnorm::{canonicalize, normalize_for_dedup};
use crate::utils::constants::MAX_LINKS_PER_PAGE;

pub use links::{extract_internal_links, is_documentation_url, should_crawl_url};

/// One successfully fetched page.
#[derive(Debug)]
pub struct CrawledPage {
    pub url: String,
    pub final_url: String,
    pub html: String,
    pub depth: usize,
    pub metrics: FetchMetrics,
    pub metadata: UrlMetadata,
    pub encoding: Option<String>,
}

/// Per-run crawl statistics.
#[derive(Debug, Default)]
pub struct CrawlStats {
    pub pages_attempted: usize,
    pub pages_succeeded: usize,
    pub pages_failed: usize,
    pub total_bytes: u64,
    pub elapsed_secs: f64,
    pub failed_urls: Vec<(String, String)>,
    /// Limits that stopped the run ("max_pages(10)", "max_depth(2)")
    pub stopped_by: Vec<String>,
}

impl CrawlStats {
    /// "COMPLETE" or "INCOMPLETE — stopped due to ..." summary line.
    #[must_use]
    pub fn status_line(&self) -> String {
        if self.stopped_by.is_empty() {
            "COMPLETE - all discoverable pages crawled".to_string()
        } else {
            format!("INCOMPLETE - stopped due to {}", self.stopped_by.join(" and "))
        }
    }
}

/// Result of a crawl run.
#[derive(Debug)]
pub struct CrawlReport {
    pub pages: Vec<CrawledPage>,
    pub stats: CrawlStats,
}

struct CrawlState {
    frontier: Mutex<VecDeque<(String, usize)>>,
    visited: DashSet<String>,
    originals: DashMap<String, String>,
    pages: Mutex<Vec<CrawledPage>>,
    active: AtomicUsize,
    attempted: AtomicUsize,
    failed: Mutex<Vec<(String, String)>>,
    bytes: AtomicUsize,
    hit_page_limit: AtomicBool,
    politeness: Mutex<Option<Instant>>,
}

/// Crawl from the configured start URL.
///
/// The executor is shared by all workers; tab serialization inside the
/// headless strategy is what makes that safe for the browser session.
pub async fn crawl_site<E: StrategyExecutor>(
    config: &CrawlConfig,
    policy: &RoutingPolicy,
    executor: &E,
) -> anyhow::Result<CrawlReport> {
    let start_url = canonicalize(config.start_url())
        .map_err(|e| anyhow::anyhow!("invalid start URL: {e}"))?;
    let started = Instant::now();

    info!(
        "starting crawl of {start_url}: max_depth={}, max_pages={}, delay={:?}, workers={}",
        config.max_depth(),
        config.max_pages(),
        config.crawl_delay(),
        config.workers()
    );

    let state = CrawlState {
        frontier: Mutex::new(VecDeque::from([(start_url, 0usize)])),
        visited: DashSet::new(),
        originals: DashMap::new(),
        pages: Mutex::new(Vec::new()),
        active: AtomicUsize::new(0),
        attempted: AtomicUsize::new(0),
        failed: Mutex::new(Vec::new()),
        bytes: AtomicUsize::new(0),
        hit_page_limit: AtomicBool::new(false),
        politeness: Mutex::new(None),
    };

    let workers: Vec<_> = (0..config.workers())
        .map(|_| worker_loop(config, policy, executor, &state))
        .collect();
    join_all(workers).await;

    let pages = state.pages.into_inner();
    let failed_urls = state.failed.into_inner();

    let mut stopped_by = Vec::new();
    if state.hit_page_limit.load(Ordering::Relaxed) {
        stopped_by.push(format!("max_pages({})", config.max_pages()));
    }
    if pages.iter().any(|p| p.depth >= config.max_depth()) {
        stopped_by.push(format!("max_depth({})", config.max_depth()));
    }

    let stats = CrawlStats {
        pages_attempted: state.attempted.load(Ordering::Relaxed),
        pages_succeeded: pages.len(),
        pages_failed: failed_urls.len(),
        total_bytes: state.bytes.load(Ordering::Relaxed) as u64,
        elapsed_secs: started.elapsed().as_secs_f64(),
        failed_urls,
        stopped_by,
    };

    info!(
        "crawl finished: {}/{} pages in {:.1}s, {:.1} KiB — {}",
        stats.pages_succeeded,
        stats.pages_attempted,
        stats.elapsed_secs,
        stats.total_bytes as f64 / 1024.0,
        stats.status_line()
    );
    if !stats.failed_urls.is_empty() {
        info!("failed URLs ({}):", stats.failed_urls.len());
        for (url, error) in stats.failed_urls.iter().take(5) {
            info!("  - {url}: {error}");
        }
    }

    Ok(CrawlReport { pages, stats })
}

async fn worker_loop<E: StrategyExecutor>(
    config: &CrawlConfig,
    policy: &RoutingPolicy,
    executor: &E,
    state: &CrawlState,
) {
    loop {
        if state.hit_page_limit.load(Ordering::Relaxed) {
            break;
        }

        // Claim the next item and mark this worker active in one lock
        // scope, so idle workers can tell "empty for now" from "done"
        let item = {
            let mut frontier = state.frontier.lock().await;
            match frontier.pop_front() {
                Some(item) => {
                    state.active.fetch_add(1, Ordering::SeqCst);
                    Some(item)
                }
                None => None,
            }
        };

        let Some((url, depth)) = item else {
            if state.active.load(Ordering::SeqCst) == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
            continue;
        };

        process_item(config, policy, executor, state, url, depth).await;
        state.active.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn process_item<E: StrategyExecutor>(
    config: &CrawlConfig,
    policy: &RoutingPolicy,
    executor: &E,
    state: &CrawlState,
    url: String,
    depth: usize,
) {
    if depth > config.max_depth() {
        return;
    }

    let normalized = normalize_for_dedup(&url);
    // Atomic check-and-insert: a URL is fetched at most once per run
    if !state.visited.insert(normalized.clone()) {
        return;
    }
    state.originals.insert(normalized, url.clone());

    if state.pages.lock().await.len() >= config.max_pages() {
        state.hit_page_limit.store(true, Ordering::Relaxed);
        return;
    }

    // Politeness: one gate for the whole pool keeps the inter-fetch
    // spacing honest regardless of worker count
    let delay = config.crawl_delay();
    if !delay.is_zero() {
        let mut gate = state.politeness.lock().await;
        if let Some(last) = *gate {
            let since = last.elapsed();
            if since < delay {
                tokio::time::sleep(delay - since).await;
            }
        }
        *gate = Some(Instant::now());
    }

    let n = state.attempted.fetch_add(1, Ordering::Relaxed) + 1;
    info!("[{n}/{}] crawling depth {depth}: {url}", config.max_pages());

    let chain = FallbackChain::new(policy.strategies_for(&url));
    let ctx = config.fetch_context(&url);

    match chain.dispatch(&ctx, executor, &url).await {
        Ok(outcome) => {
            state.bytes.fetch_add(outcome.html.len(), Ordering::Relaxed);

            if depth < config.max_depth() {
                let discovered =
                    extract_internal_links(&outcome.html, &outcome.final_url, config.doc_filter());
                let fresh: Vec<(String, String)> = discovered
                    .into_iter()
                    .filter(|(norm, _)| !state.visited.contains(norm))
                    .take(MAX_LINKS_PER_PAGE)
                    .collect();
                if !fresh.is_empty() {
                    info!("found {} new link(s) on {url}", fresh.len());
                    let mut frontier = state.frontier.lock().await;
                    for (_, original) in fresh {
                        frontier.push_back((original, depth + 1));
                    }
                }
            }

            let mut pages = state.pages.lock().await;
            if pages.len() < config.max_pages() {
                pages.push(CrawledPage {
                    url,
                    final_url: outcome.final_url,
                    html: outcome.html,
                    depth,
                    metrics: outcome.metrics,
                    metadata: outcome.metadata,
                    encoding: outcome.encoding,
                });
                if pages.len() >= config.max_pages() {
                    state.hit_page_limit.store(true, Ordering::Relaxed);
                }
            } else {
                state.hit_page_limit.store(true, Ordering::Relaxed);
            }
        }
        Err(failure) => {
            warn!("failed to crawl {url}: {}", failure.error);
            state
                .failed
                .lock()
                .await
                .push((url, failure.error.to_string()));
        }
    }
}
