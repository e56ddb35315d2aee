//! Core configuration types for fetch and crawl operations.
//!
//! This module contains the main `CrawlConfig` struct that defines the
//! configuration parameters for a run. Construct it through the builder
//! (`CrawlConfig::builder()`), which enforces the required fields at
//! compile time.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fetch::FetchContext;
use crate::utils::constants::{
    DEFAULT_CRAWL_DELAY_SECS, DEFAULT_DEBUG_ENDPOINT, DEFAULT_MAX_DEPTH, DEFAULT_MAX_PAGES,
    DEFAULT_USER_AGENT, MAX_RETRIES,
};

/// Configuration for one pagemill run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Output directory for emitted Markdown.
    ///
    /// **INVARIANT:** normalized to an absolute path in the builder so
    /// mirror-path computation is stable regardless of working directory.
    pub(crate) output_dir: PathBuf,
    pub(crate) start_url: String,
    pub(crate) user_agent: String,
    pub(crate) timeout_secs: u64,
    /// Retries after the first attempt; 0 means exactly one attempt
    pub(crate) max_retries: u32,
    pub(crate) extra_headers: HashMap<String, String>,

    /// Allow the operator-driven manual strategy as a last resort.
    /// When false the strategy is skipped silently.
    pub(crate) manual_enabled: bool,
    /// DevTools debug endpoint the headless strategy probes and attaches to
    pub(crate) debug_endpoint: String,
    /// External command that (re)starts the browser debug session
    pub(crate) session_recovery_cmd: Option<String>,
    /// Scroll to the bottom before DOM capture, for lazy-loaded content
    pub(crate) scroll_to_bottom: bool,

    /// Crawl mode: follow internal links breadth-first
    pub(crate) crawl_enabled: bool,
    pub(crate) max_depth: usize,
    pub(crate) max_pages: usize,
    /// Politeness delay between fetches, in seconds
    pub(crate) crawl_delay_secs: f64,
    /// Concurrent fetch workers draining the frontier (1..=8)
    pub(crate) workers: usize,
    /// Restrict link discovery to documentation-looking URLs
    pub(crate) doc_filter: bool,

    /// Save the raw HTML snapshot next to the Markdown
    pub(crate) save_raw_html: bool,

    pub(crate) template_dir: Option<PathBuf>,
    pub(crate) routing_rules_path: Option<PathBuf>,
    pub(crate) ssl_domains_path: Option<PathBuf>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            start_url: String::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            max_retries: MAX_RETRIES,
            extra_headers: HashMap::new(),
            manual_enabled: false,
            debug_endpoint: DEFAULT_DEBUG_ENDPOINT.to_string(),
            session_recovery_cmd: None,
            scroll_to_bottom: true,
            crawl_enabled: false,
            max_depth: DEFAULT_MAX_DEPTH,
            max_pages: DEFAULT_MAX_PAGES,
            crawl_delay_secs: DEFAULT_CRAWL_DELAY_SECS,
            workers: 1,
            doc_filter: false,
            save_raw_html: false,
            template_dir: None,
            routing_rules_path: None,
            ssl_domains_path: None,
        }
    }
}

impl CrawlConfig {
    /// Build the immutable per-request context for one URL.
    #[must_use]
    pub fn fetch_context(&self, url: impl Into<String>) -> FetchContext {
        FetchContext {
            url: url.into(),
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            extra_headers: self.extra_headers.clone(),
        }
    }
}
