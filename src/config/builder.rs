//! Type-safe builder for `CrawlConfig` using the typestate pattern
//!
//! This module provides a fluent builder interface with compile-time
//! validation ensuring that the required fields (output directory and
//! start URL) are set before a `CrawlConfig` can be built.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::PathBuf;

use anyhow::{anyhow, Result};

use super::types::CrawlConfig;
use crate::utils::constants::{
    DEFAULT_CRAWL_DELAY_SECS, DEFAULT_DEBUG_ENDPOINT, DEFAULT_MAX_DEPTH, DEFAULT_MAX_PAGES,
    DEFAULT_USER_AGENT, MAX_RETRIES,
};

// Type states for the builder
pub struct WithOutputDir;
pub struct WithStartUrl;

pub struct CrawlConfigBuilder<State = ()> {
    pub(crate) output_dir: Option<PathBuf>,
    pub(crate) start_url: Option<String>,
    pub(crate) user_agent: String,
    pub(crate) timeout_secs: u64,
    pub(crate) max_retries: u32,
    pub(crate) extra_headers: HashMap<String, String>,
    pub(crate) manual_enabled: bool,
    pub(crate) debug_endpoint: String,
    pub(crate) session_recovery_cmd: Option<String>,
    pub(crate) scroll_to_bottom: bool,
    pub(crate) crawl_enabled: bool,
    pub(crate) max_depth: usize,
    pub(crate) max_pages: usize,
    pub(crate) crawl_delay_secs: f64,
    pub(crate) workers: usize,
    pub(crate) doc_filter: bool,
    pub(crate) save_raw_html: bool,
    pub(crate) template_dir: Option<PathBuf>,
    pub(crate) routing_rules_path: Option<PathBuf>,
    pub(crate) ssl_domains_path: Option<PathBuf>,
    pub(crate) _phantom: PhantomData<State>,
}

impl Default for CrawlConfigBuilder<()> {
    fn default() -> Self {
        Self {
            output_dir: None,
            start_url: None,
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
            _phantom: PhantomData,
        }
    }
}

impl CrawlConfig {
    /// Create a builder for configuring a `CrawlConfig` with a fluent interface
    #[must_use]
    pub fn builder() -> CrawlConfigBuilder<()> {
        CrawlConfigBuilder::default()
    }
}

impl<State> CrawlConfigBuilder<State> {
    fn transition<Next>(self) -> CrawlConfigBuilder<Next> {
        CrawlConfigBuilder {
            output_dir: self.output_dir,
            start_url: self.start_url,
            user_agent: self.user_agent,
            timeout_secs: self.timeout_secs,
            max_retries: self.max_retries,
            extra_headers: self.extra_headers,
            manual_enabled: self.manual_enabled,
            debug_endpoint: self.debug_endpoint,
            session_recovery_cmd: self.session_recovery_cmd,
            scroll_to_bottom: self.scroll_to_bottom,
            crawl_enabled: self.crawl_enabled,
            max_depth: self.max_depth,
            max_pages: self.max_pages,
            crawl_delay_secs: self.crawl_delay_secs,
            workers: self.workers,
            doc_filter: self.doc_filter,
            save_raw_html: self.save_raw_html,
            template_dir: self.template_dir,
            routing_rules_path: self.routing_rules_path,
            ssl_domains_path: self.ssl_domains_path,
            _phantom: PhantomData,
        }
    }

    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    #[must_use]
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    #[must_use]
    pub fn extra_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn manual_enabled(mut self, enabled: bool) -> Self {
        self.manual_enabled = enabled;
        self
    }

    #[must_use]
    pub fn debug_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.debug_endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn session_recovery_cmd(mut self, cmd: Option<String>) -> Self {
        self.session_recovery_cmd = cmd;
        self
    }

    #[must_use]
    pub fn scroll_to_bottom(mut self, scroll: bool) -> Self {
        self.scroll_to_bottom = scroll;
        self
    }

    #[must_use]
    pub fn crawl_enabled(mut self, enabled: bool) -> Self {
        self.crawl_enabled = enabled;
        self
    }

    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    #[must_use]
    pub fn max_pages(mut self, pages: usize) -> Self {
        self.max_pages = pages;
        self
    }

    #[must_use]
    pub fn crawl_delay_secs(mut self, delay: f64) -> Self {
        self.crawl_delay_secs = delay;
        self
    }

    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn doc_filter(mut self, enabled: bool) -> Self {
        self.doc_filter = enabled;
        self
    }

    #[must_use]
    pub fn save_raw_html(mut self, save: bool) -> Self {
        self.save_raw_html = save;
        self
    }

    #[must_use]
    pub fn template_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.template_dir = dir;
        self
    }

    #[must_use]
    pub fn routing_rules_path(mut self, path: Option<PathBuf>) -> Self {
        self.routing_rules_path = path;
        self
    }

    #[must_use]
    pub fn ssl_domains_path(mut self, path: Option<PathBuf>) -> Self {
        self.ssl_domains_path = path;
        self
    }
}

impl CrawlConfigBuilder<()> {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> CrawlConfigBuilder<WithOutputDir> {
        self.output_dir = Some(dir.into());
        self.transition()
    }
}

impl CrawlConfigBuilder<WithOutputDir> {
    pub fn start_url(mut self, url: impl Into<String>) -> CrawlConfigBuilder<WithStartUrl> {
        let url = url.into();
        // Accept bare hostnames; the canonicalizer still validates later
        let url = if url.contains("://") {
            url
        } else {
            format!("https://{url}")
        };
        self.start_url = Some(url);
        self.transition()
    }
}

// Build method only available when all required fields are set
impl CrawlConfigBuilder<WithStartUrl> {
    pub fn build(self) -> Result<CrawlConfig> {
        let output_dir = self
            .output_dir
            .ok_or_else(|| anyhow!("output_dir is required"))?;
        // Normalize to an absolute path for stable mirror-path computation
        let output_dir = if output_dir.is_absolute() {
            output_dir
        } else {
            std::env::current_dir()?.join(output_dir)
        };

        if !(0.0..=3600.0).contains(&self.crawl_delay_secs) {
            return Err(anyhow!(
                "crawl_delay_secs must be within 0..=3600, got {}",
                self.crawl_delay_secs
            ));
        }

        let workers = self.workers.clamp(1, 8);

        Ok(CrawlConfig {
            output_dir,
            start_url: self
                .start_url
                .ok_or_else(|| anyhow!("start_url is required"))?,
            user_agent: self.user_agent,
            timeout_secs: self.timeout_secs,
            max_retries: self.max_retries,
            extra_headers: self.extra_headers,
            manual_enabled: self.manual_enabled,
            debug_endpoint: self.debug_endpoint,
            session_recovery_cmd: self.session_recovery_cmd,
            scroll_to_bottom: self.scroll_to_bottom,
            crawl_enabled: self.crawl_enabled,
            max_depth: self.max_depth,
            max_pages: self.max_pages,
            crawl_delay_secs: self.crawl_delay_secs,
            workers,
            doc_filter: self.doc_filter,
            save_raw_html: self.save_raw_html,
            template_dir: self.template_dir,
            routing_rules_path: self.routing_rules_path,
            ssl_domains_path: self.ssl_domains_path,
        })
    }
}
