//! Getter methods for `CrawlConfig`
//!
//! This module provides all the accessor methods for retrieving
//! configuration values from a `CrawlConfig` instance.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::types::CrawlConfig;

impl CrawlConfig {
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub fn start_url(&self) -> &str {
        &self.start_url
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    #[must_use]
    pub fn extra_headers(&self) -> &HashMap<String, String> {
        &self.extra_headers
    }

    #[must_use]
    pub fn manual_enabled(&self) -> bool {
        self.manual_enabled
    }

    #[must_use]
    pub fn debug_endpoint(&self) -> &str {
        &self.debug_endpoint
    }

    #[must_use]
    pub fn session_recovery_cmd(&self) -> Option<&str> {
        self.session_recovery_cmd.as_deref()
    }

    #[must_use]
    pub fn scroll_to_bottom(&self) -> bool {
        self.scroll_to_bottom
    }

    #[must_use]
    pub fn crawl_enabled(&self) -> bool {
        self.crawl_enabled
    }

    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    #[must_use]
    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    #[must_use]
    pub fn crawl_delay(&self) -> Duration {
        Duration::from_secs_f64(self.crawl_delay_secs.max(0.0))
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    #[must_use]
    pub fn doc_filter(&self) -> bool {
        self.doc_filter
    }

    #[must_use]
    pub fn save_raw_html(&self) -> bool {
        self.save_raw_html
    }

    #[must_use]
    pub fn template_dir(&self) -> Option<&PathBuf> {
        self.template_dir.as_ref()
    }

    #[must_use]
    pub fn routing_rules_path(&self) -> Option<&PathBuf> {
        self.routing_rules_path.as_ref()
    }

    #[must_use]
    pub fn ssl_domains_path(&self) -> Option<&PathBuf> {
        self.ssl_domains_path.as_ref()
    }
}
