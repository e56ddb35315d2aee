//! End-to-end pipeline: fetch, classify, parse, compose, save.
//!
//! Ties the fetch orchestration to the template parser and the content
//! saver. Single-page mode dispatches one URL through the fallback
//! chain; crawl mode wraps the same per-page processing around the
//! breadth-first crawler.

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;

use crate::classify::{detect_page_type, extract_list_items, PageType};
use crate::config::CrawlConfig;
use crate::content_saver::{compose_article, compose_list_page, save_html_snapshot, save_markdown};
use crate::crawler::{crawl_site, CrawlStats};
use crate::fetch::{FallbackChain, StrategySet};
use crate::metrics::{FetchMetrics, UrlMetadata};
use crate::routing::RoutingPolicy;
use crate::template::{self, TemplateLoader};
use crate::urlnorm::canonicalize;

/// One emitted document.
#[derive(Debug, Serialize)]
pub struct PageOutput {
    pub url: String,
    pub final_url: String,
    pub document_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_path: Option<PathBuf>,
    pub page_type: PageType,
    pub template: String,
    pub parse_success: bool,
    pub metrics: FetchMetrics,
}

/// What a run produced.
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub outputs: Vec<PageOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crawl: Option<CrawlSummary>,
}

#[derive(Debug, Serialize)]
pub struct CrawlSummary {
    pub pages_attempted: usize,
    pub pages_succeeded: usize,
    pub pages_failed: usize,
    pub total_bytes: u64,
    pub elapsed_secs: f64,
    pub status: String,
}

impl From<&CrawlStats> for CrawlSummary {
    fn from(stats: &CrawlStats) -> Self {
        Self {
            pages_attempted: stats.pages_attempted,
            pages_succeeded: stats.pages_succeeded,
            pages_failed: stats.pages_failed,
            total_bytes: stats.total_bytes,
            elapsed_secs: stats.elapsed_secs,
            status: stats.status_line(),
        }
    }
}

/// The assembled pipeline, built once per run from configuration.
pub struct Pipeline {
    config: CrawlConfig,
    policy: RoutingPolicy,
    templates: TemplateLoader,
    strategies: StrategySet,
}

impl Pipeline {
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let policy = RoutingPolicy::load(
            config.ssl_domains_path().map(PathBuf::as_path),
            config.routing_rules_path().map(PathBuf::as_path),
        )
        .context("failed to load routing policy")?;
        let templates = TemplateLoader::new(config.template_dir().cloned())
            .context("failed to load templates")?;
        let strategies = StrategySet::from_config(&config)?;
        Ok(Self {
            config,
            policy,
            templates,
            strategies,
        })
    }

    pub async fn run(&self) -> Result<RunSummary> {
        if self.config.crawl_enabled() {
            self.run_crawl().await
        } else {
            self.run_single().await
        }
    }

    async fn run_single(&self) -> Result<RunSummary> {
        let input_url = self.config.start_url().to_string();
        let url = canonicalize(&input_url).map_err(|e| anyhow::anyhow!("{e}"))?;

        let chain = FallbackChain::new(self.policy.strategies_for(&url));
        let ctx = self.config.fetch_context(&url);

        let outcome = match chain.dispatch(&ctx, &self.strategies, &input_url).await {
            Ok(outcome) => outcome,
            Err(failure) => {
                return Err(anyhow::anyhow!(failure.error));
            }
        };

        let output = self
            .process_page(
                &url,
                &outcome.final_url,
                &outcome.html,
                outcome.metrics,
                outcome.metadata,
                false,
            )
            .await?;

        Ok(RunSummary {
            outputs: vec![output],
            crawl: None,
        })
    }

    async fn run_crawl(&self) -> Result<RunSummary> {
        let report = crawl_site(&self.config, &self.policy, &self.strategies).await?;

        let mut outputs = Vec::with_capacity(report.pages.len());
        for page in &report.pages {
            match self
                .process_page(
                    &page.url,
                    &page.final_url,
                    &page.html,
                    page.metrics.clone(),
                    page.metadata.clone(),
                    true,
                )
                .await
            {
                Ok(output) => outputs.push(output),
                Err(e) => warn!("failed to emit document for {}: {e:#}", page.url),
            }
        }

        Ok(RunSummary {
            outputs,
            crawl: Some(CrawlSummary::from(&report.stats)),
        })
    }

    /// Classify, parse, compose, and save one fetched page.
    async fn process_page(
        &self,
        url: &str,
        final_url: &str,
        html: &str,
        metrics: FetchMetrics,
        metadata: UrlMetadata,
        crawling: bool,
    ) -> Result<PageOutput> {
        let page_type = detect_page_type(html, crawling);
        let parsed = template::parse(html, final_url, &self.templates);

        if !parsed.success {
            warn!(
                "extraction incomplete for {url} (template '{}'): {}",
                parsed.template_name,
                parsed.errors.join("; ")
            );
        }

        let document = match page_type {
            PageType::Article => compose_article(&parsed, &metrics, &metadata),
            PageType::ListIndex => {
                let items = extract_list_items(html, final_url);
                compose_list_page(&parsed.title, &items, &metrics, &metadata)
            }
        };

        let document_path = save_markdown(&document, final_url, self.config.output_dir()).await?;
        info!("wrote {}", document_path.display());

        let html_path = if self.config.save_raw_html() {
            Some(save_html_snapshot(html, final_url, self.config.output_dir()).await?)
        } else {
            None
        };

        Ok(PageOutput {
            url: url.to_string(),
            final_url: final_url.to_string(),
            document_path,
            html_path,
            page_type,
            template: parsed.template_name.clone(),
            parse_success: parsed.success,
            metrics,
        })
    }
}
