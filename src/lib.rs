//! pagemill: fetch hostile, dynamic, or encoding-diverse web pages and
//! mill them into clean, structured Markdown.
//!
//! The core is the fetch orchestration engine: a routing policy maps a
//! URL to an ordered strategy list, a retry controller drives each
//! strategy with exponential backoff, and a fallback chain advances
//! from plain HTTP through a headless browser session to an
//! operator-assisted capture. Around it sit the charset detector, the
//! template-driven parser, the page-type classifier, and a bounded
//! breadth-first crawler.

pub mod classify;
pub mod config;
pub mod content_saver;
pub mod crawler;
pub mod encoding;
pub mod error;
pub mod fetch;
pub mod markdown;
pub mod metrics;
pub mod pipeline;
pub mod routing;
pub mod template;
pub mod urlnorm;
pub mod utils;

pub use classify::{detect_page_type, extract_list_items, ListItem, PageType};
pub use config::CrawlConfig;
pub use crawler::{crawl_site, CrawlReport, CrawlStats, CrawledPage};
pub use encoding::{decode_html, Decoded};
pub use error::{Classification, ErrorKind, FetchError};
pub use fetch::{
    DispatchOutcome, FallbackChain, FetchContext, Strategy, StrategyExecutor, StrategyResult,
    StrategySet,
};
pub use metrics::{FetchMetrics, FinalStatus, UrlMetadata};
pub use pipeline::{Pipeline, RunSummary};
pub use routing::RoutingPolicy;
pub use template::{ParseResult, Template, TemplateLoader};
pub use urlnorm::{canonicalize, normalize_for_dedup, resolve_href};

/// Run the configured pipeline end to end.
pub async fn run(config: CrawlConfig) -> anyhow::Result<RunSummary> {
    let pipeline = Pipeline::new(config)?;
    pipeline.run().await
}
