//! Shared configuration constants for pagemill
//!
//! This module contains default values and configuration constants used
//! throughout the codebase to ensure consistency and avoid magic numbers.

/// Maximum decoded page size: 10 MiB
///
/// Responses larger than this are truncated (with a warning), never
/// rejected. Keeps a single hostile page from exhausting memory while
/// still capturing the vast majority of real articles.
pub const MAX_PAGE_SIZE: usize = 10 * 1024 * 1024;

/// Maximum retry attempts per strategy (total attempts = MAX_RETRIES + 1)
pub const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff between retry attempts
pub const BASE_DELAY_SECS: f64 = 1.0;

/// Upper bound of the random jitter added to each backoff sleep
pub const MAX_JITTER_SECS: f64 = 0.1;

/// Default politeness delay between crawl fetches, in seconds
pub const DEFAULT_CRAWL_DELAY_SECS: f64 = 0.5;

/// Default maximum crawl depth
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Default maximum pages per crawl run
pub const DEFAULT_MAX_PAGES: usize = 1000;

/// New links enqueued per page, after sorting for determinism
pub const MAX_LINKS_PER_PAGE: usize = 50;

/// Chrome user agent string presented by the HTTP strategy
///
/// Matches a current desktop Chrome so encoding-diverse CJK portals serve
/// their regular markup rather than a legacy or bot-targeted variant.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0 Safari/537.36";

/// Accept-Language header sent with every HTTP fetch
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8";

/// Default Chrome DevTools debug endpoint probed by the headless strategy
pub const DEFAULT_DEBUG_ENDPOINT: &str = "http://127.0.0.1:9222";

/// Timeout for the debug-endpoint liveness probe
pub const SESSION_PROBE_TIMEOUT_MS: u64 = 2_000;

/// Settling interval after `domcontentloaded` before DOM capture
pub const PAGE_SETTLE_MS: u64 = 800;

/// Additional wait after scrolling to the bottom of a page
pub const SCROLL_SETTLE_MS: u64 = 600;

/// How many bytes of the body the meta-charset scanner inspects
pub const CHARSET_SCAN_WINDOW: usize = 8 * 1024;
