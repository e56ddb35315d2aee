//! Internal-link discovery and filtering for the crawler.
//!
//! Link extraction works over the raw markup with both quoted and
//! unquoted `href=` forms, because the pages worth crawling are exactly
//! the ones whose markup is too broken to trust a strict parser.
//! Discovered links are same-host only, filtered against binary and
//! build-artifact patterns, and returned as a map from normalized URL
//! to original URL so dedup is case-insensitive where it should be
//! while the fetcher still sees the original casing.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::urlnorm::{normalize_for_dedup, resolve_href};

const BINARY_EXTENSIONS: &[&str] = &[
    ".pdf", ".zip", ".tar", ".gz", ".rar", ".7z", ".exe", ".dmg", ".iso",
];
const IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".ico", ".bmp",
];
const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".avi", ".mov", ".wmv", ".flv", ".webm", ".mkv"];
const AUDIO_EXTENSIONS: &[&str] = &[".mp3", ".wav", ".flac", ".aac", ".ogg", ".m4a"];

const API_PATTERNS: &[&str] = &["/api/", "/rest/", "/graphql", ".json", ".xml", ".rss"];
const BUILD_PATTERNS: &[&str] = &[
    "/node_modules/",
    "/dist/",
    "/build/",
    "/.git/",
    "/target/",
    "/_next/",
    "/_nuxt/",
    "/.next/",
    "/static/",
];

static HREF_QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).expect("static regex"));

static HREF_UNQUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)href\s*=\s*([^"'\s>][^\s>]*)"#).expect("static regex"));

/// Extract same-host crawlable links.
///
/// Returns normalized → original URL; the map is ordered so enqueue
/// order is deterministic.
#[must_use]
pub fn extract_internal_links(
    html: &str,
    base_url: &str,
    doc_filter: bool,
) -> BTreeMap<String, String> {
    let base_host = host_of(base_url);
    let mut links = BTreeMap::new();
    let mut processed: Vec<String> = Vec::new();

    for re in [&*HREF_QUOTED, &*HREF_UNQUOTED] {
        for cap in re.captures_iter(html) {
            let href = cap[1].to_string();
            if processed.contains(&href) {
                continue;
            }
            processed.push(href.clone());

            if href.is_empty()
                || href.starts_with('#')
                || href.starts_with("javascript:")
                || href.starts_with("mailto:")
                || href.starts_with("tel:")
            {
                continue;
            }

            let absolute = resolve_href(base_url, &href);
            if host_of(&absolute) != base_host {
                continue;
            }
            if !should_crawl_url(&absolute) {
                continue;
            }
            if doc_filter && !is_documentation_url(&absolute) {
                continue;
            }

            links.insert(normalize_for_dedup(&absolute), absolute);
        }
    }

    links
}

/// Skip binary files, media, APIs, and build artifacts.
#[must_use]
pub fn should_crawl_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    let path = lower
        .split("://")
        .nth(1)
        .and_then(|rest| rest.find('/').map(|i| &rest[i..]))
        .unwrap_or("")
        .split(['?', '#'])
        .next()
        .unwrap_or("");

    for exts in [
        BINARY_EXTENSIONS,
        IMAGE_EXTENSIONS,
        VIDEO_EXTENSIONS,
        AUDIO_EXTENSIONS,
    ] {
        if exts.iter().any(|ext| path.ends_with(ext)) {
            return false;
        }
    }

    for patterns in [API_PATTERNS, BUILD_PATTERNS] {
        if patterns.iter().any(|p| lower.contains(p)) {
            return false;
        }
    }

    true
}

static DOC_SKIP_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"/api/",
        r"/download",
        r"\.zip$",
        r"\.tar",
        r"\.pdf$",
        r"/signin",
        r"/login",
        r"/auth",
        r"/search\?",
        r"\.xml$",
        r"\.json$",
        r"/feed",
        r"/rss",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){p}")).expect("static regex"))
    .collect()
});

/// Heuristic filter for documentation-looking URLs (include by default).
#[must_use]
pub fn is_documentation_url(url: &str) -> bool {
    !DOC_SKIP_RES.iter().any(|re| re.is_match(url))
}

pub(crate) fn host_of(url: &str) -> String {
    url.split("://")
        .nth(1)
        .unwrap_or("")
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("")
        .to_lowercase()
}
