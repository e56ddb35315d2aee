//! Article vs. list-index page classification.
//!
//! News portals mix article pages with index pages listing dozens of
//! headlines; the two need different rendering. Classification combines
//! link density, list-container markup, and link-text consistency. A
//! high share of `#fragment` links is chapter navigation inside an
//! article, not a list, and vetoes the list signals.
//!
//! In single-page mode classification short-circuits to `Article`
//! unless `PAGEMILL_FORCE_CLASSIFY=true` is set.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::urlnorm::resolve_href;

/// Environment override forcing full classification in single-page mode.
pub const FORCE_CLASSIFY_ENV: &str = "PAGEMILL_FORCE_CLASSIFY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageType {
    Article,
    ListIndex,
}

/// One entry of a list/index page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListItem {
    pub title: String,
    pub url: String,
    pub date: Option<String>,
    pub summary: Option<String>,
    /// 1-based position on the page
    pub index: usize,
}

static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<a[^>]*href=["']([^"']+)["'][^>]*>(.*?)</a>"#).expect("static regex"));

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("static regex"));

static SCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("static regex"));

static STYLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("static regex"));

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}[-/.年]\s?\d{1,2}[-/.月]\s?\d{1,2}").expect("static regex"));

/// Markup shapes that signal a list/index page.
static LIST_CONTAINER_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"(?i)<ul[^>]*class=["'][^"']*list[^"']*["']"#,
        r#"(?i)<ol[^>]*class=["'][^"']*list[^"']*["']"#,
        r#"(?i)<div[^>]*class=["'][^"']*list[^"']*["']"#,
        r#"(?i)<div[^>]*class=["'][^"']*index[^"']*["']"#,
        r#"(?i)<div[^>]*class=["'][^"']*content-list[^"']*["']"#,
        r#"(?i)<div[^>]*id=["'][^"']*list[^"']*["']"#,
        // Three-column table: the classic government-site news index
        r"(?is)<table[^>]*>.*?<tr[^>]*>.*?<td[^>]*>.*?</td>.*?<td[^>]*>.*?</td>.*?<td[^>]*>.*?</td>",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static regex"))
    .collect()
});

/// Navigation words whose links never count as content.
const NAV_WORDS: &[&str] = &["首页", "返回", "登录", "注册", "home", "back", "login", "register"];
const NAV_EXACT: &[&str] = &["更多", "更多>>"];

/// Classify a page.
///
/// `crawling` is true when the crawler drives the pipeline; single-page
/// fetches default to `Article` without looking at the markup.
#[must_use]
pub fn detect_page_type(html: &str, crawling: bool) -> PageType {
    if !crawling {
        let forced = std::env::var(FORCE_CLASSIFY_ENV)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if !forced {
            debug!("single-page mode: defaulting to Article");
            return PageType::Article;
        }
    }

    let links: Vec<(String, String)> = LINK_RE
        .captures_iter(html)
        .map(|c| {
            let text = TAG_RE.replace_all(&c[2], "");
            (c[1].to_string(), text.trim().to_string())
        })
        .collect();

    let text_len = visible_text_length(html);

    let mut content_links: Vec<&(String, String)> = Vec::new();
    let mut anchor_links = 0usize;
    for link in &links {
        let (href, text) = link;
        if href.starts_with('#') {
            anchor_links += 1;
        } else if is_content_link(text) {
            content_links.push(link);
        }
    }

    // Anchor-heavy pages are articles with chapter navigation
    if !links.is_empty() {
        let anchor_ratio = anchor_links as f64 / links.len() as f64;
        if anchor_ratio > 0.3 || anchor_links >= 10 {
            debug!("anchor ratio {anchor_ratio:.2} ({anchor_links} anchors): Article");
            return PageType::Article;
        }
        if anchor_links >= 5 {
            // Damp the list signals rather than veto them
            content_links.truncate((content_links.len() / 2).max(1));
        }
    }

    let link_density = content_links.len() as f64 / text_len.max(1) as f64 * 1000.0;

    let containers = LIST_CONTAINER_RES
        .iter()
        .filter(|re| re.is_match(html))
        .count();

    let consistency = if content_links.len() >= 5 {
        let lengths: Vec<f64> = content_links
            .iter()
            .map(|(_, t)| t.chars().count() as f64)
            .collect();
        let mean = lengths.iter().sum::<f64>() / lengths.len() as f64;
        let similar = lengths
            .iter()
            .filter(|&&len| (len - mean).abs() <= mean * 0.5)
            .count();
        similar as f64 / lengths.len() as f64
    } else {
        0.0
    };

    let n = content_links.len();
    let is_list = (link_density > 1.5 && n >= 5)
        || containers >= 2
        || (n >= 8 && consistency > 0.5)
        || (link_density > 1.0 && containers >= 1 && n >= 5)
        || (containers >= 1 && n >= 10);

    debug!(
        "page type signals: links={n}, density={link_density:.2}, containers={containers}, consistency={consistency:.2} -> {}",
        if is_list { "ListIndex" } else { "Article" }
    );

    if is_list {
        PageType::ListIndex
    } else {
        PageType::Article
    }
}

fn visible_text_length(html: &str) -> usize {
    let without_scripts = SCRIPT_RE.replace_all(html, "");
    let without_styles = STYLE_RE.replace_all(&without_scripts, "");
    let text = TAG_RE.replace_all(&without_styles, " ");
    let unescaped = html_escape::decode_html_entities(&text);
    unescaped.trim().chars().count()
}

fn is_content_link(text: &str) -> bool {
    if text.chars().count() <= 2 {
        return false;
    }
    let lower = text.to_lowercase();
    if NAV_WORDS.iter().any(|w| lower.contains(w)) {
        return false;
    }
    !NAV_EXACT.contains(&lower.as_str())
}

/// Extract the entries of a list page, in document order.
///
/// A date appearing in the link text or immediately after the anchor is
/// attached to the item; the item index is 1-based.
#[must_use]
pub fn extract_list_items(html: &str, base_url: &str) -> Vec<ListItem> {
    let mut items = Vec::new();
    let mut seen_urls: Vec<String> = Vec::new();

    for cap in LINK_RE.captures_iter(html) {
        let href = &cap[1];
        if href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
        {
            continue;
        }
        let title = TAG_RE.replace_all(&cap[2], "");
        let title = html_escape::decode_html_entities(title.trim()).to_string();
        if !is_content_link(&title) {
            continue;
        }

        let url = resolve_href(base_url, href);
        if seen_urls.contains(&url) {
            continue;
        }
        seen_urls.push(url.clone());

        // A date is often in trailing text right after the anchor
        let match_end = cap.get(0).map_or(0, |m| m.end());
        let tail: String = html[match_end..].chars().take(120).collect();
        let date = DATE_RE
            .find(&title)
            .or_else(|| DATE_RE.find(&tail))
            .map(|m| m.as_str().to_string());

        items.push(ListItem {
            title,
            url,
            date,
            summary: None,
            index: items.len() + 1,
        });
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_page() -> String {
        let rows: String = (0..15)
            .map(|i| {
                format!(
                    "<li><a href=\"/news/article-{i}.html\">Committee announces policy update number {i}</a> 2024-03-{:02}</li>\n",
                    i + 1
                )
            })
            .collect();
        format!(
            "<html><body><div class=\"news-list\"><ul class=\"list\">{rows}</ul></div></body></html>"
        )
    }

    fn article_page() -> String {
        let body = "word ".repeat(2000);
        format!(
            "<html><body><h1>One Headline</h1><article><p>{body}</p>\
             <a href=\"/related\">A related article link</a></article></body></html>"
        )
    }

    #[test]
    fn single_page_mode_short_circuits_to_article() {
        assert_eq!(detect_page_type(&list_page(), false), PageType::Article);
    }

    #[test]
    fn crawl_mode_detects_list_pages() {
        assert_eq!(detect_page_type(&list_page(), true), PageType::ListIndex);
    }

    #[test]
    fn crawl_mode_keeps_articles_articles() {
        assert_eq!(detect_page_type(&article_page(), true), PageType::Article);
    }

    #[test]
    fn anchor_navigation_reads_as_article() {
        let anchors: String = (0..12)
            .map(|i| format!("<a href=\"#section-{i}\">Chapter {i} heading text</a>"))
            .collect();
        let html = format!("<html><body><div class=\"list\">{anchors}</div></body></html>");
        assert_eq!(detect_page_type(&html, true), PageType::Article);
    }

    #[test]
    fn list_items_extracted_with_dates_and_indexes() {
        let items = extract_list_items(&list_page(), "https://example.com/index.html");
        assert_eq!(items.len(), 15);
        assert_eq!(items[0].index, 1);
        assert_eq!(items[0].url, "https://example.com/news/article-0.html");
        assert_eq!(items[0].date.as_deref(), Some("2024-03-01"));
        assert!(items[0].title.contains("policy update"));
    }

    #[test]
    fn nav_links_are_not_list_items() {
        let html = r#"<a href="/home">首页</a><a href="/x">更多</a>
                      <a href="/real">A real story headline</a>"#;
        let items = extract_list_items(html, "https://example.com/");
        assert_eq!(items.len(), 1);
        assert!(items[0].title.contains("real story"));
    }
}
