//! Markdown document assembly.
//!
//! The emitted format: metrics comment block, level-1 title heading, the
//! four-line metadata block (`- Title:` / `- Published:` / `- Source:` /
//! `- Fetched:`), the body, optional `## Images` and `## Videos`
//! sections, and a visible metrics footer.

use serde_json::Value;

use crate::classify::ListItem;
use crate::markdown::normalize_markdown;
use crate::metrics::{embed_metrics, FetchMetrics, UrlMetadata};
use crate::template::ParseResult;

/// Compose the document for an article page.
#[must_use]
pub fn compose_article(
    parsed: &ParseResult,
    metrics: &FetchMetrics,
    metadata: &UrlMetadata,
) -> String {
    let title = if parsed.title.is_empty() {
        "Untitled"
    } else {
        &parsed.title
    };

    let mut doc = String::with_capacity(parsed.content.len() + 512);
    doc.push_str(&format!("# {title}\n\n"));
    doc.push_str(&metadata_block(title, parsed, metadata));
    doc.push('\n');
    doc.push_str(&parsed.content);
    doc.push('\n');

    push_media_section(&mut doc, "Images", parsed.metadata.get("images"));
    push_media_section(&mut doc, "Videos", parsed.metadata.get("videos"));

    embed_metrics(&normalize_markdown(&doc), metrics)
}

/// Compose the document for a list/index page.
#[must_use]
pub fn compose_list_page(
    title: &str,
    items: &[ListItem],
    metrics: &FetchMetrics,
    metadata: &UrlMetadata,
) -> String {
    let title = if title.is_empty() { "Index" } else { title };

    let mut doc = String::new();
    doc.push_str(&format!("# {title}\n\n"));
    doc.push_str(&format!("- Title: {title}\n"));
    doc.push_str("- Published: Unknown\n");
    doc.push_str(&format!("- Source: {}\n", metadata.final_url));
    doc.push_str(&format!(
        "- Fetched: {}\n\n",
        metadata.fetch_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    doc.push_str(&format!("Contains {} item(s):\n\n", items.len()));
    for item in items {
        let date = item
            .date
            .as_deref()
            .map(|d| format!(" ({d})"))
            .unwrap_or_default();
        doc.push_str(&format!("{}. [{}]({}){date}\n", item.index, item.title, item.url));
        if let Some(summary) = &item.summary {
            doc.push_str(&format!("   {summary}\n"));
        }
    }

    embed_metrics(&normalize_markdown(&doc), metrics)
}

fn metadata_block(title: &str, parsed: &ParseResult, metadata: &UrlMetadata) -> String {
    let published = parsed
        .metadata
        .get("date")
        .and_then(Value::as_str)
        .unwrap_or("Unknown");
    format!(
        "- Title: {title}\n- Published: {published}\n- Source: {}\n- Fetched: {}\n",
        metadata.final_url,
        metadata.fetch_date.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

fn push_media_section(doc: &mut String, heading: &str, values: Option<&Value>) {
    let Some(Value::Array(items)) = values else {
        return;
    };
    if items.is_empty() {
        return;
    }
    doc.push_str(&format!("\n## {heading}\n\n"));
    for item in items {
        if let Some(url) = item.as_str() {
            doc.push_str(&format!("- {url}\n"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Strategy;
    use std::collections::BTreeMap;

    fn sample() -> (ParseResult, FetchMetrics, UrlMetadata) {
        let mut meta_map = BTreeMap::new();
        meta_map.insert("date".to_string(), Value::String("2024-05-01".to_string()));
        meta_map.insert(
            "images".to_string(),
            serde_json::json!(["https://example.com/a.jpg"]),
        );
        let parsed = ParseResult {
            title: "Headline".to_string(),
            content: "Body paragraph.".to_string(),
            metadata: meta_map,
            success: true,
            errors: Vec::new(),
            template_name: "generic".to_string(),
        };
        let mut metrics = FetchMetrics::default();
        metrics.record_attempted(Strategy::Http);
        metrics.record_success(Strategy::Http);
        metrics.total_attempts = 1;
        let metadata = UrlMetadata::new(
            "https://example.com/x",
            "https://example.com/x",
            Strategy::Http,
        );
        (parsed, metrics, metadata)
    }

    #[test]
    fn article_document_has_all_sections_in_order() {
        let (parsed, metrics, metadata) = sample();
        let doc = compose_article(&parsed, &metrics, &metadata);

        let comment = doc.find("<!-- Fetch Metrics:").unwrap();
        let heading = doc.find("# Headline").unwrap();
        let title_line = doc.find("- Title: Headline").unwrap();
        let published = doc.find("- Published: 2024-05-01").unwrap();
        let body = doc.find("Body paragraph.").unwrap();
        let images = doc.find("## Images").unwrap();
        let footer = doc.find("*Fetched via: http*").unwrap();

        assert!(comment < heading);
        assert!(heading < title_line);
        assert!(title_line < published);
        assert!(published < body);
        assert!(body < images);
        assert!(images < footer);
    }

    #[test]
    fn empty_body_still_produces_a_document() {
        let (mut parsed, metrics, metadata) = sample();
        parsed.content.clear();
        parsed.success = false;
        let doc = compose_article(&parsed, &metrics, &metadata);
        assert!(doc.contains("# Headline"));
        assert!(doc.contains("- Source: https://example.com/x"));
    }

    #[test]
    fn list_document_enumerates_items() {
        let (_, metrics, metadata) = sample();
        let items = vec![
            ListItem {
                title: "First story".to_string(),
                url: "https://example.com/1".to_string(),
                date: Some("2024-05-02".to_string()),
                summary: None,
                index: 1,
            },
            ListItem {
                title: "Second story".to_string(),
                url: "https://example.com/2".to_string(),
                date: None,
                summary: Some("a summary".to_string()),
                index: 2,
            },
        ];
        let doc = compose_list_page("News Index", &items, &metrics, &metadata);
        assert!(doc.contains("Contains 2 item(s):"));
        assert!(doc.contains("1. [First story](https://example.com/1) (2024-05-02)"));
        assert!(doc.contains("2. [Second story](https://example.com/2)"));
        assert!(doc.contains("   a summary"));
    }

    #[test]
    fn markdown_output_is_normalized() {
        let (mut parsed, metrics, metadata) = sample();
        parsed.content = "a\n\n\n\n\nb   ".to_string();
        let doc = compose_article(&parsed, &metrics, &metadata);
        assert!(!doc.contains("\n\n\n"));
    }
}
