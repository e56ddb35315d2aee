//! Template-driven extraction: HTML plus a matched template in,
//! structured `ParseResult` out.
//!
//! For every output field the selector variants run in declared order
//! and the first non-empty result wins. The parser never mutates the
//! caller's HTML; pre-processing happens on a private copy. It is a pure
//! function of `(html, url, templates)` with no dependency on how the
//! page was fetched.

use std::collections::BTreeMap;

use log::debug;
use scraper::{Html, Selector};
use serde_json::Value;

use super::loader::TemplateLoader;
use super::types::{
    FieldConfig, ParseResult, PostProcess, SelectorStrategy, SelectorVariant, Validation,
};
use super::xpath;
use crate::markdown::{convert_to_markdown, preprocess_html};
use crate::urlnorm::resolve_href;

/// JavaScript fragments that disqualify a value pretending to be a URL.
const JS_KEYWORDS: &[&str] = &[
    "function",
    "window",
    "document",
    "var ",
    "=>",
    "localStorage",
    "return ",
    "if(",
    "!function",
    "void 0",
];

/// Largest data: URL accepted for list fields, in bytes.
const MAX_DATA_URL_LEN: usize = 500;

/// Parse a page with the template matched to its URL.
#[must_use]
pub fn parse(html: &str, url: &str, templates: &TemplateLoader) -> ParseResult {
    let template = templates.template_for(url);
    let mut result = ParseResult {
        template_name: template.name.clone(),
        ..ParseResult::default()
    };

    let preprocessed = preprocess_html(html, url);
    let document = Html::parse_document(&preprocessed);

    // Title: template selectors first, then the bare <title> tag
    let title_config = template.selectors.title.clone();
    result.title = extract_field(&document, title_config.as_ref())
        .or_else(|| {
            extract_field(
                &document,
                Some(&FieldConfig::Selector("title".to_string())),
            )
        })
        .unwrap_or_default();
    if result.title.is_empty() {
        result.errors.push("no selector matched title".to_string());
    }

    // Body: extract the matched element's HTML, then convert
    match extract_content_html(&document, template.selectors.content.as_ref()) {
        Some(fragment) => match convert_to_markdown(&fragment) {
            Ok(markdown) => result.content = markdown,
            Err(e) => result.errors.push(format!("markdown conversion failed: {e}")),
        },
        None => result.errors.push("no selector matched content".to_string()),
    }

    result.metadata = extract_metadata(&document, &template.selectors, url);

    result.success = !result.title.is_empty() || !result.content.is_empty();
    result
}

fn extract_metadata(
    document: &Html,
    selectors: &super::types::SelectorMap,
    url: &str,
) -> BTreeMap<String, Value> {
    let mut metadata = BTreeMap::new();

    for (key, config) in [
        ("author", selectors.author.as_ref()),
        ("date", selectors.date.as_ref()),
        ("description", selectors.description.as_ref()),
    ] {
        if let Some(value) = extract_field(document, config) {
            metadata.insert(key.to_string(), Value::String(value));
        }
    }

    for (key, config) in [
        ("images", selectors.images.as_ref()),
        ("videos", selectors.videos.as_ref()),
    ] {
        if let Some(config) = config {
            let values = extract_list(document, config, url);
            if !values.is_empty() {
                metadata.insert(
                    key.to_string(),
                    Value::Array(values.into_iter().map(Value::String).collect()),
                );
            }
        }
    }

    for (key, config) in &selectors.metadata {
        if let Some(value) = extract_field(document, Some(config)) {
            metadata.insert(key.clone(), Value::String(value));
        }
    }

    metadata
}

/// Single-value field: first variant that produces a non-empty result.
fn extract_field(document: &Html, config: Option<&FieldConfig>) -> Option<String> {
    let config = config?;
    for variant in config.variants() {
        if let Some(value) = extract_single(document, &variant) {
            let processed = apply_post_process(&value, &variant.post_process);
            let processed = processed.trim();
            if !processed.is_empty() {
                return Some(processed.to_string());
            }
        }
    }
    None
}

fn extract_single(document: &Html, variant: &SelectorVariant) -> Option<String> {
    let attribute = implicit_attribute(variant);
    match variant.effective_strategy() {
        SelectorStrategy::Css => {
            let selector = Selector::parse(&variant.selector).ok()?;
            let element = document.select(&selector).next()?;
            match &attribute {
                Some(attr) => element.attr(attr).map(str::to_string),
                None => Some(element.text().collect::<String>().trim().to_string()),
            }
        }
        SelectorStrategy::Xpath => {
            let expr = match &attribute {
                Some(attr) if !variant.selector.contains("/@") => {
                    format!("{}/@{attr}", variant.selector)
                }
                _ => variant.selector.clone(),
            };
            match xpath::evaluate(document, &expr) {
                Ok(values) => values.into_iter().next(),
                Err(e) => {
                    debug!("xpath '{}' failed: {e}", variant.selector);
                    None
                }
            }
        }
    }
}

/// Content is extracted as HTML (the element's subtree), not text.
fn extract_content_html(document: &Html, config: Option<&FieldConfig>) -> Option<String> {
    let config = config?;
    for variant in config.variants() {
        let fragment = match variant.effective_strategy() {
            SelectorStrategy::Css => Selector::parse(&variant.selector)
                .ok()
                .and_then(|sel| document.select(&sel).next())
                .map(|el| el.html()),
            SelectorStrategy::Xpath => xpath::evaluate_html(document, &variant.selector)
                .ok()
                .and_then(|mut v| if v.is_empty() { None } else { Some(v.remove(0)) }),
        };
        if let Some(fragment) = fragment {
            if !fragment.trim().is_empty() {
                return Some(fragment);
            }
        }
    }
    None
}

/// List field: all matches from all variants, deduplicated, validated,
/// and resolved absolute against the page URL.
fn extract_list(document: &Html, config: &FieldConfig, url: &str) -> Vec<String> {
    let mut results: Vec<String> = Vec::new();

    for variant in config.variants() {
        let attribute = implicit_attribute(&variant);
        let values: Vec<String> = match variant.effective_strategy() {
            SelectorStrategy::Css => {
                let Ok(selector) = Selector::parse(&variant.selector) else {
                    continue;
                };
                document
                    .select(&selector)
                    .filter_map(|el| match &attribute {
                        Some(attr) => el.attr(attr).map(str::to_string),
                        None => {
                            let text = el.text().collect::<String>().trim().to_string();
                            (!text.is_empty()).then_some(text)
                        }
                    })
                    .collect()
            }
            SelectorStrategy::Xpath => {
                let expr = match &attribute {
                    Some(attr) if !variant.selector.contains("/@") => {
                        format!("{}/@{attr}", variant.selector)
                    }
                    _ => variant.selector.clone(),
                };
                xpath::evaluate(document, &expr).unwrap_or_default()
            }
        };

        for value in values {
            if value.is_empty() || results.contains(&value) {
                continue;
            }
            if url_like(&value) && !validate_url(&value, &variant.validation) {
                continue;
            }
            results.push(value);
        }
    }

    results
        .into_iter()
        .map(|v| if url_like(&v) { resolve_href(url, &v) } else { v })
        .collect()
}

/// `meta[...]` selectors read `@content` unless told otherwise.
fn implicit_attribute(variant: &SelectorVariant) -> Option<String> {
    if variant.attribute.is_some() {
        return variant.attribute.clone();
    }
    if variant.selector.trim_start().starts_with("meta[") {
        return Some("content".to_string());
    }
    None
}

fn url_like(value: &str) -> bool {
    value.starts_with("http://")
        || value.starts_with("https://")
        || value.starts_with("//")
        || value.starts_with("data:")
}

/// Reject values that are not really content URLs.
fn validate_url(url: &str, validation: &Validation) -> bool {
    for keyword in JS_KEYWORDS {
        if url.contains(keyword) {
            debug!("filtered JavaScript posing as URL: {}", &url[..url.len().min(80)]);
            return false;
        }
    }

    if url.starts_with("data:") && url.len() > MAX_DATA_URL_LEN {
        debug!("filtered oversized data URL ({} bytes)", url.len());
        return false;
    }

    if !validation.domain_contains.is_empty()
        && !validation.domain_contains.iter().any(|d| url.contains(d.as_str()))
    {
        return false;
    }

    let lower = url.to_lowercase();
    for pattern in &validation.exclude_patterns {
        if lower.contains(&pattern.to_lowercase()) {
            return false;
        }
    }

    if !validation.url_patterns.is_empty() {
        let matched = validation
            .url_patterns
            .iter()
            .any(|p| regex::Regex::new(p).map_or(false, |re| re.is_match(url)));
        if !matched {
            return false;
        }
    }

    true
}

/// Apply post-processors in declared order.
fn apply_post_process(value: &str, rules: &[PostProcess]) -> String {
    let mut out = value.to_string();
    for rule in rules {
        out = match rule {
            PostProcess::RegexReplace {
                pattern,
                replacement,
                flags,
            } => {
                let mut inline = String::new();
                for flag in ['i', 'm', 's'] {
                    if flags.to_lowercase().contains(flag) {
                        inline.push(flag);
                    }
                }
                let full = if inline.is_empty() {
                    pattern.clone()
                } else {
                    format!("(?{inline}){pattern}")
                };
                match regex::Regex::new(&full) {
                    Ok(re) => re.replace_all(&out, replacement.as_str()).into_owned(),
                    Err(e) => {
                        debug!("regex post-process '{pattern}' failed: {e}");
                        out
                    }
                }
            }
            PostProcess::Replace { old, new } => out.replace(old.as_str(), new.as_str()),
            PostProcess::Strip => out.trim().to_string(),
            PostProcess::Lower => out.to_lowercase(),
            PostProcess::Upper => out.to_uppercase(),
        };
    }
    out
}
