//! Declarative parser templates.
//!
//! A template maps a family of URLs to selector rules for title, body,
//! and metadata. Templates are YAML documents; the serde model here
//! accepts every shape the files use: a bare selector string, a list of
//! strings, or a list of full variant objects with strategy, attribute,
//! validation, and post-processing. Unknown keys are ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One parsed template, immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(default)]
    pub version: String,
    /// Ordered; the first matching pattern wins
    #[serde(default)]
    pub url_patterns: Vec<String>,
    #[serde(default)]
    pub selectors: SelectorMap,
}

/// The per-field selector configuration of a template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectorMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<FieldConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<FieldConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<FieldConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<FieldConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<FieldConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<FieldConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub videos: Option<FieldConfig>,
    /// Free-form additional metadata fields
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, FieldConfig>,
}

/// A field's selector configuration in any of the accepted YAML shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldConfig {
    /// `title: "h1.headline, title"`
    Selector(String),
    /// `title: [{selector: ..., strategy: ...}, "h1"]`
    Variants(Vec<VariantOrString>),
    /// `title: {selector: ..., attribute: ...}`
    One(SelectorVariant),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariantOrString {
    Variant(SelectorVariant),
    Selector(String),
}

/// Fully specified selector variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorVariant {
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<SelectorStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Validation::is_empty")]
    pub validation: Validation,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_process: Vec<PostProcess>,
}

impl SelectorVariant {
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            strategy: Some(SelectorStrategy::Css),
            attribute: None,
            validation: Validation::default(),
            post_process: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, attr: impl Into<String>) -> Self {
        self.attribute = Some(attr.into());
        self
    }

    /// Effective strategy: explicit wins, otherwise XPath is inferred
    /// from a leading `/` or `//`.
    #[must_use]
    pub fn effective_strategy(&self) -> SelectorStrategy {
        self.strategy.unwrap_or_else(|| {
            if self.selector.starts_with('/') {
                SelectorStrategy::Xpath
            } else {
                SelectorStrategy::Css
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorStrategy {
    Css,
    Xpath,
}

/// URL validation rules for list fields (images, videos, links).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Validation {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_contains: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub url_patterns: Vec<String>,
}

impl Validation {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.domain_contains.is_empty()
            && self.exclude_patterns.is_empty()
            && self.url_patterns.is_empty()
    }
}

/// Post-processing applied to an extracted value, in declared order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostProcess {
    RegexReplace {
        pattern: String,
        replacement: String,
        /// Flag letters: `i`, `m`, `s`
        #[serde(default)]
        flags: String,
    },
    Replace {
        old: String,
        new: String,
    },
    Strip,
    Lower,
    Upper,
}

impl FieldConfig {
    /// Expand to the ordered list of variants to try.
    ///
    /// Bare CSS strings may carry comma-separated alternatives, each
    /// tried in order; an XPath string (leading `/`) is kept whole since
    /// XPath predicates legitimately contain commas.
    #[must_use]
    pub fn variants(&self) -> Vec<SelectorVariant> {
        match self {
            Self::Selector(s) => split_selector_string(s),
            Self::One(v) => vec![v.clone()],
            Self::Variants(items) => items
                .iter()
                .flat_map(|item| match item {
                    VariantOrString::Variant(v) => vec![v.clone()],
                    VariantOrString::Selector(s) => split_selector_string(s),
                })
                .collect(),
        }
    }
}

fn split_selector_string(s: &str) -> Vec<SelectorVariant> {
    let s = s.trim();
    if s.is_empty() {
        return Vec::new();
    }
    if s.starts_with('/') {
        return vec![SelectorVariant {
            selector: s.to_string(),
            strategy: Some(SelectorStrategy::Xpath),
            attribute: None,
            validation: Validation::default(),
            post_process: Vec::new(),
        }];
    }
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| SelectorVariant {
            selector: part.to_string(),
            strategy: None,
            attribute: None,
            validation: Validation::default(),
            post_process: Vec::new(),
        })
        .collect()
}

/// Structured output of a template extraction.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ParseResult {
    pub title: String,
    /// Body as Markdown
    pub content: String,
    /// author, date, description, images, videos, plus template extras
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub success: bool,
    pub errors: Vec<String>,
    pub template_name: String,
}
