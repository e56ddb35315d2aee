//! Template directory loading and URL matching.
//!
//! At startup the loader scans a directory of YAML templates, rejects
//! duplicate URL patterns outright, and builds an index tested in load
//! order. Lookups fall back to the reserved `generic` template and are
//! cached per URL. Reload rebuilds the whole index and swaps it
//! atomically; lookups in flight keep the old index.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use dashmap::DashMap;
use log::{debug, info, warn};
use parking_lot::RwLock;
use regex::Regex;

use super::types::{FieldConfig, SelectorMap, SelectorVariant, Template};

/// Reserved name of the fallback template.
pub const GENERIC_TEMPLATE: &str = "generic";

#[derive(Debug)]
enum PatternMatcher {
    Regex(Regex),
    Substring(String),
}

impl PatternMatcher {
    fn compile(pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(re) => Self::Regex(re),
            Err(_) => Self::Substring(pattern.to_string()),
        }
    }

    fn matches(&self, url: &str) -> bool {
        match self {
            Self::Regex(re) => re.is_match(url),
            Self::Substring(s) => url.contains(s.as_str()),
        }
    }
}

#[derive(Debug)]
struct IndexEntry {
    pattern: String,
    matcher: PatternMatcher,
    template: Arc<Template>,
}

#[derive(Debug)]
struct TemplateIndex {
    entries: Vec<IndexEntry>,
    generic: Arc<Template>,
}

/// Thread-safe template store with atomic hot reload.
#[derive(Debug)]
pub struct TemplateLoader {
    dir: Option<PathBuf>,
    index: RwLock<Arc<TemplateIndex>>,
    cache: DashMap<String, Arc<Template>>,
}

impl TemplateLoader {
    /// Load every `*.yaml` / `*.yml` under `dir`. With no directory the
    /// loader serves only the built-in generic template.
    pub fn new(dir: Option<PathBuf>) -> Result<Self> {
        let index = build_index(dir.as_deref())?;
        Ok(Self {
            dir,
            index: RwLock::new(Arc::new(index)),
            cache: DashMap::new(),
        })
    }

    /// Find the template for a URL; patterns are tested in load order and
    /// the first match wins. Matches are cached per URL.
    #[must_use]
    pub fn template_for(&self, url: &str) -> Arc<Template> {
        if let Some(hit) = self.cache.get(url) {
            return hit.value().clone();
        }
        let index = self.index.read().clone();
        let template = index
            .entries
            .iter()
            .find(|entry| entry.matcher.matches(url))
            .map_or_else(
                || {
                    debug!("no template pattern matched {url}, using generic");
                    index.generic.clone()
                },
                |entry| {
                    debug!("template '{}' matched {url} via '{}'", entry.template.name, entry.pattern);
                    entry.template.clone()
                },
            );
        self.cache.insert(url.to_string(), template.clone());
        template
    }

    /// Names of all loaded templates, generic included.
    #[must_use]
    pub fn template_names(&self) -> Vec<String> {
        let index = self.index.read();
        let mut names: Vec<String> = index
            .entries
            .iter()
            .map(|e| e.template.name.clone())
            .collect();
        names.dedup();
        names.push(index.generic.name.clone());
        names
    }

    /// Rebuild the index from disk and swap it in atomically.
    pub fn reload(&self) -> Result<()> {
        let fresh = build_index(self.dir.as_deref())?;
        *self.index.write() = Arc::new(fresh);
        self.cache.clear();
        info!("template index reloaded");
        Ok(())
    }
}

fn build_index(dir: Option<&Path>) -> Result<TemplateIndex> {
    let mut entries: Vec<IndexEntry> = Vec::new();
    let mut generic: Option<Arc<Template>> = None;

    if let Some(dir) = dir {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("cannot read template directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e == "yaml" || e == "yml")
            })
            .collect();
        // Load order defines match priority; sort for determinism
        paths.sort();

        for path in paths {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read template {}", path.display()))?;
            let template: Template = serde_yaml::from_str(&text)
                .with_context(|| format!("invalid template YAML in {}", path.display()))?;
            let template = Arc::new(template);

            if template.name == GENERIC_TEMPLATE {
                generic = Some(template.clone());
                if template.url_patterns.is_empty() {
                    continue;
                }
            }

            for pattern in &template.url_patterns {
                if let Some(existing) = entries.iter().find(|e| e.pattern == *pattern) {
                    bail!(
                        "duplicate URL pattern '{pattern}' in templates '{}' and '{}'",
                        existing.template.name,
                        template.name
                    );
                }
                entries.push(IndexEntry {
                    pattern: pattern.clone(),
                    matcher: PatternMatcher::compile(pattern),
                    template: template.clone(),
                });
            }

            if template.url_patterns.is_empty() && template.name != GENERIC_TEMPLATE {
                warn!(
                    "template '{}' has no url_patterns and will never match",
                    template.name
                );
            }
        }
        info!("loaded {} template pattern(s) from {}", entries.len(), dir.display());
    }

    Ok(TemplateIndex {
        entries,
        generic: generic.unwrap_or_else(|| Arc::new(builtin_generic())),
    })
}

/// The built-in generic template used when nothing matches.
///
/// Title falls back through common headline markup to `<title>`; content
/// tries the usual article containers before giving up to `<body>`.
fn builtin_generic() -> Template {
    let field = |s: &str| Some(FieldConfig::Selector(s.to_string()));
    let meta = |sel: &str, attr: &str| {
        Some(FieldConfig::One(
            SelectorVariant::css(sel).with_attribute(attr),
        ))
    };
    Template {
        name: GENERIC_TEMPLATE.to_string(),
        version: "1.0.0".to_string(),
        url_patterns: Vec::new(),
        selectors: SelectorMap {
            title: field("h1, .article-title, .post-title, title"),
            content: field("article, #content, .article-content, .post-content, .content, main, body"),
            author: meta(r#"meta[name="author"]"#, "content"),
            date: meta(r#"meta[property="article:published_time"]"#, "content"),
            description: meta(r#"meta[name="description"]"#, "content"),
            images: Some(FieldConfig::One(
                SelectorVariant::css("img").with_attribute("src"),
            )),
            videos: Some(FieldConfig::One(
                SelectorVariant::css("video source, video").with_attribute("src"),
            )),
            metadata: Default::default(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_template(dir: &Path, file: &str, body: &str) {
        let mut f = std::fs::File::create(dir.join(file)).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn lookup_falls_back_to_generic() {
        let loader = TemplateLoader::new(None).unwrap();
        let t = loader.template_for("https://unknown.example/page");
        assert_eq!(t.name, GENERIC_TEMPLATE);
    }

    #[test]
    fn first_matching_pattern_wins() {
        let dir = tempfile::tempdir().unwrap();
        write_template(
            dir.path(),
            "a_news.yaml",
            "name: news\nurl_patterns:\n  - \"news.example.com\"\nselectors:\n  title: \"h1\"\n",
        );
        write_template(
            dir.path(),
            "b_broad.yaml",
            "name: broad\nurl_patterns:\n  - \"example.com\"\nselectors:\n  title: \"title\"\n",
        );

        let loader = TemplateLoader::new(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(loader.template_for("https://news.example.com/x").name, "news");
        assert_eq!(loader.template_for("https://www.example.com/x").name, "broad");
    }

    #[test]
    fn duplicate_patterns_fail_fast() {
        let dir = tempfile::tempdir().unwrap();
        write_template(
            dir.path(),
            "one.yaml",
            "name: one\nurl_patterns: [\"dup.example.com\"]\n",
        );
        write_template(
            dir.path(),
            "two.yaml",
            "name: two\nurl_patterns: [\"dup.example.com\"]\n",
        );
        let err = TemplateLoader::new(Some(dir.path().to_path_buf())).unwrap_err();
        assert!(err.to_string().contains("duplicate URL pattern"));
    }

    #[test]
    fn reload_swaps_index_and_clears_cache() {
        let dir = tempfile::tempdir().unwrap();
        write_template(
            dir.path(),
            "site.yaml",
            "name: site\nurl_patterns: [\"site.example\"]\n",
        );
        let loader = TemplateLoader::new(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(loader.template_for("https://site.example/a").name, "site");

        std::fs::remove_file(dir.path().join("site.yaml")).unwrap();
        loader.reload().unwrap();
        assert_eq!(loader.template_for("https://site.example/a").name, GENERIC_TEMPLATE);
    }

    #[test]
    fn generic_in_directory_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        write_template(
            dir.path(),
            "generic.yaml",
            "name: generic\nversion: \"2.0.0\"\nselectors:\n  title: \"h2\"\n",
        );
        let loader = TemplateLoader::new(Some(dir.path().to_path_buf())).unwrap();
        let t = loader.template_for("https://whatever.example/");
        assert_eq!(t.version, "2.0.0");
    }
}
