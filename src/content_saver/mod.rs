//! Markdown document composition and mirror-layout persistence.
//!
//! Output lands at `<outdir>/<host>/<path>/index.md`, mirroring the site
//! structure. Each document carries the fetch-metrics comment block, a
//! title heading, the four-line metadata block, the body, optional image
//! and video sections, and the visible metrics footer.

pub mod document;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;

pub use document::{compose_article, compose_list_page};

/// Mirror path for a URL: `<outdir>/<host>/<path segments>/<filename>`.
///
/// Path segments are sanitized for the filesystem; query strings are
/// folded into the final directory name so distinct pages stay distinct.
pub fn mirror_path(url: &str, output_dir: &Path, filename: &str) -> Result<PathBuf> {
    let after_scheme = url
        .split("://")
        .nth(1)
        .with_context(|| format!("URL has no scheme: {url}"))?;
    let (host_port, rest) = match after_scheme.find('/') {
        Some(idx) => (&after_scheme[..idx], &after_scheme[idx + 1..]),
        None => (after_scheme, ""),
    };
    if host_port.is_empty() {
        anyhow::bail!("URL has no host: {url}");
    }

    let mut path = output_dir.join(sanitize(host_port));

    let rest = rest.split('#').next().unwrap_or("");
    let (segments, query) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };
    for segment in segments.split('/').filter(|s| !s.is_empty()) {
        path = path.join(sanitize(segment));
    }
    if let Some(query) = query {
        if !query.is_empty() {
            path = path.join(sanitize(query));
        }
    }

    Ok(path.join(filename))
}

fn sanitize(segment: &str) -> String {
    if segment == "." || segment == ".." {
        return "_".to_string();
    }
    let cleaned = sanitize_filename::sanitize(segment);
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Write a composed Markdown document to its mirror location.
pub async fn save_markdown(content: &str, url: &str, output_dir: &Path) -> Result<PathBuf> {
    save_file(content.as_bytes(), url, output_dir, "index.md").await
}

/// Write the raw HTML snapshot next to the Markdown.
pub async fn save_html_snapshot(html: &str, url: &str, output_dir: &Path) -> Result<PathBuf> {
    save_file(html.as_bytes(), url, output_dir, "index.html").await
}

async fn save_file(bytes: &[u8], url: &str, output_dir: &Path, filename: &str) -> Result<PathBuf> {
    let path = mirror_path(url, output_dir, filename)?;
    let parent = path
        .parent()
        .with_context(|| format!("mirror path has no parent: {}", path.display()))?;
    tokio::fs::create_dir_all(parent)
        .await
        .with_context(|| format!("cannot create {}", parent.display()))?;
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("cannot write {}", path.display()))?;
    debug!("saved {} bytes to {}", bytes.len(), path.display());
    Ok(path)
}
