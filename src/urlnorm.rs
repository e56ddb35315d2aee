//! URL validation, IRI encoding, and dedup normalization.
//!
//! `canonicalize` turns user input (possibly containing Chinese path
//! segments, spaces, or half-encoded queries) into a URL safe to hand to
//! the fetch strategies. The host component is never rewritten, so IDN
//! hosts pass through as typed rather than being punycoded.
//!
//! `normalize_for_dedup` produces the string used for visited-set
//! membership: case-folded scheme/host, fragment stripped, query sorted,
//! trailing slash removed. Path case is preserved because some servers
//! are case-sensitive and the crawler fetches the original URL.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("URL is empty")]
    Empty,
    #[error("URL missing scheme: {0}")]
    MissingScheme(String),
    #[error("URL missing host: {0}")]
    MissingHost(String),
    #[error("file URL has no path: {0}")]
    EmptyFilePath(String),
}

static PERCENT_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%[0-9A-Fa-f]{2}").expect("static regex"));

/// Split into (scheme, authority, path, query, fragment) without decoding.
fn split_url(url: &str) -> Option<(&str, &str, &str, Option<&str>, Option<&str>)> {
    let scheme_end = url.find("://")?;
    let scheme = &url[..scheme_end];
    if scheme.is_empty()
        || !scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        return None;
    }
    let rest = &url[scheme_end + 3..];

    let (rest, fragment) = match rest.split_once('#') {
        Some((r, f)) => (r, Some(f)),
        None => (rest, None),
    };
    let (rest, query) = match rest.split_once('?') {
        Some((r, q)) => (r, Some(q)),
        None => (rest, None),
    };
    let (authority, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };
    Some((scheme, authority, path, query, fragment))
}

/// Validate a URL and percent-encode its non-ASCII components.
///
/// The host is left untouched; path segments that already contain percent
/// escapes are trusted rather than double-encoded. `file://` URLs are
/// validated for a non-empty path and returned unchanged.
pub fn canonicalize(input: &str) -> Result<String, UrlError> {
    let url = input.trim();
    if url.is_empty() {
        return Err(UrlError::Empty);
    }

    let Some((scheme, authority, path, query, fragment)) = split_url(url) else {
        return Err(UrlError::MissingScheme(url.to_string()));
    };

    if scheme.eq_ignore_ascii_case("file") {
        if path.is_empty() || path == "/" {
            return Err(UrlError::EmptyFilePath(url.to_string()));
        }
        return Ok(url.to_string());
    }

    if authority.is_empty() {
        return Err(UrlError::MissingHost(url.to_string()));
    }

    let encoded_path = encode_path(path);
    let encoded_query = query.map(reencode_query);
    let encoded_fragment = fragment.map(encode_fragment);

    let mut out = String::with_capacity(url.len() + 16);
    out.push_str(scheme);
    out.push_str("://");
    out.push_str(authority);
    out.push_str(&encoded_path);
    if let Some(q) = encoded_query {
        out.push('?');
        out.push_str(&q);
    }
    if let Some(f) = encoded_fragment {
        out.push('#');
        out.push_str(&f);
    }
    Ok(out)
}

/// Normalize a URL string for visited-set membership.
///
/// Assumes a canonicalized input; falls back to returning the input
/// unchanged when it does not parse.
#[must_use]
pub fn normalize_for_dedup(url: &str) -> String {
    let Some((scheme, authority, path, query, _fragment)) = split_url(url) else {
        return url.to_string();
    };

    let scheme = scheme.to_lowercase();
    let authority = authority.to_lowercase();

    let path = if path == "/" {
        "/".to_string()
    } else {
        path.trim_end_matches('/').to_string()
    };

    let sorted_query = query.map(|q| {
        let mut pairs: Vec<(String, String)> = url::form_urlencoded::parse(q.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        pairs.sort();
        let mut ser = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in pairs {
            ser.append_pair(&k, &v);
        }
        ser.finish()
    });

    let mut out = String::with_capacity(url.len());
    out.push_str(&scheme);
    out.push_str("://");
    out.push_str(&authority);
    out.push_str(&path);
    match sorted_query {
        Some(q) if !q.is_empty() => {
            out.push('?');
            out.push_str(&q);
        }
        _ => {}
    }
    out
}

/// Resolve an href against the page's final URL.
///
/// Handles absolute URLs, protocol-relative (`//host/...`), absolute
/// paths, and relative paths. Directory-style base URLs (no extension)
/// get a trailing slash before relative resolution, which is what
/// documentation sites deployed under a subdirectory need.
#[must_use]
pub fn resolve_href(base_url: &str, href: &str) -> String {
    if href.contains("://") {
        return href.to_string();
    }

    let Some((scheme, authority, base_path, _, _)) = split_url(base_url) else {
        return href.to_string();
    };

    if let Some(rest) = href.strip_prefix("//") {
        return format!("{scheme}://{rest}");
    }
    if href.starts_with('/') {
        return format!("{scheme}://{authority}{href}");
    }
    if let Some(fragment) = href.strip_prefix('#') {
        return format!("{base_url}#{fragment}");
    }

    // Directory-style paths resolve relative to themselves, file-style
    // paths relative to their parent
    let dir = if base_path.is_empty() {
        "/".to_string()
    } else if base_path.ends_with('/') {
        base_path.to_string()
    } else if looks_like_file(base_path) {
        match base_path.rfind('/') {
            Some(idx) => base_path[..=idx].to_string(),
            None => "/".to_string(),
        }
    } else {
        format!("{base_path}/")
    };

    let mut segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for part in href.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    let trailing = if href.ends_with('/') && !joined.is_empty() { "/" } else { "" };
    format!("{scheme}://{authority}/{joined}{trailing}")
}

fn looks_like_file(path: &str) -> bool {
    const FILE_EXTENSIONS: &[&str] = &[".html", ".htm", ".php", ".asp", ".aspx", ".jsp", ".shtml"];
    let last = path.rsplit('/').next().unwrap_or("");
    FILE_EXTENSIONS.iter().any(|ext| last.ends_with(ext))
}

/// Percent-encode each path segment unless it already carries escapes.
fn encode_path(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    path.split('/')
        .map(|segment| {
            if segment.is_empty() || already_encoded(segment) {
                segment.to_string()
            } else if segment.chars().all(is_path_safe) {
                segment.to_string()
            } else {
                urlencoding::encode(segment).into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Characters allowed verbatim in a path segment.
fn is_path_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~' | '+' | ',' | ':' | '@' | '!' | '$' | '&' | '\'' | '(' | ')' | '*' | ';' | '=')
}

fn already_encoded(segment: &str) -> bool {
    PERCENT_ESCAPE.is_match(segment)
}

/// Decode and re-encode the query for consistent escaping, preserving
/// parameter order.
fn reencode_query(query: &str) -> String {
    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let mut ser = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in pairs {
        ser.append_pair(&k, &v);
    }
    ser.finish()
}

fn encode_fragment(fragment: &str) -> String {
    if fragment.is_ascii() || already_encoded(fragment) {
        fragment.to_string()
    } else {
        urlencoding::encode(fragment).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_schemeless() {
        assert_eq!(canonicalize(""), Err(UrlError::Empty));
        assert_eq!(canonicalize("   "), Err(UrlError::Empty));
        assert!(matches!(canonicalize("example.com/page"), Err(UrlError::MissingScheme(_))));
        assert!(matches!(canonicalize("http:///path"), Err(UrlError::MissingHost(_))));
    }

    #[test]
    fn encodes_unicode_path_segments() {
        let out = canonicalize("https://zh.wikipedia.org/wiki/中文").unwrap();
        assert_eq!(out, "https://zh.wikipedia.org/wiki/%E4%B8%AD%E6%96%87");
    }

    #[test]
    fn encodes_spaces_without_touching_encoded_segments() {
        let out = canonicalize("https://example.com/path with spaces/%E4%B8%AD").unwrap();
        assert_eq!(out, "https://example.com/path%20with%20spaces/%E4%B8%AD");
    }

    #[test]
    fn idn_host_passes_through() {
        let out = canonicalize("https://例子.测试/path").unwrap();
        assert!(out.starts_with("https://例子.测试/"));
    }

    #[test]
    fn file_urls_unchanged_but_validated() {
        assert_eq!(
            canonicalize("file:///tmp/page.html").unwrap(),
            "file:///tmp/page.html"
        );
        assert!(matches!(canonicalize("file://"), Err(UrlError::EmptyFilePath(_))));
    }

    #[test]
    fn dedup_lowercases_scheme_and_host_only() {
        let out = normalize_for_dedup("HTTP://Example.COM/Some/Path");
        assert_eq!(out, "http://example.com/Some/Path");
    }

    #[test]
    fn dedup_strips_fragment_and_sorts_query() {
        let out = normalize_for_dedup("http://a.com/p?b=2&a=1#section");
        assert_eq!(out, "http://a.com/p?a=1&b=2");
    }

    #[test]
    fn dedup_trailing_slash_removed_except_root() {
        assert_eq!(normalize_for_dedup("http://a.com/dir/"), "http://a.com/dir");
        assert_eq!(normalize_for_dedup("http://a.com/"), "http://a.com/");
    }

    #[test]
    fn resolve_href_forms() {
        let base = "https://docs.example.com/guide/intro";
        assert_eq!(
            resolve_href(base, "https://other.com/x"),
            "https://other.com/x"
        );
        assert_eq!(
            resolve_href(base, "//cdn.example.com/a.js"),
            "https://cdn.example.com/a.js"
        );
        assert_eq!(
            resolve_href(base, "/api/ref"),
            "https://docs.example.com/api/ref"
        );
        // Directory-style base gets a trailing slash before resolution
        assert_eq!(
            resolve_href(base, "setup"),
            "https://docs.example.com/guide/intro/setup"
        );
        // File-style base resolves against its parent
        assert_eq!(
            resolve_href("https://docs.example.com/guide/intro.html", "setup.html"),
            "https://docs.example.com/guide/setup.html"
        );
        assert_eq!(
            resolve_href(base, "../other/page"),
            "https://docs.example.com/guide/other/page"
        );
    }

    #[test]
    fn dedup_is_idempotent_over_canonical_urls() {
        for input in [
            "https://Example.com/Wiki/中文?z=1&a=2#frag",
            "http://a.com/p/",
            "https://b.org/x?q=hello+world",
        ] {
            let canonical = canonicalize(input).unwrap();
            let once = normalize_for_dedup(&canonical);
            assert_eq!(normalize_for_dedup(&once), once, "input {input}");
        }
    }
}
