//! Charset detection and decoding for fetched byte streams.
//!
//! Chinese news portals and government pages still serve GB-family
//! encodings, often with a missing or lying `Content-Type`. Decoding
//! priority: header charset, then a `<meta>` declaration in the first
//! 8 KiB, then a CJK-aware fallback chain. A candidate decoding is
//! accepted when the label is a GB-family encoding and the text contains
//! at least one Han ideograph, or when the decode produced no replacement
//! characters.

use encoding_rs::Encoding;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::utils::constants::CHARSET_SCAN_WINDOW;

/// Labels tried, in order, when nothing was declared (or the declared
/// charset failed the quality check).
const FALLBACK_CHAIN: &[&str] = &["gb2312", "gbk", "gb18030", "utf-8", "iso-8859-1", "windows-1252"];

static HEADER_CHARSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)charset=["']?([^;"'\s]+)"#).expect("static regex"));

static META_CHARSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([^"'>;\s]+)"#).expect("static regex"));

static META_HTTP_EQUIV: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]+content\s*=\s*["'][^"']*charset=([^"'>;\s]+)"#).expect("static regex")
});

/// A decoded page body plus the label that produced it.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub text: String,
    /// The charset label that was accepted (e.g. "gb2312", "utf-8")
    pub encoding: String,
    /// False when the terminal lossy fallback had to run
    pub clean: bool,
}

/// Decode raw response bytes into a string.
///
/// `content_type` is the raw `Content-Type` header value when available.
#[must_use]
pub fn decode_html(data: &[u8], content_type: Option<&str>) -> Decoded {
    let declared = content_type
        .and_then(charset_from_content_type)
        .or_else(|| charset_from_meta(data));

    if let Some(label) = &declared {
        debug!("declared charset: {label}");
    }

    // Declared charset first, then the fallback chain minus the duplicate
    let mut candidates: Vec<String> = Vec::with_capacity(FALLBACK_CHAIN.len() + 1);
    if let Some(label) = declared {
        candidates.push(label);
    }
    for label in FALLBACK_CHAIN {
        if !candidates.iter().any(|c| c == label) {
            candidates.push((*label).to_string());
        }
    }

    for label in &candidates {
        let Some(encoding) = Encoding::for_label(label.as_bytes()) else {
            debug!("unknown charset label '{label}', skipping");
            continue;
        };
        let (text, _, had_errors) = encoding.decode(data);
        if accept(label, &text, had_errors) {
            return Decoded {
                text: text.into_owned(),
                encoding: label.clone(),
                clean: true,
            };
        }
    }

    warn!("no candidate charset decoded cleanly, falling back to lossy UTF-8");
    Decoded {
        text: String::from_utf8_lossy(data).into_owned(),
        encoding: "utf-8".to_string(),
        clean: false,
    }
}

/// Quality gate for a candidate decoding.
fn accept(label: &str, text: &str, had_errors: bool) -> bool {
    if is_cjk_label(label) {
        // GB-family decoders rarely error on arbitrary bytes; demand
        // evidence the text really is Chinese before trusting them.
        !had_errors && contains_han(text)
    } else {
        !had_errors && !text.contains('\u{FFFD}')
    }
}

fn is_cjk_label(label: &str) -> bool {
    matches!(label, "gb2312" | "gbk" | "gb18030" | "big5")
}

fn contains_han(text: &str) -> bool {
    text.chars().any(|c| ('\u{4e00}'..='\u{9fff}').contains(&c))
}

fn charset_from_content_type(value: &str) -> Option<String> {
    HEADER_CHARSET
        .captures(value)
        .map(|c| c[1].trim_matches(|ch| ch == '"' || ch == '\'').to_lowercase())
}

/// Scan the first 8 KiB for a `<meta charset>` or http-equiv declaration.
fn charset_from_meta(data: &[u8]) -> Option<String> {
    let window = &data[..data.len().min(CHARSET_SCAN_WINDOW)];
    // ASCII-lossy view is enough to spot the declaration
    let sample: String = window
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { ' ' })
        .collect();

    META_CHARSET
        .captures(&sample)
        .or_else(|| META_HTTP_EQUIV.captures(&sample))
        .map(|c| c[1].to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_utf8_round_trips_exactly() {
        let text = "Example Domain — 例子";
        let decoded = decode_html(text.as_bytes(), Some("text/html; charset=utf-8"));
        assert_eq!(decoded.text, text);
        assert_eq!(decoded.encoding, "utf-8");
        assert!(decoded.clean);
    }

    #[test]
    fn header_charset_beats_meta() {
        let body = b"<meta charset=\"iso-8859-1\"><p>plain ascii</p>";
        let decoded = decode_html(body, Some("text/html; charset=utf-8"));
        assert_eq!(decoded.encoding, "utf-8");
    }

    #[test]
    fn meta_declaration_found_in_window() {
        assert_eq!(
            charset_from_meta(b"<html><head><meta charset=gb2312></head>"),
            Some("gb2312".to_string())
        );
        assert_eq!(
            charset_from_meta(
                b"<meta http-equiv=\"Content-Type\" content=\"text/html; charset=GBK\">"
            ),
            Some("gbk".to_string())
        );
    }

    #[test]
    fn gb2312_bytes_decode_to_han() {
        // GB2312 for the ideographs in a party-congress headline
        let (bytes, _, _) = encoding_rs::GBK.encode("十八届中央政治局");
        let mut body = b"<meta charset=gb2312><p>".to_vec();
        body.extend_from_slice(&bytes);
        body.extend_from_slice(b"</p>");

        let decoded = decode_html(&body, None);
        assert!(decoded.text.contains("十八届中央政治局"));
        assert!(!decoded.text.contains('\u{FFFD}'));
        assert_eq!(decoded.encoding, "gb2312");
    }

    #[test]
    fn pure_ascii_with_cjk_declaration_falls_through_to_utf8() {
        let decoded = decode_html(b"hello world", Some("text/html; charset=gb2312"));
        assert_eq!(decoded.encoding, "utf-8");
        assert_eq!(decoded.text, "hello world");
    }

    #[test]
    fn garbage_falls_back_lossy() {
        let decoded = decode_html(&[0xff, 0xfe, 0x80, 0x81, 0xfb], None);
        assert!(!decoded.text.is_empty());
    }
}
