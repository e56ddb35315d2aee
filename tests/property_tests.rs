//! Property-based invariants over URL normalization, encoding
//! detection, and Markdown normalization.

use proptest::prelude::*;

use pagemill::encoding::decode_html;
use pagemill::markdown::normalize_markdown;
use pagemill::urlnorm::{canonicalize, normalize_for_dedup};

/// Path segments that survive a URL without being structural.
fn segment_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-zA-Z0-9\u{4e00}-\u{9fa5} ._-]{1,12}").expect("regex strategy")
}

fn query_key_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z]{1,8}").expect("regex strategy")
}

proptest! {
    #[test]
    fn normalize_after_canonicalize_is_idempotent(
        host in proptest::string::string_regex("[a-z]{1,10}\\.(com|cn|org)").unwrap(),
        segments in proptest::collection::vec(segment_strategy(), 0..4),
        query in proptest::collection::vec((query_key_strategy(), query_key_strategy()), 0..3),
    ) {
        let mut url = format!("https://{host}/");
        url.push_str(&segments.join("/"));
        if !query.is_empty() {
            url.push('?');
            url.push_str(
                &query
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join("&"),
            );
        }

        let canonical = canonicalize(&url).unwrap();
        let once = normalize_for_dedup(&canonical);
        let twice = normalize_for_dedup(&once);
        prop_assert_eq!(&once, &twice);
    }

    #[test]
    fn canonicalize_is_stable_on_its_own_output(
        segments in proptest::collection::vec(segment_strategy(), 1..4),
    ) {
        let url = format!("https://example.com/{}", segments.join("/"));
        let once = canonicalize(&url).unwrap();
        let twice = canonicalize(&once).unwrap();
        prop_assert_eq!(&once, &twice);
    }

    #[test]
    fn valid_utf8_round_trips_through_the_detector(
        text in "[a-zA-Z0-9\u{4e00}-\u{9fa5}\u{3000}-\u{303f} .,!?\n]{0,200}",
    ) {
        let decoded = decode_html(text.as_bytes(), Some("text/html; charset=utf-8"));
        prop_assert_eq!(decoded.text, text);
    }

    #[test]
    fn gb_encoded_han_text_survives_detection(
        han in proptest::collection::vec(0x4e00u32..0x9fa5, 1..40),
    ) {
        let text: String = han
            .iter()
            .map(|&c| char::from_u32(c).unwrap())
            .collect();
        let (bytes, _, _) = encoding_rs::GBK.encode(&text);
        let decoded = decode_html(&bytes, Some("text/html; charset=gb2312"));
        prop_assert!(decoded.text.contains(&text));
        let replacement_char = '\u{FFFD}';
        prop_assert!(!decoded.text.contains(replacement_char));
    }

    #[test]
    fn markdown_normalization_is_closed(input in ".{0,400}") {
        let once = normalize_markdown(&input);
        // Idempotent
        prop_assert_eq!(&normalize_markdown(&once), &once);
        // No three consecutive newlines
        prop_assert!(!once.contains("\n\n\n"));
        // No trailing whitespace per line
        for line in once.lines() {
            prop_assert_eq!(line, line.trim_end());
        }
    }
}
