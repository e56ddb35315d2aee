//! HTML to Markdown conversion.
//!
//! The conversion itself is htmd with its defaults (links and images
//! kept, no line wrapping); the value added here is the pre-processing
//! that makes hostile real-world HTML convert cleanly and the
//! normalization that keeps the output stable.

pub mod postprocess;
pub mod preprocess;

use anyhow::Context;
use htmd::HtmlToMarkdown;

pub use postprocess::normalize_markdown;
pub use preprocess::preprocess_html;

/// Convert a pre-processed HTML fragment to normalized Markdown.
pub fn convert_to_markdown(html: &str) -> anyhow::Result<String> {
    let converter = HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "noscript"])
        .build();
    let markdown = converter
        .convert(html)
        .context("HTML to Markdown conversion failed")?;
    Ok(normalize_markdown(&markdown))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_and_headings_convert() {
        let md = convert_to_markdown("<h1>Title</h1><p>Hello <b>world</b></p>").unwrap();
        assert!(md.contains("# Title"));
        assert!(md.contains("**world**"));
    }

    #[test]
    fn links_and_images_are_kept() {
        let md = convert_to_markdown(
            r#"<p><a href="https://example.com/x">link</a>
               <img src="https://example.com/p.png" alt="pic"></p>"#,
        )
        .unwrap();
        assert!(md.contains("[link](https://example.com/x)"));
        assert!(md.contains("![pic](https://example.com/p.png)"));
    }

    #[test]
    fn output_is_normalized() {
        let md = convert_to_markdown("<p>a</p><br><br><br><p>b</p>").unwrap();
        assert!(!md.contains("\n\n\n"));
    }
}
