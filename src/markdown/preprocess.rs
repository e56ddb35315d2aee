//! HTML pre-processing ahead of selector extraction and Markdown
//! conversion.
//!
//! Operates on a private copy of the DOM: scripts and styles go, images
//! lazy-loaded through `data-src` become real `src` attributes, every
//! link and image URL is rewritten absolute against the page's final
//! URL, and table cells are massaged so the Markdown table renderer
//! produces one row per row.

use kuchiki::traits::TendrilSink;
use kuchiki::NodeRef;
use log::debug;

use crate::urlnorm::resolve_href;

/// Run the full pre-processing pass and return the rewritten HTML.
#[must_use]
pub fn preprocess_html(html: &str, final_url: &str) -> String {
    let document = kuchiki::parse_html().one(html);

    strip_noise(&document);
    promote_lazy_images(&document);
    absolutize_urls(&document, final_url);
    normalize_tables(&document);

    serialize(&document).unwrap_or_else(|e| {
        debug!("preprocessed DOM serialization failed, keeping original: {e}");
        html.to_string()
    })
}

fn serialize(document: &NodeRef) -> anyhow::Result<String> {
    let mut out = Vec::new();
    document.serialize(&mut out)?;
    Ok(String::from_utf8(out)?)
}

fn collect(document: &NodeRef, selector: &str) -> Vec<kuchiki::NodeDataRef<kuchiki::ElementData>> {
    document
        .select(selector)
        .map(Iterator::collect)
        .unwrap_or_default()
}

fn strip_noise(document: &NodeRef) {
    for node in collect(document, "script, style, noscript") {
        node.as_node().detach();
    }
}

/// Copy `data-src` to `src` on images that have no real source yet.
fn promote_lazy_images(document: &NodeRef) {
    for img in collect(document, "img[data-src]") {
        let mut attrs = img.attributes.borrow_mut();
        let data_src = attrs.get("data-src").map(str::to_string);
        if let Some(data_src) = data_src {
            let missing = attrs.get("src").map_or(true, str::is_empty);
            if missing {
                attrs.insert("src", data_src);
            }
        }
    }
}

/// Rewrite relative `a@href` and `img@src` against the final URL.
fn absolutize_urls(document: &NodeRef, final_url: &str) {
    for (selector, attr) in [("a[href]", "href"), ("img[src]", "src")] {
        for node in collect(document, selector) {
            let mut attrs = node.attributes.borrow_mut();
            let value = attrs.get(attr).map(str::to_string);
            if let Some(value) = value {
                if value.is_empty()
                    || value.starts_with("data:")
                    || value.starts_with("javascript:")
                    || value.starts_with('#')
                {
                    continue;
                }
                let absolute = resolve_href(final_url, &value);
                if absolute != value {
                    attrs.insert(attr, absolute);
                }
            }
        }
    }
}

/// Table fixes for Markdown conversion: `<br>` inside header and data
/// cells becomes a space (a cell must stay on one line), and a cell whose
/// only content is radio/checkbox inputs gets the `[ ]` placeholder.
fn normalize_tables(document: &NodeRef) {
    for br in collect(document, "table th br, table td br") {
        let node = br.as_node();
        node.insert_after(NodeRef::new_text(" "));
        node.detach();
    }

    for td in collect(document, "table td") {
        let has_toggle_input = td
            .as_node()
            .select("input[type=radio], input[type=checkbox]")
            .map(|mut sel| sel.next().is_some())
            .unwrap_or(false);
        if !has_toggle_input {
            continue;
        }
        let text = td.as_node().text_contents();
        if text.replace('\u{a0}', " ").trim().is_empty() {
            let children: Vec<NodeRef> = td.as_node().children().collect();
            for child in children {
                child.detach();
            }
            td.as_node().append(NodeRef::new_text("[ ]"));
        }
    }
}
