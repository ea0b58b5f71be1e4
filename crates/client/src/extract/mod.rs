//! Page metadata extraction.
//!
//! ### Recognized Tags
//! - `<meta property="og:*">` and `<meta property="fb:*">`
//! - `<meta name="twitter:*">` and `<meta name="description">`
//! - the first `<title>`, text kept verbatim
//! - `<link rel="icon">` and `<link rel="apple-touch-icon">`
//!
//! Tags are visited in document order and the first occurrence of a key wins.
//!
//! ### Tolerance
//! Parsing never fails. html5ever builds a best-effort tree from malformed
//! markup (missing closing tags, stray elements); anything it cannot recover
//! simply yields absent keys.

pub mod entities;
pub mod links;

pub use entities::encode_numeric_entities;
pub use links::{origin_prefix, resolve_icon_href};

use std::collections::BTreeMap;

use scraper::{Html, Selector};

/// `rel` values recognized as site icons.
const ICON_RELS: [&str; 2] = ["icon", "apple-touch-icon"];

/// Extract recognized metadata from an HTML document.
///
/// `source_url` is the URL the document was requested from; root-relative
/// icon links are resolved against it.
pub fn extract(html: &str, source_url: &str) -> BTreeMap<String, String> {
    let document = Html::parse_document(html);
    let mut values = BTreeMap::new();

    let meta = Selector::parse("meta").expect("invalid selector");
    for element in document.select(&meta) {
        let element = element.value();
        let content = element.attr("content").unwrap_or("");

        if let Some(property) = element.attr("property")
            && (property.starts_with("og:") || property.starts_with("fb:"))
        {
            insert_first(&mut values, property, content);
        }

        if let Some(name) = element.attr("name")
            && (name.starts_with("twitter:") || name == "description")
        {
            insert_first(&mut values, name, content);
        }
    }

    let title = Selector::parse("title").expect("invalid selector");
    if let Some(element) = document.select(&title).next() {
        let text = element.text().collect::<String>();
        insert_first(&mut values, "title", &text);
    }

    let link = Selector::parse("link[rel]").expect("invalid selector");
    for element in document.select(&link) {
        let element = element.value();
        let (Some(rel), Some(href)) = (element.attr("rel"), element.attr("href")) else {
            continue;
        };

        let rel = rel.trim().to_ascii_lowercase();
        if ICON_RELS.contains(&rel.as_str()) {
            insert_first(&mut values, &rel, &resolve_icon_href(href, source_url));
        }
    }

    values
}

fn insert_first(values: &mut BTreeMap<String, String>, key: &str, value: &str) {
    if !values.contains_key(key) {
        values.insert(key.to_string(), value.to_string());
    }
}
