//! HTML to text, page metadata and link extraction.

use std::collections::BTreeSet;

use reqwest::Url;
use scraper::{ElementRef, Html, Node, Selector};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub language: Option<String>,
}

const SKIPPED_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];
const BLOCK_TAGS: [&str; 16] = [
    "p", "div", "section", "article", "header", "footer", "li", "tr", "br", "h1", "h2", "h3",
    "h4", "h5", "h6", "pre",
];

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Visible text of the document. Blocks are separated by newlines and runs
/// of blank lines collapse to one.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = selector("body")
        .and_then(|body| document.select(&body).next())
        .unwrap_or_else(|| document.root_element());

    let mut raw = String::new();
    collect_text(root, &mut raw);

    let mut out = String::new();
    let mut blank = false;
    for line in raw.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            if !blank && !out.is_empty() {
                out.push('\n');
            }
            blank = true;
            continue;
        }
        out.push_str(&line);
        out.push('\n');
        blank = false;
    }
    out.trim().to_string()
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_TAGS.contains(&name) {
                    continue;
                }
                if let Some(child) = ElementRef::wrap(child) {
                    let block = BLOCK_TAGS.contains(&name);
                    if block {
                        out.push('\n');
                    }
                    collect_text(child, out);
                    if block {
                        out.push('\n');
                    }
                }
            }
            _ => {}
        }
    }
}

pub fn page_metadata(html: &str) -> PageMetadata {
    let document = Html::parse_document(html);

    let title = selector("title")
        .and_then(|s| document.select(&s).next())
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());
    let meta = |name: &str| {
        selector(&format!("meta[name=\"{}\"]", name))
            .and_then(|s| document.select(&s).next())
            .and_then(|el| el.value().attr("content"))
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
    };
    let language = selector("html")
        .and_then(|s| document.select(&s).next())
        .and_then(|el| el.value().attr("lang"))
        .map(str::to_string);

    PageMetadata {
        title,
        description: meta("description"),
        keywords: meta("keywords"),
        language,
    }
}

/// Absolute http(s) links of the page without fragments, deduplicated and
/// sorted.
pub fn extract_links(html: &str, base: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let Some(anchors) = selector("a[href]") else {
        return Vec::new();
    };

    let mut links = BTreeSet::new();
    for anchor in document.select(&anchors) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            continue;
        }
        if let Ok(mut url) = base.join(href) {
            if url.scheme() == "http" || url.scheme() == "https" {
                url.set_fragment(None);
                links.insert(url);
            }
        }
    }
    links.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<!doctype html>
<html lang="en">
<head>
  <title> Rust Notes </title>
  <meta name="description" content="Notes about ownership">
  <meta name="keywords" content="rust, ownership">
  <style>body { color: red; }</style>
</head>
<body>
  <h1>Ownership</h1>
  <p>Each value has   an owner.</p>
  <script>var tracking = 1;</script>
  <ul><li><a href="/borrowing#intro">Borrowing</a></li><li><a href="https://other.org/x">X</a></li></ul>
  <a href="#top">top</a>
  <a href="mailto:me@example.com">mail</a>
</body>
</html>"##;

    #[test]
    fn text_skips_scripts_and_collapses_whitespace() {
        let text = html_to_text(PAGE);
        assert!(text.starts_with("Ownership\n"));
        assert!(text.contains("Each value has an owner."));
        assert!(!text.contains("tracking"));
        assert!(!text.contains("color"));
    }

    #[test]
    fn metadata_reads_head_fields() {
        let meta = page_metadata(PAGE);
        assert_eq!(meta.title.as_deref(), Some("Rust Notes"));
        assert_eq!(meta.description.as_deref(), Some("Notes about ownership"));
        assert_eq!(meta.keywords.as_deref(), Some("rust, ownership"));
        assert_eq!(meta.language.as_deref(), Some("en"));
    }

    #[test]
    fn links_are_absolute_and_fragment_free() {
        let base = Url::parse("https://docs.example.com/guide/").unwrap();
        let links = extract_links(PAGE, &base)
            .into_iter()
            .map(|u| u.to_string())
            .collect::<Vec<_>>();
        assert_eq!(
            links,
            vec![
                "https://docs.example.com/borrowing".to_string(),
                "https://other.org/x".to_string()
            ]
        );
    }
}
