//! HTML parsing capability: page metadata, visible text and outbound links.

use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

/// Maximum characters kept from the paragraph fallback for descriptions.
const DESCRIPTION_CHARS: usize = 200;

lazy_static! {
    static ref SEL_TITLE: Selector = Selector::parse("title").expect("valid selector");
    static ref SEL_H1: Selector = Selector::parse("h1").expect("valid selector");
    static ref SEL_P: Selector = Selector::parse("p").expect("valid selector");
    static ref SEL_BODY: Selector = Selector::parse("body").expect("valid selector");
    static ref SEL_A: Selector = Selector::parse("a[href]").expect("valid selector");
    static ref SEL_META_DESC: Selector = Selector::parse(r#"meta[name="description"]"#).expect("valid selector");
    static ref SEL_META_OG: Selector = Selector::parse(r#"meta[property="og:description"]"#).expect("valid selector");
    static ref SEL_META_TWITTER: Selector = Selector::parse(r#"meta[name="twitter:description"]"#).expect("valid selector");
    static ref SEL_WIKI_BLOCKS: Selector = Selector::parse(
        "#mw-content-text p, #mw-content-text h2, #mw-content-text h3, #mw-content-text li"
    ).expect("valid selector");
}

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template"];
const WIKI_SKIPPED_CLASSES: &[&str] = &["reference", "mw-editsection", "noprint"];

/// Title, first heading and description extracted from a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: String,
    pub h1: String,
    pub description: String,
}

/// Everything the crawler and indexer need from one HTML document.
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    pub metadata: PageMetadata,
    pub visible_text: String,
    /// Absolute http(s) targets of `<a href>` anchors, in document order.
    pub links: Vec<String>,
}

/// Strategy for pulling readable text out of a parsed document.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, document: &Html) -> String;
}

/// All text under `<body>` except script-like elements.
pub struct GenericText;

impl TextExtractor for GenericText {
    fn extract(&self, document: &Html) -> String {
        let mut out = String::new();
        match document.select(&SEL_BODY).next() {
            Some(body) => collect_text(body, &[], &mut out),
            None => collect_text(document.root_element(), &[], &mut out),
        }
        squash_whitespace(&out)
    }
}

/// Article blocks of a MediaWiki page, without citation markers or edit links.
pub struct WikipediaText;

impl TextExtractor for WikipediaText {
    fn extract(&self, document: &Html) -> String {
        let mut blocks = Vec::new();
        for el in document.select(&SEL_WIKI_BLOCKS) {
            let mut block = String::new();
            collect_text(el, WIKI_SKIPPED_CLASSES, &mut block);
            let block = squash_whitespace(&block);
            if !block.is_empty() {
                blocks.push(block);
            }
        }
        if blocks.is_empty() {
            return GenericText.extract(document);
        }
        blocks.join(" ")
    }
}

/// Pick the extraction strategy for a document by its URL.
pub fn extractor_for(url: &str) -> &'static dyn TextExtractor {
    let is_wiki = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.ends_with("wikipedia.org")))
        .unwrap_or(false);
    if is_wiki { &WikipediaText } else { &GenericText }
}

fn collect_text(el: ElementRef<'_>, skip_classes: &[&str], out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(e) => {
                if SKIPPED_TAGS.contains(&e.name()) {
                    continue;
                }
                if e.classes().any(|c| skip_classes.contains(&c)) {
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, skip_classes, out);
                }
            }
            _ => {}
        }
    }
}

fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_text(document: &Html, selector: &Selector) -> String {
    document
        .select(selector)
        .next()
        .map(|n| squash_whitespace(&n.text().collect::<String>()))
        .unwrap_or_default()
}

fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .filter_map(|m| m.value().attr("content"))
        .map(str::trim)
        .find(|c| !c.is_empty())
        .map(str::to_string)
}

/// Description: meta description, then Open Graph, then Twitter card, then
/// the first two paragraphs, and finally the title itself.
fn resolve_description(document: &Html, title: &str) -> String {
    if let Some(d) = meta_content(document, &SEL_META_DESC)
        .or_else(|| meta_content(document, &SEL_META_OG))
        .or_else(|| meta_content(document, &SEL_META_TWITTER))
    {
        return d;
    }
    let paragraphs: Vec<String> = document
        .select(&SEL_P)
        .map(|p| squash_whitespace(&p.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .take(2)
        .collect();
    if !paragraphs.is_empty() {
        let joined = paragraphs.join(" ");
        if joined.chars().count() > DESCRIPTION_CHARS {
            let cut: String = joined.chars().take(DESCRIPTION_CHARS).collect();
            return format!("{cut}…");
        }
        return joined;
    }
    title.to_string()
}

pub fn extract_metadata(document: &Html) -> PageMetadata {
    let title = first_text(document, &SEL_TITLE);
    let h1 = first_text(document, &SEL_H1);
    let description = resolve_description(document, &title);
    PageMetadata { title, h1, description }
}

/// Resolve every anchor against `base`, keeping http(s) targets only.
pub fn extract_links(document: &Html, base: &Url) -> Vec<String> {
    let mut links = Vec::new();
    for a in document.select(&SEL_A) {
        let Some(href) = a.value().attr("href").map(str::trim) else { continue };
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
            || href.starts_with("javascript:")
        {
            continue;
        }
        if let Ok(u) = base.join(href) {
            if matches!(u.scheme(), "http" | "https") {
                links.push(u.to_string());
            }
        }
    }
    links
}

/// Parse a page once and extract metadata, visible text and links.
///
/// `page_url` selects the text strategy and is the base for relative links;
/// when it is not an absolute URL no links are returned.
pub fn parse_page(html: &str, page_url: &str) -> ParsedPage {
    let document = Html::parse_document(html);
    let metadata = extract_metadata(&document);
    let visible_text = extractor_for(page_url).extract(&document);
    let links = match Url::parse(page_url) {
        Ok(base) => extract_links(&document, &base),
        Err(_) => Vec::new(),
    };
    ParsedPage { metadata, visible_text, links }
}

/// Visible text only, for snippet extraction at query time.
pub fn visible_text(html: &str, page_url: &str) -> String {
    let document = Html::parse_document(html);
    extractor_for(page_url).extract(&document)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<html><head><title> Rust  Book </title>
        <meta property="og:description" content="OG text">
        <style>.x { color: red }</style></head>
        <body><h1>Ownership</h1><script>var hidden = 1;</script>
        <p>First para.</p><p>Second para.</p>
        <a href="/next">next</a><a href="#top">top</a><a href="mailto:a@b.c">mail</a>
        <a href="https://other.org/x">ext</a></body></html>"##;

    #[test]
    fn metadata_uses_open_graph_when_meta_description_missing() {
        let page = parse_page(PAGE, "https://example.com/book/");
        assert_eq!(page.metadata.title, "Rust Book");
        assert_eq!(page.metadata.h1, "Ownership");
        assert_eq!(page.metadata.description, "OG text");
    }

    #[test]
    fn description_falls_back_to_paragraphs_then_title() {
        let doc = Html::parse_document("<title>T</title><p>One.</p><p>Two.</p><p>Three.</p>");
        assert_eq!(extract_metadata(&doc).description, "One. Two.");
        let bare = Html::parse_document("<title>Only title</title><div>x</div>");
        assert_eq!(extract_metadata(&bare).description, "Only title");
    }

    #[test]
    fn visible_text_skips_scripts_and_styles() {
        let page = parse_page(PAGE, "https://example.com/book/");
        assert!(page.visible_text.contains("First para."));
        assert!(!page.visible_text.contains("hidden"));
        assert!(!page.visible_text.contains("color"));
    }

    #[test]
    fn links_are_absolute_and_filtered() {
        let page = parse_page(PAGE, "https://example.com/book/");
        assert_eq!(page.links, vec!["https://example.com/next", "https://other.org/x"]);
        assert!(parse_page(PAGE, "000001.txt").links.is_empty());
    }

    #[test]
    fn wikipedia_pages_use_article_blocks() {
        let html = r#"<body><div id="siteNav">Menu junk</div>
            <div id="mw-content-text"><p>Alan Turing<sup class="reference">[1]</sup> was a mathematician.</p>
            <h2>Life<span class="mw-editsection">edit</span></h2></div></body>"#;
        let text = visible_text(html, "https://en.wikipedia.org/wiki/Alan_Turing");
        assert_eq!(text, "Alan Turing was a mathematician. Life");
        let generic = visible_text(html, "https://example.com/");
        assert!(generic.contains("Menu junk"));
    }
}
