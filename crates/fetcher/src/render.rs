//! The pure `render(html) -> (text, markdown, links)` function spec.md
//! ascribes to an external "Content Intelligence" collaborator (out of
//! scope at §1, consumed here as a plain function). Grounded on the
//! teacher's `darkscraper-parser::html::parse_html` (selector-driven
//! extraction over a parsed `scraper::Html` document).

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;
use webcascade_core::{DiscoveredApi, RenderedContent, Tier};

static HEADING_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h1,h2,h3,h4,h5,h6").unwrap());
static SEMANTIC_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1,h2,main,article,section,nav,table,ul,ol").unwrap());
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static ALTERNATE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("link[rel=alternate]").unwrap());
static META_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("meta[name], meta[property]").unwrap());

/// Extract a page's title, if any `<title>` element is present.
pub fn extract_title(document: &Html) -> Option<String> {
    document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Does the document contain at least one of the validator's semantic tags,
/// or at least one heading that would produce a markdown heading (spec
/// §4.1's two disjuncts — `HEADING_SELECTOR` covers `h3`-`h6`, which
/// `SEMANTIC_SELECTOR` alone does not)?
pub fn has_semantic_element(document: &Html) -> bool {
    document.select(&SEMANTIC_SELECTOR).next().is_some() || document.select(&HEADING_SELECTOR).next().is_some()
}

/// Render a parsed document into normalized text, a minimal markdown
/// projection, the list of absolute link hrefs, and the heading text
/// (spec §3 FetchResult content, §4.1 "passes DOM to the render function").
pub fn render(document: &Html, base_url: &Url) -> RenderedContent {
    let text = extract_visible_text(document);
    let headings: Vec<String> = document
        .select(&HEADING_SELECTOR)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let markdown = render_markdown(document, &headings);
    let links = extract_links(document, base_url);

    RenderedContent {
        html: None,
        text,
        markdown,
        links,
        headings,
    }
}

fn extract_visible_text(document: &Html) -> String {
    let body_selector = Selector::parse("body").unwrap();
    let scope = document
        .select(&body_selector)
        .next()
        .unwrap_or_else(|| document.root_element());
    normalize_whitespace(&scope.text().collect::<Vec<_>>().join(" "))
}

pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn render_markdown(document: &Html, headings: &[String]) -> String {
    let mut out = String::new();
    for (el, text) in document.select(&HEADING_SELECTOR).zip(headings.iter()) {
        let level = match el.value().name() {
            "h1" => 1,
            "h2" => 2,
            "h3" => 3,
            "h4" => 4,
            "h5" => 5,
            _ => 6,
        };
        out.push_str(&"#".repeat(level));
        out.push(' ');
        out.push_str(text);
        out.push_str("\n\n");
    }
    let paragraph_selector = Selector::parse("p").unwrap();
    for el in document.select(&paragraph_selector) {
        let text = normalize_whitespace(&el.text().collect::<String>());
        if !text.is_empty() {
            out.push_str(&text);
            out.push_str("\n\n");
        }
    }
    out.trim_end().to_string()
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    document
        .select(&LINK_SELECTOR)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| base_url.join(href).ok())
        .map(|u| u.to_string())
        .collect()
}

/// Parse `<link rel="alternate">` and `<meta>` API hints per spec §4.1
/// ("any `<link rel="alternate">`/`<meta>` API hints parsed out of the
/// document"). Only alternate links whose declared type looks like a data
/// feed (JSON/XML/RSS/Atom) are treated as discovered APIs; plain stylesheet
/// or icon `<link>`s never reach this selector.
pub fn extract_discovered_apis(document: &Html, base_url: &Url, tier: Tier) -> Vec<DiscoveredApi> {
    let mut apis = Vec::new();

    for el in document.select(&ALTERNATE_SELECTOR) {
        let content_type = el.value().attr("type").map(str::to_string);
        let looks_like_feed = content_type
            .as_deref()
            .map(|t| {
                let t = t.to_lowercase();
                t.contains("json") || t.contains("xml") || t.contains("rss") || t.contains("atom")
            })
            .unwrap_or(false);
        if !looks_like_feed {
            continue;
        }
        let Some(href) = el.value().attr("href") else { continue };
        let Ok(url) = base_url.join(href) else { continue };
        apis.push(DiscoveredApi {
            method: "GET".to_string(),
            url: url.to_string(),
            status: None,
            content_type,
            observed_during_tier: tier,
        });
    }

    for el in document.select(&META_SELECTOR) {
        let key = el.value().attr("name").or_else(|| el.value().attr("property")).unwrap_or("");
        if !key.eq_ignore_ascii_case("api") && !key.to_lowercase().contains("api-endpoint") {
            continue;
        }
        let Some(content) = el.value().attr("content") else { continue };
        let Ok(url) = base_url.join(content) else { continue };
        apis.push(DiscoveredApi {
            method: "GET".to_string(),
            url: url.to_string(),
            status: None,
            content_type: None,
            observed_during_tier: tier,
        });
    }

    apis
}
