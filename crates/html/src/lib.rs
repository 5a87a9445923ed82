//! # HTML Helpers
//!
//! Turns fetched HTML into plain text for summarization and pulls out the
//! links a crawler should follow.

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

/// Tags whose content is never useful as page text.
pub const DEFAULT_STRIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "svg", "iframe", "link", "meta", "nav", "footer",
];

/// Removes the given tags and their content. `None` uses
/// [`DEFAULT_STRIP_TAGS`]; an empty slice leaves the input unchanged.
pub fn clean_html(html: &str, tags: Option<&[&str]>) -> String {
    let tags = tags.unwrap_or(DEFAULT_STRIP_TAGS);
    let mut cleaned = html.to_string();
    for tag in tags {
        let tag = regex::escape(tag);
        // Paired elements first, then any leftover void or unclosed tags.
        let paired = format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>");
        let single = format!(r"(?is)</?{tag}\b[^>]*>");
        for pattern in [paired, single] {
            if let Ok(re) = Regex::new(&pattern) {
                cleaned = re.replace_all(&cleaned, "").into_owned();
            }
        }
    }
    cleaned
}

/// Converts a page to Markdown-flavored text with boilerplate removed.
pub fn html_to_text(html: &str) -> String {
    let cleaned = clean_html(html, None);
    let markdown = html2md::parse_html(&cleaned);
    collapse_blank_lines(&markdown)
}

fn collapse_blank_lines(text: &str) -> String {
    let mut out = Vec::new();
    let mut blank = false;
    for line in text.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            if !blank && !out.is_empty() {
                out.push("");
            }
            blank = true;
        } else {
            out.push(line);
            blank = false;
        }
    }
    while out.last() == Some(&"") {
        out.pop();
    }
    out.join("\n")
}

/// The `<title>` text, if any.
pub fn page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
}

/// Drops the fragment; `page#a` and `page#b` are the same document.
pub fn normalize_url(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

/// Every `http`/`https` link on the page, resolved against `base` and
/// normalized, in document order without duplicates.
pub fn extract_links(html: &str, base: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let mut links: Vec<Url> = Vec::new();
    for href in document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
    {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        let Ok(url) = base.join(href) else { continue };
        if !matches!(url.scheme(), "http" | "https") {
            continue;
        }
        let url = normalize_url(&url);
        if !links.contains(&url) {
            links.push(url);
        }
    }
    links
}
