use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

/// Hyperlinks kept for the direct-browse answer.
pub const TOP_LINKS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hyperlink {
    pub text: String,
    pub url: String,
}

impl Hyperlink {
    pub fn new(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: url.into(),
        }
    }
}

/// Every `<a href>` in document order, resolved against `base_url`.
///
/// Anchor text is whitespace-collapsed. Fragment-only, query-only and
/// `javascript:` references are dropped, as are references that cannot be
/// resolved.
pub fn extract_hyperlinks(html: &str, base_url: Option<&str>) -> Vec<Hyperlink> {
    let document = Html::parse_document(html);
    let base = base_url.and_then(|b| Url::parse(b).ok());
    let Ok(anchors) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&anchors)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            let url = resolve_url(href, base.as_ref())?;
            let text = anchor.text().collect::<Vec<_>>().join(" ");
            Some(Hyperlink::new(collapse_whitespace(&text), url))
        })
        .collect()
}

/// Selection policy: absolute http(s) links with anchor text, first occurrence
/// of each URL, document order, at most `limit`.
pub fn select_top_links(links: &[Hyperlink], limit: usize) -> Vec<Hyperlink> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut selected = Vec::new();
    for link in links {
        if selected.len() >= limit {
            break;
        }
        let is_web = link.url.starts_with("http://") || link.url.starts_with("https://");
        if link.text.is_empty() || !is_web || !seen.insert(link.url.as_str()) {
            continue;
        }
        selected.push(link.clone());
    }
    selected
}

/// `"{text} ({url})"` per link.
pub fn format_hyperlinks(links: &[Hyperlink]) -> Vec<String> {
    links
        .iter()
        .map(|link| format!("{} ({})", link.text, link.url))
        .collect()
}

fn resolve_url(reference: &str, base: Option<&Url>) -> Option<String> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with('#') || lower.starts_with('?') || lower.starts_with("javascript:") {
        return None;
    }
    let url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(_) => base?.join(trimmed).ok()?,
    };
    Some(url.into())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
