use scraper::{Html, Selector};
use tracing::trace;
use url::Url;

/// Max bytes to parse. Larger bodies are truncated before parsing.
const MAX_PARSE_SIZE: usize = 5 * 1024 * 1024;

/// Pull the href of every anchor out of an HTML body. Returns raw link
/// strings exactly as written in the page; resolving and normalizing them
/// is the caller's job. Non-HTML bodies and unparseable markup yield an
/// empty list.
pub fn extract_links(base_url: &Url, body: &[u8], content_type: Option<&str>) -> Vec<String> {
    if !is_html(content_type) {
        return Vec::new();
    }
    let Some(anchor) = selector("a[href]") else {
        return Vec::new();
    };
    let body = if body.len() > MAX_PARSE_SIZE {
        &body[..MAX_PARSE_SIZE]
    } else {
        body
    };
    let text = String::from_utf8_lossy(body);
    let document = Html::parse_document(&text);
    let links: Vec<String> = document
        .select(&anchor)
        .filter_map(|el| el.value().attr("href"))
        .map(str::to_string)
        .collect();
    trace!(base = %base_url, count = links.len(), "links extracted");
    links
}

/// An absent header counts as HTML; a present non-HTML type does not.
fn is_html(content_type: Option<&str>) -> bool {
    match content_type {
        Some(ct) => ct.contains("text/html") || ct.contains("application/xhtml+xml"),
        None => true,
    }
}

fn selector(s: &str) -> Option<Selector> {
    Selector::parse(s).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://a.example/").unwrap()
    }

    #[test]
    fn extracts_anchor_hrefs_in_document_order() {
        let body = br#"<html><body>
            <a href="/one">1</a>
            <p><a href="http://b.example/two">2</a></p>
            <a name="no-href">skip</a>
            <a href="three#frag">3</a>
        </body></html>"#;
        let links = extract_links(&base(), body, Some("text/html; charset=utf-8"));
        assert_eq!(links, vec!["/one", "http://b.example/two", "three#frag"]);
    }

    #[test]
    fn non_html_content_types_yield_nothing() {
        let body = br#"<a href="/one">1</a>"#;
        assert!(extract_links(&base(), body, Some("application/json")).is_empty());
        assert!(extract_links(&base(), body, Some("image/png")).is_empty());
        assert!(!extract_links(&base(), body, Some("application/xhtml+xml")).is_empty());
        assert!(!extract_links(&base(), body, None).is_empty());
    }

    #[test]
    fn malformed_html_is_best_effort() {
        let body = br#"<html><body><a href="/ok">ok<div><a href="/also"</a>"#;
        let links = extract_links(&base(), body, Some("text/html"));
        assert!(links.contains(&"/ok".to_string()));
    }

    #[test]
    fn invalid_utf8_does_not_panic() {
        let body = [b'<', b'a', 0xff, 0xfe, b'>'];
        let _ = extract_links(&base(), &body, Some("text/html"));
    }
}
