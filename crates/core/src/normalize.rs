use url::{Host, ParseError, Url};

pub const DEFAULT_MAX_URL_LENGTH: usize = 2048;

/// Canonicalize a raw link found on `base` into a fetchable URL, or None
/// for links the crawler will never touch. The output is the comparison
/// key for dedup, so two links to the same page must come out identical.
///
/// Canonical form: lowercase scheme and host, no fragment, no default
/// port, duplicate slashes collapsed, query kept verbatim.
pub fn normalize(base: &Url, raw: &str, max_len: usize) -> Option<Url> {
    let raw = raw.trim();
    let mut url = match Url::parse(raw) {
        Ok(url) => url,
        Err(ParseError::RelativeUrlWithoutBase) => base.join(raw).ok()?,
        Err(_) => return None,
    };

    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    // Raw IP literals are not crawlable hosts.
    match url.host() {
        Some(Host::Domain(host)) if !host.is_empty() => {}
        _ => return None,
    }

    url.set_fragment(None);

    if url.path().is_empty() {
        url.set_path("/");
    } else if url.path().contains("//") {
        let collapsed = collapse_slashes(url.path());
        url.set_path(&collapsed);
    }

    if url.as_str().len() > max_len {
        return None;
    }
    Some(url)
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://example.com/dir/page.html").unwrap()
    }

    fn norm(raw: &str) -> Option<String> {
        normalize(&base(), raw, DEFAULT_MAX_URL_LENGTH).map(|u| u.to_string())
    }

    #[test]
    fn resolves_relative_links() {
        assert_eq!(norm("/a/b"), Some("http://example.com/a/b".into()));
        assert_eq!(norm("sibling"), Some("http://example.com/dir/sibling".into()));
        assert_eq!(
            norm("../up"),
            Some("http://example.com/up".into())
        );
    }

    #[test]
    fn strips_fragment_and_keeps_query() {
        assert_eq!(
            norm("http://a.example/x?q=1&r=2#frag"),
            Some("http://a.example/x?q=1&r=2".into())
        );
        assert_eq!(norm("#frag"), Some("http://example.com/dir/page.html".into()));
    }

    #[test]
    fn lowercases_scheme_and_host() {
        assert_eq!(norm("HTTP://WWW.Example.COM/Path"), Some("http://www.example.com/Path".into()));
    }

    #[test]
    fn drops_default_ports_keeps_others() {
        assert_eq!(norm("http://a.example:80/x"), Some("http://a.example/x".into()));
        assert_eq!(norm("https://a.example:443/x"), Some("https://a.example/x".into()));
        assert_eq!(norm("http://a.example:8080/x"), Some("http://a.example:8080/x".into()));
    }

    #[test]
    fn collapses_duplicate_slashes() {
        assert_eq!(norm("http://a.example//x///y"), Some("http://a.example/x/y".into()));
    }

    #[test]
    fn empty_path_becomes_root() {
        assert_eq!(norm("http://a.example"), Some("http://a.example/".into()));
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert_eq!(norm("mailto:someone@example.com"), None);
        assert_eq!(norm("javascript:void(0)"), None);
        assert_eq!(norm("ftp://a.example/file"), None);
    }

    #[test]
    fn rejects_ip_literals() {
        assert_eq!(norm("http://192.168.0.1/x"), None);
        assert_eq!(norm("http://[2001:db8::1]/x"), None);
    }

    #[test]
    fn rejects_over_length() {
        let long = format!("http://a.example/{}", "x".repeat(DEFAULT_MAX_URL_LENGTH));
        assert_eq!(norm(&long), None);
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in [
            "/a//b/c#frag",
            "HTTP://A.Example:80//x?q=1",
            "rel/path",
            "https://b.example",
        ] {
            let once = normalize(&base(), raw, DEFAULT_MAX_URL_LENGTH).unwrap();
            let twice = normalize(&base(), once.as_str(), DEFAULT_MAX_URL_LENGTH).unwrap();
            assert_eq!(once, twice);
        }
    }
}
