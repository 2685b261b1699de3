use url::Url;

/// Canonical form used for dedup and link resolution.
///
/// Lower-cases scheme and host, strips a leading `www.`, drops the fragment,
/// removes trailing slashes (except on the root path) and sorts query pairs.
/// Input that does not parse as an absolute URL is returned unchanged.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut url = match Url::parse(trimmed) {
        Ok(u) => u,
        Err(_) => return raw.to_string(),
    };
    url.set_fragment(None);

    if let Some(bare) = url.host_str().and_then(|h| h.strip_prefix("www.")).map(str::to_string) {
        if !bare.is_empty() {
            let _ = url.set_host(Some(&bare));
        }
    }

    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        pairs.sort();
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        let stripped = path.trim_end_matches('/');
        url.set_path(if stripped.is_empty() { "/" } else { stripped });
    }

    url.to_string()
}

/// Host of a normalized URL, used for the same-domain rule.
pub fn domain_of(normalized: &str) -> Option<String> {
    Url::parse(normalized).ok()?.host_str().map(str::to_string)
}

/// `scheme://host[:port]`, the key robots.txt rules are cached under.
pub fn origin_of(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_www_and_query_order_are_ignored() {
        assert_eq!(
            normalize_url("HTTP://WWW.Example.com/a/?b=2&a=1"),
            normalize_url("http://example.com/a?a=1&b=2")
        );
        assert_eq!(normalize_url("http://example.com/a?a=1&b=2"), "http://example.com/a?a=1&b=2");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in [
            "https://www.Example.org/x/y/#frag",
            "http://example.com",
            "http://example.com/?",
            "https://example.com/search?q=hello world&lang=en",
            "https://example.com:8443/a//",
            "not a url",
        ] {
            let once = normalize_url(raw);
            assert_eq!(normalize_url(&once), once, "not idempotent for {raw}");
        }
    }

    #[test]
    fn root_keeps_its_slash_and_fragment_is_dropped() {
        assert_eq!(normalize_url("http://example.com"), "http://example.com/");
        assert_eq!(normalize_url("http://example.com/#top"), "http://example.com/");
        assert_eq!(normalize_url("http://example.com/docs/#top"), "http://example.com/docs");
    }

    #[test]
    fn malformed_input_is_returned_unchanged() {
        assert_eq!(normalize_url("/relative/path"), "/relative/path");
        assert_eq!(normalize_url("000001.txt"), "000001.txt");
    }

    #[test]
    fn domain_and_origin() {
        assert_eq!(domain_of("http://example.com/a").as_deref(), Some("example.com"));
        let u = Url::parse("http://127.0.0.1:8080/x").unwrap();
        assert_eq!(origin_of(&u).as_deref(), Some("http://127.0.0.1:8080"));
    }
}
