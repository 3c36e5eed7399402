use url::Url;

/// Normalizes a URL so equivalent spellings share one frontier key
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Lowercase the host (the parser also drops default ports)
/// 3. Normalize path:
///    - Remove dot segments and empty segments
///    - Remove trailing slash (except for root /)
///    - Empty path becomes /
/// 4. Remove fragment (everything after #)
/// 5. Remove empty query string (trailing ?)
///
/// The scheme is not rewritten and `www.` is kept: the normalized URL is
/// the URL that gets fetched.
///
/// # Examples
///
/// ```
/// use sitechunk::url::normalize_url;
///
/// let url = normalize_url("https://EXAMPLE.com/docs/#intro").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/docs");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, url::ParseError> {
    let url = Url::parse(url_str.trim())?;
    Ok(normalize_parsed(url))
}

/// Applies the normalization steps to an already parsed URL
pub fn normalize_parsed(mut url: Url) -> Url {
    if let Some(host) = url.host_str() {
        let lowered = host.to_lowercase();
        if lowered != host {
            // Lowercasing a valid host never makes it invalid
            let _ = url.set_host(Some(&lowered));
        }
    }

    if !url.cannot_be_a_base() {
        let normalized_path = normalize_path(url.path());
        url.set_path(&normalized_path);
    }

    url.set_fragment(None);

    if url.query() == Some("") {
        url.set_query(None);
    }

    url
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_host() {
        let url = normalize_url("https://EXAMPLE.COM/Page").unwrap();
        // Path case is preserved
        assert_eq!(url.as_str(), "https://example.com/Page");
    }

    #[test]
    fn test_remove_fragment() {
        let url = normalize_url("https://example.com/page#section").unwrap();
        assert_eq!(url.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_trailing_slash_variants_match() {
        let a = normalize_url("https://example.com/docs/").unwrap();
        let b = normalize_url("https://example.com/docs").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_root_keeps_slash() {
        assert_eq!(
            normalize_url("https://example.com").unwrap().as_str(),
            "https://example.com/"
        );
        assert_eq!(
            normalize_url("https://example.com/").unwrap().as_str(),
            "https://example.com/"
        );
    }

    #[test]
    fn test_dot_segments_and_double_slashes() {
        let url = normalize_url("https://example.com/a/./b/../c//d/").unwrap();
        assert_eq!(url.as_str(), "https://example.com/a/c/d");
    }

    #[test]
    fn test_default_port_dropped() {
        let url = normalize_url("https://example.com:443/page").unwrap();
        assert_eq!(url.as_str(), "https://example.com/page");

        let url = normalize_url("http://example.com:8080/page").unwrap();
        assert_eq!(url.as_str(), "http://example.com:8080/page");
    }

    #[test]
    fn test_query_preserved_empty_query_removed() {
        let url = normalize_url("https://example.com/search?q=rust&page=2").unwrap();
        assert_eq!(url.as_str(), "https://example.com/search?q=rust&page=2");

        let url = normalize_url("https://example.com/page?").unwrap();
        assert_eq!(url.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_scheme_and_www_untouched() {
        let url = normalize_url("http://www.example.com/").unwrap();
        assert_eq!(url.as_str(), "http://www.example.com/");
    }

    #[test]
    fn test_malformed_url() {
        assert!(normalize_url("not a url").is_err());
        assert!(normalize_url("https://").is_err());
    }
}
