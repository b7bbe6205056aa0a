use url::Url;

/// Check that a URL is an absolute http(s) URL with a host.
///
/// Data, javascript and mailto URLs are rejected up front.
#[must_use]
pub fn is_valid_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }

    if url.starts_with("data:") || url.starts_with("javascript:") || url.starts_with("mailto:") {
        return false;
    }

    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some(),
        Err(_) => false,
    }
}

/// Trim and validate a URL, returning the trimmed form when it is usable.
///
/// The original spelling is kept (no percent-encoding) so that hrefs written
/// into content compare equal to the configured rule URL on later passes.
#[must_use]
pub fn validate_url(url: &str) -> Option<String> {
    let trimmed = url.trim();
    is_valid_url(trimmed).then(|| trimmed.to_string())
}

/// Whether `href` points at the site rooted at `site_url`.
///
/// Relative hrefs (`/path`) count as internal. Absolute hrefs must share the
/// scheme-insensitive host and sit under the site's path, compared by whole
/// segments (`/blogger` is not under `/blog`).
#[must_use]
pub fn is_internal_href(href: &str, site_url: &str) -> bool {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return false;
    }

    if href.starts_with('/') && !href.starts_with("//") {
        return true;
    }

    let Ok(site) = Url::parse(site_url.trim()) else {
        return false;
    };

    let candidate = if href.starts_with("//") {
        Url::parse(&format!("{}:{href}", site.scheme()))
    } else {
        Url::parse(href)
    };

    let Ok(candidate) = candidate else {
        return false;
    };

    if !matches!(candidate.scheme(), "http" | "https") {
        return false;
    }

    let same_host = match (candidate.host_str(), site.host_str()) {
        (Some(a), Some(b)) => strip_www(a).eq_ignore_ascii_case(strip_www(b)),
        _ => false,
    };

    let prefix = site.path().trim_end_matches('/');
    same_host
        && candidate
            .path()
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_keeps_unicode_path() {
        let url = " https://example.com/product-category/أكياس-النيكوتين/ ";
        assert_eq!(
            validate_url(url).as_deref(),
            Some("https://example.com/product-category/أكياس-النيكوتين/")
        );
    }

    #[test]
    fn test_validate_url_rejects_relative_and_scripts() {
        assert_eq!(validate_url("/relative/path"), None);
        assert_eq!(validate_url("javascript:alert(1)"), None);
        assert_eq!(validate_url("ftp://example.com/file"), None);
        assert_eq!(validate_url(""), None);
    }

    #[test]
    fn test_is_internal_href() {
        let site = "https://shop.example.com";
        assert!(is_internal_href("https://shop.example.com/a", site));
        assert!(is_internal_href("http://www.shop.example.com/a", site));
        assert!(is_internal_href("/about", site));
        assert!(is_internal_href("//shop.example.com/x", site));
        assert!(!is_internal_href("https://other.com/a", site));
        assert!(!is_internal_href("#top", site));
        assert!(!is_internal_href("mailto:a@shop.example.com", site));
    }

    #[test]
    fn test_site_path_prefix_matches_whole_segments() {
        let site = "https://shop.example.com/blog/";
        assert!(is_internal_href("https://shop.example.com/blog", site));
        assert!(is_internal_href("https://shop.example.com/blog/post", site));
        assert!(!is_internal_href("https://shop.example.com/blogger", site));
        assert!(!is_internal_href("https://shop.example.com/", site));
    }
}
