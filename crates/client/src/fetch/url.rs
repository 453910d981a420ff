//! Page URL canonicalization.
//!
//! Board URLs come from hand-written configuration and are concatenated
//! with page numbers, so they are normalized before every request.

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize a page URL.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Require an http or https scheme
/// 3. Remove fragment (#...)
/// 4. Keep query string intact, since boards page through `?page=N`
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = url::Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_lowercases_host() {
        let url = canonicalize("https://Bar-Face.JP/bbs/index.php?page=10").unwrap();
        assert_eq!(url.host_str(), Some("bar-face.jp"));
    }

    #[test]
    fn test_canonicalize_keeps_page_query() {
        let url = canonicalize("https://barcanelo.com/bbs/index.php?page=20#top").unwrap();
        assert_eq!(url.query(), Some("page=20"));
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_canonicalize_trim_whitespace() {
        let url = canonicalize("  https://rara.jp/bar440/link2  ").unwrap();
        assert_eq!(url.as_str(), "https://rara.jp/bar440/link2");
    }

    #[test]
    fn test_canonicalize_requires_scheme() {
        assert!(matches!(canonicalize("rara.jp/bar440/"), Err(UrlError::InvalidUrl(_))));
    }

    #[test]
    fn test_canonicalize_unsupported_scheme() {
        let result = canonicalize("file:///etc/passwd");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_canonicalize_empty() {
        assert!(matches!(canonicalize("   "), Err(UrlError::Empty)));
    }
}
