//! Canonicalize raw sitemap URLs into comparable keys and slug tokens.

use crate::error::{Error, Result};
use url::Url;

/// A URL reduced to its identity, path, and slug tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedUrl {
    /// Scheme, host, and normalized path. Query and fragment are gone.
    pub url: String,
    pub path: String,
    pub tokens: Vec<String>,
    pub depth: usize,
}

/// Normalize a raw URL, or a bare absolute path such as `/features/edit/`.
///
/// Fails only when the input is not a hierarchical URL at all.
pub fn normalize(raw: &str) -> Result<NormalizedUrl> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(malformed(raw, "empty input"));
    }

    match Url::parse(trimmed) {
        Ok(mut parsed) => {
            if parsed.cannot_be_a_base() {
                return Err(malformed(raw, "not a hierarchical URL"));
            }
            let path = normalize_path(parsed.path());
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.set_path(&path);
            Ok(build(parsed.to_string(), path))
        }
        Err(url::ParseError::RelativeUrlWithoutBase) if trimmed.starts_with('/') => {
            let bare = trimmed
                .split(['?', '#'])
                .next()
                .unwrap_or_default();
            let path = normalize_path(bare);
            Ok(build(path.clone(), path))
        }
        Err(e) => Err(malformed(raw, &e.to_string())),
    }
}

/// Collapse repeated slashes and drop the trailing slash. Root stays `/`.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return "/".to_string();
    }
    format!("/{}", segments.join("/"))
}

/// Split every path segment on `-` and `_`, lowercasing the pieces.
///
/// Digits stay attached to their letters, so `v2` is one token.
pub fn tokenize(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|seg| !seg.is_empty())
        .flat_map(|seg| seg.split(['-', '_']))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Count non-empty path segments.
pub fn depth(path: &str) -> usize {
    path.split('/').filter(|s| !s.is_empty()).count()
}

fn build(url: String, path: String) -> NormalizedUrl {
    NormalizedUrl {
        tokens: tokenize(&path),
        depth: depth(&path),
        url,
        path,
    }
}

fn malformed(raw: &str, reason: &str) -> Error {
    Error::MalformedUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_query_fragment_and_trailing_slash() {
        let n = normalize("https://Example.COM/Features/Remove-Background/?utm=1#top").unwrap();
        assert_eq!(n.url, "https://example.com/Features/Remove-Background");
        assert_eq!(n.path, "/Features/Remove-Background");
        assert_eq!(n.tokens, vec!["features", "remove", "background"]);
        assert_eq!(n.depth, 2);
    }

    #[test]
    fn test_root_path_stays_slash() {
        let n = normalize("https://example.com").unwrap();
        assert_eq!(n.path, "/");
        assert_eq!(n.url, "https://example.com/");
        assert!(n.tokens.is_empty());
        assert_eq!(n.depth, 0);
    }

    #[test]
    fn test_collapses_repeated_slashes() {
        let n = normalize("https://example.com//tools///upscale_image//").unwrap();
        assert_eq!(n.path, "/tools/upscale_image");
        assert_eq!(n.tokens, vec!["tools", "upscale", "image"]);
    }

    #[test]
    fn test_digits_stay_in_token() {
        assert_eq!(tokenize("/api/v2/photo-4k"), vec!["api", "v2", "photo", "4k"]);
    }

    #[test]
    fn test_bare_path_is_accepted() {
        let n = normalize("/blog/post-1/?page=2").unwrap();
        assert_eq!(n.url, "/blog/post-1");
        assert_eq!(n.path, "/blog/post-1");
    }

    #[test]
    fn test_identity_ignores_trailing_slash_and_query() {
        let a = normalize("https://example.com/a/").unwrap();
        let b = normalize("https://example.com/a?ref=x").unwrap();
        assert_eq!(a.url, b.url);
    }

    #[test]
    fn test_scheme_is_part_of_identity() {
        let a = normalize("http://example.com/a").unwrap();
        let b = normalize("https://example.com/a").unwrap();
        assert_ne!(a.url, b.url);
        assert_eq!(a.path, b.path);
    }

    #[test]
    fn test_malformed_inputs() {
        assert!(matches!(normalize(""), Err(Error::MalformedUrl { .. })));
        assert!(matches!(
            normalize("not a url"),
            Err(Error::MalformedUrl { .. })
        ));
        assert!(matches!(
            normalize("mailto:someone@example.com"),
            Err(Error::MalformedUrl { .. })
        ));
        assert!(matches!(
            normalize("https://exa mple.com/x"),
            Err(Error::MalformedUrl { .. })
        ));
    }
}
