//! URL handling module for Catalog-Sweep
//!
//! This module provides href resolution against a page's base URL, the
//! canonical key used by the visited set, and allowed-domain matching for
//! followed links.

mod matcher;
mod normalize;
mod resolve;

// Re-export main functions
pub use matcher::matches_wildcard;
pub use normalize::visit_key;
pub use resolve::{resolve_href, resolve_src};

use url::Url;

/// Extracts the lowercase host from a URL
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks a URL's host against a list of wildcard domain patterns
///
/// An empty pattern list allows every host.
///
/// # Examples
///
/// ```
/// use catalog_sweep::url::is_allowed_domain;
/// use url::Url;
///
/// let patterns = vec!["hikoco.co.nz".to_string()];
/// let url = Url::parse("https://hikoco.co.nz/collections/abib").unwrap();
/// assert!(is_allowed_domain(&url, &patterns));
///
/// let offsite = Url::parse("https://cdn.shopify.com/s/files/x.jpg").unwrap();
/// assert!(!is_allowed_domain(&offsite, &patterns));
/// ```
pub fn is_allowed_domain(url: &Url, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return true;
    }

    match extract_domain(url) {
        Some(domain) => patterns
            .iter()
            .any(|pattern| matches_wildcard(pattern, &domain)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_extract_domain_lowercases() {
        assert_eq!(
            extract_domain(&url("https://HIKOCO.co.nz/pages/brand")),
            Some("hikoco.co.nz".to_string())
        );
    }

    #[test]
    fn test_empty_patterns_allow_everything() {
        assert!(is_allowed_domain(&url("https://anything.example/"), &[]));
    }

    #[test]
    fn test_wildcard_allows_subdomains() {
        let patterns = vec!["*.hikoco.co.nz".to_string()];
        assert!(is_allowed_domain(&url("https://hikoco.co.nz/"), &patterns));
        assert!(is_allowed_domain(&url("https://www.hikoco.co.nz/"), &patterns));
        assert!(!is_allowed_domain(&url("https://hikoco.com/"), &patterns));
    }

    #[test]
    fn test_exact_pattern_rejects_subdomain() {
        let patterns = vec!["hikoco.co.nz".to_string()];
        assert!(!is_allowed_domain(&url("https://shop.hikoco.co.nz/"), &patterns));
    }

    #[test]
    fn test_ip_host_with_port() {
        let patterns = vec!["127.0.0.1".to_string()];
        assert!(is_allowed_domain(&url("http://127.0.0.1:4455/page"), &patterns));
    }
}
