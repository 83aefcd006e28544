use url::Url;

/// Resolves an `href`-like value against the page's base URL
///
/// Returns None when the value does not name a fetchable page:
/// - empty values
/// - `javascript:`, `mailto:`, `tel:` and `data:` schemes
/// - fragment-only links (same-page anchors)
/// - values that fail to join, or join to a non-HTTP(S) URL
///
/// Already-absolute values are returned as parsed, so resolution matches
/// standard base-URL joining in every case.
///
/// # Examples
///
/// ```
/// use catalog_sweep::url::resolve_href;
/// use url::Url;
///
/// let base = Url::parse("https://hikoco.co.nz/collections/abib").unwrap();
/// assert_eq!(
///     resolve_href("/products/toner", &base).as_deref(),
///     Some("https://hikoco.co.nz/products/toner")
/// );
/// assert_eq!(resolve_href("#top", &base), None);
/// ```
pub fn resolve_href(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    if absolute.scheme() == "http" || absolute.scheme() == "https" {
        Some(absolute.to_string())
    } else {
        None
    }
}

/// Resolves an image source attribute against the page's base URL
///
/// `srcset` values contribute their first candidate URL. Inline `data:`
/// images are returned unchanged; anything that cannot be joined is
/// returned as written.
pub fn resolve_src(value: &str, base_url: &Url) -> Option<String> {
    let first = first_srcset_candidate(value)?;

    if first.to_ascii_lowercase().starts_with("data:") {
        return Some(first.to_string());
    }

    Some(
        base_url
            .join(first)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| first.to_string()),
    )
}

/// Returns the URL of the first candidate in a `srcset`-style value
///
/// A plain `src` value is its own single candidate.
fn first_srcset_candidate(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    // Inline data URIs contain commas and must not be split
    if value.to_ascii_lowercase().starts_with("data:") {
        return Some(value);
    }

    value
        .split(',')
        .map(str::trim)
        .find(|candidate| !candidate.is_empty())
        .and_then(|candidate| candidate.split_whitespace().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://hikoco.co.nz/collections/abib?page=2").unwrap()
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            resolve_href("abib-toner", &base_url()).as_deref(),
            Some("https://hikoco.co.nz/collections/abib-toner")
        );
    }

    #[test]
    fn test_root_relative_path() {
        assert_eq!(
            resolve_href("/collections/abib?page=3", &base_url()).as_deref(),
            Some("https://hikoco.co.nz/collections/abib?page=3")
        );
    }

    #[test]
    fn test_query_only_href() {
        assert_eq!(
            resolve_href("?page=3", &base_url()).as_deref(),
            Some("https://hikoco.co.nz/collections/abib?page=3")
        );
    }

    #[test]
    fn test_absolute_unchanged() {
        let href = "https://other.example/products/cream";
        assert_eq!(resolve_href(href, &base_url()).as_deref(), Some(href));
    }

    #[test]
    fn test_matches_standard_join() {
        for href in ["../a", "./b/c", "/d?e=f", "//cdn.example/g"] {
            assert_eq!(
                resolve_href(href, &base_url()),
                Some(base_url().join(href).unwrap().to_string())
            );
        }
    }

    #[test]
    fn test_special_schemes_rejected() {
        for href in ["javascript:void(0)", "mailto:a@b.nz", "tel:+64", "data:text/html,x", "#x", "  "] {
            assert_eq!(resolve_href(href, &base_url()), None, "{href}");
        }
    }

    #[test]
    fn test_protocol_relative_image() {
        assert_eq!(
            resolve_src("//hikoco.co.nz/cdn/shop/files/toner.jpg?v=1", &base_url()).as_deref(),
            Some("https://hikoco.co.nz/cdn/shop/files/toner.jpg?v=1")
        );
    }

    #[test]
    fn test_srcset_first_candidate() {
        let srcset = "//cdn.example/a_180x.jpg 180w, //cdn.example/a_360x.jpg 360w";
        assert_eq!(
            resolve_src(srcset, &base_url()).as_deref(),
            Some("https://cdn.example/a_180x.jpg")
        );
    }

    #[test]
    fn test_data_uri_image_kept() {
        let src = "data:image/gif;base64,R0lGODlhAQABAAAAACw=";
        assert_eq!(resolve_src(src, &base_url()).as_deref(), Some(src));
    }

    #[test]
    fn test_empty_src() {
        assert_eq!(resolve_src("   ", &base_url()), None);
    }
}
