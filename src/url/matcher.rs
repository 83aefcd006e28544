/// Checks if a domain matches a wildcard pattern
///
/// Two kinds of patterns are supported:
/// 1. Exact: "hikoco.co.nz" matches only "hikoco.co.nz"
/// 2. Wildcard: "*.hikoco.co.nz" matches the bare domain and any subdomain
///
/// Patterns are compared case-insensitively; candidates are expected lowercase.
///
/// # Examples
///
/// ```
/// use catalog_sweep::url::matches_wildcard;
///
/// assert!(matches_wildcard("hikoco.co.nz", "hikoco.co.nz"));
/// assert!(!matches_wildcard("hikoco.co.nz", "cdn.hikoco.co.nz"));
///
/// assert!(matches_wildcard("*.hikoco.co.nz", "hikoco.co.nz"));
/// assert!(matches_wildcard("*.hikoco.co.nz", "cdn.hikoco.co.nz"));
/// assert!(!matches_wildcard("*.hikoco.co.nz", "nothikoco.co.nz"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || candidate
                    .strip_suffix(base)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        }
        None => candidate == pattern,
    }
}
