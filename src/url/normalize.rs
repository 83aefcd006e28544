use url::Url;

/// Query parameters that never change which page is served
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "_pos", "_sid", "_ss"];

/// Builds the canonical key a URL is recorded under in the visited set
///
/// Two URLs with the same key are treated as the same page:
///
/// 1. The fragment is removed
/// 2. Tracking parameters (`utm_*`, click ids, storefront search tokens) are removed
/// 3. Remaining query parameters are sorted by key
/// 4. An empty query string is dropped
/// 5. A trailing slash is removed (except for the root path)
///
/// Scheme and host are kept as parsed, so `http` and `https` variants of a
/// page are distinct keys.
///
/// # Examples
///
/// ```
/// use catalog_sweep::url::visit_key;
/// use url::Url;
///
/// let a = Url::parse("https://hikoco.co.nz/collections/abib?page=2#top").unwrap();
/// let b = Url::parse("https://hikoco.co.nz/collections/abib/?utm_source=x&page=2").unwrap();
/// assert_eq!(visit_key(&a), visit_key(&b));
/// ```
pub fn visit_key(url: &Url) -> String {
    let mut key = url.clone();
    key.set_fragment(None);

    if key.query().is_some() {
        let params = filter_and_sort_query_params(&key);
        if params.is_empty() {
            key.set_query(None);
        } else {
            key.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    let path = key.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/').to_string();
        key.set_path(if trimmed.is_empty() { "/" } else { &trimmed });
    }

    key.to_string()
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    params.sort();
    params
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}
