//! Deduplication Module
//!
//! Article identity is the canonical URL:
//! - Fragments (#...) removed
//! - Tracking parameters (utm_*, fbclid, etc.) removed
//! - Remaining query parameters sorted
//!
//! Cross-run dedup is a storage existence check on the canonical URL.
//! `SeenUrls` covers repeats between queries of the same run.

use std::collections::HashSet;
use tracing::debug;
use url::Url;

const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "msclkid", "ref", "source", "mc_cid", "mc_eid",
    "_ga", "_gl", "yclid", "twclid", "cmpid", "taid", "mod",
];

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}

/// Normalizes URL to canonical form
///
/// Scheme and host are lowercased by the parser; path case is preserved.
pub fn canonicalize_url(url_str: &str) -> Result<String, url::ParseError> {
    let mut url = Url::parse(url_str.trim())?;

    url.set_fragment(None);

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.set_query(None);
    if !params.is_empty() {
        params.sort();
        url.query_pairs_mut().extend_pairs(params);
    }

    Ok(url.to_string())
}

/// True when the URL points at a site's front page rather than an article
pub fn is_homepage(url: &Url) -> bool {
    matches!(url.path(), "" | "/")
}

/// Reduces an allow-list entry to a bare lowercase domain
///
/// `" WWW.Bloomberg.com. "` becomes `bloomberg.com`; blank entries give `None`.
pub fn normalize_domain(entry: &str) -> Option<String> {
    let domain = entry.trim().trim_end_matches('.').to_ascii_lowercase();
    let domain = domain.strip_prefix("www.").unwrap_or(&domain);
    (!domain.is_empty()).then(|| domain.to_string())
}

/// Normalized allow-list with blanks and duplicates removed, order kept
pub fn normalize_allowed_sources(entries: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .filter_map(|entry| normalize_domain(entry))
        .filter(|domain| seen.insert(domain.clone()))
        .collect()
}

/// Returns the allow-listed domain that `host` belongs to
///
/// Entries are expected in `normalize_allowed_sources` form.
/// `www.cnbc.com` and `cnbc.com` both match `cnbc.com`; `notcnbc.com` does not.
pub fn match_allowed_source<'a>(host: &str, allowed: &'a [String]) -> Option<&'a str> {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    allowed
        .iter()
        .map(|domain| domain.as_str())
        .find(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
}

/// URLs already handled during the current run
#[derive(Debug, Default)]
pub struct SeenUrls {
    seen: HashSet<String>,
}

impl SeenUrls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the URL was already seen, otherwise records it
    pub fn check_and_mark(&mut self, url: &str) -> bool {
        if self.seen.insert(url.to_string()) {
            return false;
        }
        debug!(url = %url, "URL already seen this run");
        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
