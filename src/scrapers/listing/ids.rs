//! Listing identifiers and URLs.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Job id inside a listing URL: `/jobs/view/<id>` or `?currentJobId=<id>`.
static URL_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"/jobs/view/(?:[^/?#]*-)?(\d+)").unwrap(),
        Regex::new(r"[?&]currentJobId=(\d+)").unwrap(),
    ]
});

/// Job id inside an entity URN such as `urn:li:fsd_jobPosting:3901234567`.
static URN_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)jobposting:(\d+)").unwrap());

/// Extract a job id from a listing URL.
pub fn listing_id_from_url(url: &str) -> Option<String> {
    URL_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(url))
        .map(|caps| caps[1].to_string())
}

/// Normalize a raw per-item attribute value into a listing id.
///
/// Accepts bare numeric ids, URNs and listing URLs.
pub fn normalize_id(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.chars().all(|c| c.is_ascii_digit()) {
        return Some(raw.to_string());
    }
    if let Some(caps) = URN_ID.captures(raw) {
        return Some(caps[1].to_string());
    }
    listing_id_from_url(raw)
}

/// Resolve a possibly relative href against the site's base URL.
pub fn absolutize(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    if let Ok(url) = Url::parse(href) {
        return Some(url.to_string());
    }
    Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .ok()
}

/// Canonical listing URL for an id, without tracking parameters.
pub fn canonical_listing_url(base: &str, id: &str) -> String {
    format!("{}/jobs/view/{}/", base.trim_end_matches('/'), id)
}
