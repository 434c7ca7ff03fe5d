//! Competitor identity derived from a source URL.
//!
//! Competitor press pages live on the competitor's own domain
//! (`https://www.smec.com/news/...`, `https://www.aecom.com/press-releases/...`),
//! so the first domain label is a good display name.

use crate::models::UNKNOWN_COMPETITOR;
use crate::utils::capitalize;
use once_cell::sync::Lazy;
use regex::Regex;

static DOMAIN_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://(?:www\.)?([a-zA-Z0-9-]+)\.").expect("valid domain label pattern")
});

/// Derive a display-cased competitor name from a URL.
///
/// Returns [`UNKNOWN_COMPETITOR`] for a missing or empty URL, for URLs that do
/// not use http(s), and for numeric (IP address) hosts.
pub fn extract_competitor(url: Option<&str>) -> String {
    let Some(url) = url.filter(|u| !u.trim().is_empty()) else {
        return UNKNOWN_COMPETITOR.to_string();
    };

    DOMAIN_LABEL
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|label| label.as_str())
        .filter(|label| !label.chars().all(|c| c.is_ascii_digit()))
        .map(capitalize)
        .unwrap_or_else(|| UNKNOWN_COMPETITOR.to_string())
}
