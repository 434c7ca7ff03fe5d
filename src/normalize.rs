//! Field normalization for raw news records.
//!
//! Scrapers for different sites emit different subsets of fields (`link`
//! instead of `url`, no impact, placeholder descriptions...). Normalization
//! fills every gap with a derived or default value, in this order:
//!
//! 1. Date canonicalization
//! 2. Field presence checks (`url` falling back to `link`, title)
//! 3. Impact classification, or generation when no level can be read
//! 4. Description fallback
//! 5. Competitor derivation from the URL
//! 6. Fixed defaults for the remaining fields
//!
//! Values already present are never overwritten. A field counts as absent
//! when it is missing, `null`, or a blank string.

use crate::backfill::Backfiller;
use crate::competitor::extract_competitor;
use crate::models::{
    DEFAULT_ACTIVITY_TYPE, DEFAULT_ESTIMATED_VALUE, DEFAULT_EXCERPT, DEFAULT_IMAGE,
    DEFAULT_REGION, DEFAULT_SECTOR, DEFAULT_TITLE, DESCRIPTION_PLACEHOLDER, Impact, NewsRecord,
    RawRecord, UNKNOWN_COMPETITOR,
};
use crate::utils::canonical_date;
use itertools::Itertools;
use serde_json::Value;
use tracing::{debug, info};

/// Read a scalar field as text. Blank strings, `null`, arrays and objects
/// count as absent.
pub fn text_field(raw: &RawRecord, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// The record's `id` as text: a non-blank string, or a number in its
/// string form. Any other value counts as no id.
pub fn record_id(raw: &RawRecord) -> Option<String> {
    match raw.get("id")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The record's source link: `url`, else `link`.
pub fn resolve_url(raw: &RawRecord) -> Option<String> {
    text_field(raw, "url").or_else(|| text_field(raw, "link"))
}

/// Tags as an ordered, de-duplicated list. Accepts a JSON array or a
/// comma-separated string.
pub fn tags(raw: &RawRecord) -> Vec<String> {
    let items: Vec<String> = match raw.get("tags") {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => s.split(',').map(|t| t.trim().to_string()).collect(),
        _ => Vec::new(),
    };
    items.into_iter().filter(|t| !t.is_empty()).unique().collect()
}

/// Whether a description is the scraper's `**Description:**` marker rather
/// than real text.
pub fn is_placeholder_description(description: &str) -> bool {
    description.trim() == DESCRIPTION_PLACEHOLDER
}

/// Description used when neither the source nor the model supplied one.
pub fn fallback_description(title: &str, url: Option<&str>) -> String {
    format!(
        "The article \"{}\" highlights key developments. Visit {} for more details.",
        title,
        url.unwrap_or("N/A")
    )
}

fn usable_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty() && !is_placeholder_description(d))
}

/// Produce a fully-populated record from a raw one.
///
/// The generative service is consulted only when the record carries no
/// recognizable impact level. The raw record is not modified; see
/// [`NewsRecord::merge_into`] for how the result is written back.
///
/// # Arguments
///
/// * `raw` - The record as stored or scraped, with any subset of fields
/// * `backfiller` - Source of a description and impact when none is usable
///
/// # Returns
///
/// A [`NewsRecord`] with every field populated. `url` is `None` only when the
/// record has neither `url` nor `link`; `id` is `None` when it has no id.
///
/// # Examples
///
/// ```ignore
/// let raw = json!({ "id": "1", "title": "X wins contract", "impact": "High",
///                   "url": "https://www.smec.com/news/1" });
/// let record = normalize_record(raw.as_object().unwrap(), &backfiller).await;
/// assert_eq!(record.competitor, "Smec");
/// assert_eq!(record.region, "N/A");
/// ```
pub async fn normalize_record(raw: &RawRecord, backfiller: &Backfiller) -> NewsRecord {
    let id = record_id(raw);
    let date = canonical_date(&text_field(raw, "date").unwrap_or_default());
    let url = resolve_url(raw);
    let title = text_field(raw, "title").unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let description = usable_description(text_field(raw, "description"));

    let (description, impact) = match text_field(raw, "impact")
        .as_deref()
        .and_then(Impact::classify)
    {
        Some(impact) => (description, impact),
        None => {
            info!(id = ?id, "No impact level; generating description and impact");
            let generated = backfiller.generate(&title, url.as_deref()).await;
            (
                description.or_else(|| usable_description(Some(generated.description))),
                generated.impact,
            )
        }
    };
    let description = description.unwrap_or_else(|| fallback_description(&title, url.as_deref()));

    let competitor = text_field(raw, "competitor")
        .filter(|c| c != UNKNOWN_COMPETITOR)
        .unwrap_or_else(|| extract_competitor(url.as_deref()));

    let or_default = |key: &str, default: &str| text_field(raw, key).unwrap_or_else(|| default.to_string());

    let record = NewsRecord {
        id,
        title,
        date,
        url,
        excerpt: or_default("excerpt", DEFAULT_EXCERPT),
        image: or_default("image", DEFAULT_IMAGE),
        tags: tags(raw),
        activity_type: or_default("activityType", DEFAULT_ACTIVITY_TYPE),
        competitor,
        description,
        region: or_default("region", DEFAULT_REGION),
        sector: or_default("sector", DEFAULT_SECTOR),
        estimated_value: or_default("estimatedValue", DEFAULT_ESTIMATED_VALUE),
        impact,
    };
    debug!(id = ?record.id, competitor = %record.competitor, impact = %record.impact, "Normalized record");
    record
}
