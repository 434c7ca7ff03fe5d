//! Data model for competitor and market news records.
//!
//! Records enter the system as loosely-typed JSON maps ([`RawRecord`]) coming
//! from scrapers or manual uploads, with any subset of fields populated. The
//! normalizer turns them into a [`NewsRecord`], which is also the projection
//! returned to dashboard clients.
//!
//! Field names are camelCase on the wire to match the stored documents.

use crate::utils::parse_lenient_date;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A record as stored or scraped, before normalization.
pub type RawRecord = Map<String, Value>;

/// Competitor sentinel meaning "not yet derived".
pub const UNKNOWN_COMPETITOR: &str = "Unknown Competitor";
/// Marker some scraped descriptions carry instead of text.
pub const DESCRIPTION_PLACEHOLDER: &str = "**Description:**";

pub const DEFAULT_TITLE: &str = "No Title";
pub const DEFAULT_ACTIVITY_TYPE: &str = "General Activity";
pub const DEFAULT_REGION: &str = "N/A";
pub const DEFAULT_SECTOR: &str = "N/A";
pub const DEFAULT_ESTIMATED_VALUE: &str = "Not Available";
pub const DEFAULT_EXCERPT: &str = "No excerpt available.";
pub const DEFAULT_IMAGE: &str = "https://via.placeholder.com/150";

/// Coarse relevance rating of a news item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    High,
    Medium,
    Low,
}

impl Impact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::High => "high",
            Impact::Medium => "medium",
            Impact::Low => "low",
        }
    }

    /// Classify free text by case-insensitive keyword containment.
    ///
    /// Keywords are checked in the order high, medium, low, so text
    /// mentioning several levels (e.g. `"medium-high"`) resolves to the
    /// highest one.
    pub fn classify(text: &str) -> Option<Impact> {
        let lowered = text.to_lowercase();
        [Impact::High, Impact::Medium, Impact::Low]
            .into_iter()
            .find(|level| lowered.contains(level.as_str()))
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully normalized news record.
///
/// Every field is populated after normalization; `url` stays `None` only
/// when the source provided neither `url` nor `link`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsRecord {
    pub id: Option<String>,
    pub title: String,
    pub date: String,
    pub url: Option<String>,
    pub excerpt: String,
    pub image: String,
    pub tags: Vec<String>,
    pub activity_type: String,
    pub competitor: String,
    pub description: String,
    pub region: String,
    pub sector: String,
    pub estimated_value: String,
    pub impact: Impact,
}

impl NewsRecord {
    /// Fill the stored document from the normalized fields.
    ///
    /// Only absent fields are written (missing, `null` or blank). A few
    /// values are rewritten even when present:
    ///
    /// * `id` - a non-string id is stored in its string form
    /// * `date` - rewritten as `YYYY-MM-DD` when it parsed; never written empty
    /// * `impact` - always stored as one of `high`, `medium`, `low`
    /// * `description` - replaced when it is the placeholder marker
    /// * `competitor` - replaced when it is the unknown-competitor sentinel
    ///
    /// Keys this model does not know about (`link`, store system properties,
    /// scraper extras) are left untouched.
    pub fn merge_into(&self, raw: &mut RawRecord) {
        if let Some(id) = &self.id {
            if !matches!(raw.get("id"), Some(Value::String(_))) {
                raw.insert("id".into(), Value::String(id.clone()));
            }
        }
        if let Some(url) = &self.url {
            fill_absent(raw, "url", url);
        }
        if parse_lenient_date(&self.date).is_some() {
            raw.insert("date".into(), Value::String(self.date.clone()));
        }

        let defaults = [
            ("title", &self.title),
            ("excerpt", &self.excerpt),
            ("image", &self.image),
            ("activityType", &self.activity_type),
            ("region", &self.region),
            ("sector", &self.sector),
            ("estimatedValue", &self.estimated_value),
        ];
        for (key, value) in defaults {
            fill_absent(raw, key, value);
        }

        let stale_description = match raw.get("description") {
            Some(Value::String(s)) => s.trim() == DESCRIPTION_PLACEHOLDER,
            _ => false,
        };
        if stale_description {
            raw.remove("description");
        }
        fill_absent(raw, "description", &self.description);

        let stale_competitor = matches!(
            raw.get("competitor"),
            Some(Value::String(s)) if s.trim() == UNKNOWN_COMPETITOR
        );
        if stale_competitor {
            raw.remove("competitor");
        }
        fill_absent(raw, "competitor", &self.competitor);

        raw.insert(
            "impact".into(),
            Value::String(self.impact.as_str().to_string()),
        );

        let tags_absent = match raw.get("tags") {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        };
        if tags_absent {
            raw.insert(
                "tags".into(),
                Value::Array(self.tags.iter().cloned().map(Value::String).collect()),
            );
        }
    }
}

/// Whether `key` holds a usable scalar: a non-blank string, number or bool.
fn has_value(raw: &RawRecord, key: &str) -> bool {
    match raw.get(key) {
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Number(_) | Value::Bool(_)) => true,
        _ => false,
    }
}

fn fill_absent(raw: &mut RawRecord, key: &str, value: &str) {
    if !has_value(raw, key) {
        raw.insert(key.into(), Value::String(value.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> NewsRecord {
        NewsRecord {
            id: Some("42".to_string()),
            title: "Arup wins rail design".to_string(),
            date: "2025-03-14".to_string(),
            url: Some("https://www.arup.com/news/rail".to_string()),
            excerpt: DEFAULT_EXCERPT.to_string(),
            image: DEFAULT_IMAGE.to_string(),
            tags: vec!["rail".to_string()],
            activity_type: DEFAULT_ACTIVITY_TYPE.to_string(),
            competitor: "Arup".to_string(),
            description: "Arup will design the new line.".to_string(),
            region: DEFAULT_REGION.to_string(),
            sector: DEFAULT_SECTOR.to_string(),
            estimated_value: DEFAULT_ESTIMATED_VALUE.to_string(),
            impact: Impact::Medium,
        }
    }

    #[test]
    fn test_impact_priority_order() {
        assert_eq!(Impact::classify("mediumHigh risk"), Some(Impact::High));
        assert_eq!(Impact::classify("medium-low"), Some(Impact::Medium));
        assert_eq!(Impact::classify("LOW"), Some(Impact::Low));
        assert_eq!(Impact::classify("Impact Level: High"), Some(Impact::High));
        assert_eq!(Impact::classify("severe"), None);
        assert_eq!(Impact::classify(""), None);
    }

    #[test]
    fn test_impact_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Impact::High).unwrap(), json!("high"));
        let parsed: Impact = serde_json::from_value(json!("low")).unwrap();
        assert_eq!(parsed, Impact::Low);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["activityType"], "General Activity");
        assert_eq!(value["estimatedValue"], "Not Available");
        assert_eq!(value["impact"], "medium");
        assert!(value.get("activity_type").is_none());
    }

    #[test]
    fn test_merge_preserves_unknown_fields() {
        let mut raw = json!({
            "id": "42",
            "link": "https://www.arup.com/news/rail",
            "_etag": "\"0000\"",
            "title": "Arup wins rail design"
        })
        .as_object()
        .cloned()
        .unwrap();

        sample().merge_into(&mut raw);

        assert_eq!(raw["link"], "https://www.arup.com/news/rail");
        assert_eq!(raw["_etag"], "\"0000\"");
        assert_eq!(raw["competitor"], "Arup");
        assert_eq!(raw["impact"], "medium");
        assert_eq!(raw["tags"], json!(["rail"]));
        assert_eq!(raw["url"], "https://www.arup.com/news/rail");
    }

    #[test]
    fn test_merge_keeps_present_fields_verbatim() {
        let mut raw = json!({
            "id": "42",
            "title": "Original headline",
            "date": "March 14, 2025",
            "tags": "Energy, Transport",
            "region": "EMEA",
            "description": "  Scraped summary.  ",
            "competitor": "Arup Group",
            "impact": "High"
        })
        .as_object()
        .cloned()
        .unwrap();

        sample().merge_into(&mut raw);

        assert_eq!(raw["title"], "Original headline");
        assert_eq!(raw["date"], "2025-03-14");
        assert_eq!(raw["tags"], "Energy, Transport");
        assert_eq!(raw["region"], "EMEA");
        assert_eq!(raw["description"], "  Scraped summary.  ");
        assert_eq!(raw["competitor"], "Arup Group");
        assert_eq!(raw["impact"], "medium");
        assert_eq!(raw["sector"], "N/A");
    }

    #[test]
    fn test_merge_replaces_placeholders_and_numeric_id() {
        let mut raw = json!({
            "id": 42,
            "description": "**Description:**",
            "competitor": "Unknown Competitor"
        })
        .as_object()
        .cloned()
        .unwrap();

        sample().merge_into(&mut raw);

        assert_eq!(raw["id"], "42");
        assert_eq!(raw["description"], "Arup will design the new line.");
        assert_eq!(raw["competitor"], "Arup");
    }

    #[test]
    fn test_merge_never_writes_unparsed_or_empty_date() {
        let mut record = sample();
        record.date = String::new();
        let mut raw = RawRecord::new();
        record.merge_into(&mut raw);
        assert!(!raw.contains_key("date"));

        record.date = "Unknown".to_string();
        let mut raw = json!({ "date": "Unknown" }).as_object().cloned().unwrap();
        record.merge_into(&mut raw);
        assert_eq!(raw["date"], "Unknown");
    }

    #[test]
    fn test_merge_skips_absent_id_and_url() {
        let mut record = sample();
        record.id = None;
        record.url = None;
        let mut raw = RawRecord::new();

        record.merge_into(&mut raw);

        assert!(!raw.contains_key("id"));
        assert!(!raw.contains_key("url"));
        assert_eq!(raw["title"], "Arup wins rail design");
    }
}
