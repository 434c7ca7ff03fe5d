//! Description and impact backfill through the generative text service.
//!
//! When a record carries no usable impact rating, the model is asked for a
//! one-line description and an impact level. The answer is free text, so it
//! is parsed line by line and anything off-taxonomy is coerced back onto
//! high/medium/low.

use crate::api::{CompletionRequest, TextGenerator};
use crate::models::Impact;
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

pub const FALLBACK_DESCRIPTION: &str = "No description available";
pub const FALLBACK_IMPACT: Impact = Impact::Low;

const SYSTEM_PROMPT: &str = "You are a helpful assistant.";
const MAX_TOKENS: u32 = 100;
const TEMPERATURE: f32 = 0.7;
const TOP_P: f32 = 1.0;

static FIELD_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\W*(description|impact(\s+level)?)\W*:\W*").expect("valid label pattern")
});

/// Generated narrative fields for one record.
#[derive(Debug, Clone, PartialEq)]
pub struct Backfill {
    pub description: String,
    pub impact: Impact,
}

impl Backfill {
    pub fn fallback() -> Self {
        Self {
            description: FALLBACK_DESCRIPTION.to_string(),
            impact: FALLBACK_IMPACT,
        }
    }
}

/// Produces descriptions and impact ratings for records that lack them.
#[derive(Clone)]
pub struct Backfiller {
    generator: Arc<dyn TextGenerator>,
}

impl Backfiller {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Ask the model for a description and impact level.
    ///
    /// Never fails: a service error yields [`Backfill::fallback`].
    #[instrument(level = "info", skip_all, fields(%title))]
    pub async fn generate(&self, title: &str, url: Option<&str>) -> Backfill {
        let t0 = Instant::now();
        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            prompt: build_prompt(title, url),
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            top_p: TOP_P,
        };

        match self.generator.complete(&request).await {
            Ok(text) => {
                info!(
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    response_preview = %truncate_for_log(&text, 200),
                    "Generated description and impact"
                );
                parse_generated(&text)
            }
            Err(e) => {
                error!(
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    error = %e,
                    "Generation failed; using fallback description and impact"
                );
                Backfill::fallback()
            }
        }
    }
}

pub fn build_prompt(title: &str, url: Option<&str>) -> String {
    format!(
        "Generate a description highly relevant and impact level (high, medium, low) for the following:\nTitle: {}\nURL: {}\n",
        title,
        url.unwrap_or("N/A")
    )
}

/// Split a model answer into description and impact.
///
/// The first non-empty line is the description and the second is the impact.
/// A single-line answer becomes the description with a `low` impact.
/// `Description:` / `Impact:` labels (optionally in markdown bold) are
/// stripped in either case, and an impact line naming no known level falls
/// back to `low`.
pub fn parse_generated(text: &str) -> Backfill {
    let trimmed = text.trim();
    let mut lines = trimmed.lines().map(str::trim).filter(|l| !l.is_empty());

    match (lines.next(), lines.next()) {
        (Some(first), Some(second)) => {
            let impact_text = strip_label(second).to_lowercase();
            Backfill {
                description: strip_label(first).to_string(),
                impact: Impact::classify(&impact_text).unwrap_or(FALLBACK_IMPACT),
            }
        }
        _ => Backfill {
            description: strip_label(trimmed).to_string(),
            impact: FALLBACK_IMPACT,
        },
    }
}

fn strip_label(line: &str) -> &str {
    match FIELD_LABEL.find(line) {
        Some(m) => line[m.end()..].trim_end_matches('*').trim(),
        None => line,
    }
}
