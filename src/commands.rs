//! Batch drivers invoked from the command line.
//!
//! - [`backfill`]: normalize every stored record, one at a time
//! - [`ingest`]: load scraper output from a JSON file into the store
//! - [`missing_fields`]: report stored records lacking description or impact
//!
//! A failing record is logged and counted; it never stops the batch.

use crate::models::RawRecord;
use crate::normalize::{record_id, text_field};
use crate::pipeline::Pipeline;
use crate::store::NewsStore;
use serde_json::Value;
use std::error::Error;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

pub const MISSING_FIELDS_QUERY: &str = "SELECT c.id, c.title, c.description, c.impact FROM c \
     WHERE IS_DEFINED(c.description) = false OR IS_DEFINED(c.impact) = false";

/// Per-run counts.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub stored: usize,
    pub failed: usize,
}

/// Re-normalize every record in the store, strictly sequentially.
///
/// Each record goes through [`Pipeline::normalize`], so each gets exactly one
/// upsert. A record that fails to store is counted and the batch moves on.
///
/// # Arguments
///
/// * `store` - Source of the records to backfill
/// * `pipeline` - Normalizes each record and writes it back
///
/// # Returns
///
/// Per-run counts, or an error if the records could not be read at all.
///
/// # Examples
///
/// ```ignore
/// let pipeline = Pipeline::new(store.clone(), generator);
/// let summary = backfill(store.as_ref(), &pipeline).await?;
/// info!(failed = summary.failed, "done");
/// ```
#[instrument(level = "info", skip_all)]
pub async fn backfill(store: &dyn NewsStore, pipeline: &Pipeline) -> Result<BatchSummary, Box<dyn Error>> {
    let t0 = Instant::now();
    info!("Starting backfill process");

    let records = store.read_all().await.map_err(|e| {
        error!(error = %e, "Error reading records for backfill");
        e
    })?;
    info!(count = records.len(), "Fetched records for backfilling");

    let mut summary = BatchSummary {
        total: records.len(),
        ..BatchSummary::default()
    };
    for record in records {
        let outcome = pipeline.normalize(record).await;
        debug!(
            id = ?outcome.record.id,
            competitor = %outcome.record.competitor,
            impact = %outcome.record.impact,
            "Record normalized"
        );
        if outcome.is_stored() {
            summary.stored += 1;
        } else {
            summary.failed += 1;
        }
    }

    info!(
        total = summary.total,
        stored = summary.stored,
        failed = summary.failed,
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Backfill process completed"
    );
    Ok(summary)
}

/// Load a JSON array of raw records and write them to the store.
///
/// Records without an `id` get a fresh UUID; numeric ids are stored as
/// strings. With a pipeline, each record is
/// normalized before it is stored; without one it is stored verbatim.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ingest(
    path: &Path,
    store: &dyn NewsStore,
    pipeline: Option<&Pipeline>,
) -> Result<BatchSummary, Box<dyn Error>> {
    let content = tokio::fs::read_to_string(path).await?;
    let records: Vec<RawRecord> = serde_json::from_str(&content)?;
    info!(count = records.len(), normalize = pipeline.is_some(), "Loaded records");

    let mut summary = BatchSummary {
        total: records.len(),
        ..BatchSummary::default()
    };
    for mut record in records {
        let id = record_id(&record).unwrap_or_else(|| {
            let id = Uuid::new_v4().to_string();
            info!(%id, "Assigned id to record");
            id
        });
        record.insert("id".into(), Value::String(id));

        let stored = match pipeline {
            Some(pipeline) => pipeline.normalize(record).await.is_stored(),
            None => match store.upsert(&record).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(id = ?record.get("id"), error = %e, "Failed to upload record");
                    false
                }
            },
        };
        if stored {
            summary.stored += 1;
        } else {
            summary.failed += 1;
        }
    }

    info!(
        total = summary.total,
        stored = summary.stored,
        failed = summary.failed,
        "Ingest completed"
    );
    Ok(summary)
}

/// One stored record lacking a description or an impact.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingFields {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub impact: Option<String>,
}

/// List stored records where `description` or `impact` is undefined.
#[instrument(level = "info", skip_all)]
pub async fn missing_fields(
    store: &dyn NewsStore,
    limit: Option<usize>,
) -> Result<Vec<MissingFields>, Box<dyn Error>> {
    let records = store.query(MISSING_FIELDS_QUERY).await?;
    let report: Vec<MissingFields> = records
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|record| MissingFields {
            id: text_field(record, "id"),
            title: text_field(record, "title"),
            description: text_field(record, "description"),
            impact: text_field(record, "impact"),
        })
        .collect();

    if records.is_empty() {
        info!("All records have description and impact fields filled");
    } else {
        info!(found = records.len(), shown = report.len(), "Found records with missing data");
    }
    for item in &report {
        info!(
            id = ?item.id,
            title = ?item.title,
            description = ?item.description,
            impact = ?item.impact,
            "Missing data"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingGenerator, MemoryStore, ScriptedGenerator, raw};
    use serde_json::json;
    use std::io::Write;
    use std::sync::Arc;

    fn write_json(value: Value) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(value.to_string().as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_backfill_continues_past_failures() {
        let store = Arc::new(
            MemoryStore::with_records(vec![
                raw(json!({ "id": "1", "title": "a", "impact": "low", "description": "d" })),
                raw(json!({ "id": "2", "title": "b", "impact": "low", "description": "d" })),
                raw(json!({ "id": "3", "title": "c", "impact": "low", "description": "d" })),
            ])
            .failing_upsert_for("2"),
        );
        let pipeline = Pipeline::new(store.clone(), Arc::new(FailingGenerator));

        let summary = backfill(store.as_ref(), &pipeline).await.unwrap();

        assert_eq!(
            summary,
            BatchSummary {
                total: 3,
                stored: 2,
                failed: 1
            }
        );
        assert_eq!(store.upserts().len(), 3);
        assert_eq!(store.records()[2]["region"], "N/A");
    }

    #[tokio::test]
    async fn test_backfill_generates_only_where_needed() {
        let store = Arc::new(MemoryStore::with_records(vec![
            raw(json!({ "id": "1", "title": "a", "impact": "high" })),
            raw(json!({ "id": "2", "title": "b" })),
        ]));
        let generator = Arc::new(ScriptedGenerator::new(["Generated.\nmedium"]));
        let pipeline = Pipeline::new(store.clone(), generator.clone());

        backfill(store.as_ref(), &pipeline).await.unwrap();

        assert_eq!(generator.requests().len(), 1);
        let records = store.records();
        assert_eq!(records[0]["impact"], "high");
        assert_eq!(records[1]["impact"], "medium");
        assert_eq!(records[1]["description"], "Generated.");
    }

    #[tokio::test]
    async fn test_backfill_read_failure_is_error() {
        let store = Arc::new(MemoryStore::default().failing_reads());
        let pipeline = Pipeline::new(store.clone(), Arc::new(FailingGenerator));
        assert!(backfill(store.as_ref(), &pipeline).await.is_err());
        assert!(store.upserts().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_verbatim_assigns_ids() {
        let file = write_json(json!([
            { "id": "keep", "title": "Has id", "link": "https://www.smec.com/1" },
            { "title": "No id", "date": "March 5, 2024" }
        ]));
        let store = MemoryStore::default();

        let summary = ingest(file.path(), &store, None).await.unwrap();

        assert_eq!(summary.stored, 2);
        let records = store.records();
        assert_eq!(records[0]["id"], "keep");
        assert!(!records[0].contains_key("competitor"));
        let generated = records[1]["id"].as_str().unwrap();
        assert!(Uuid::parse_str(generated).is_ok());
        assert_eq!(records[1]["date"], "March 5, 2024");
    }

    #[tokio::test]
    async fn test_ingest_numeric_id_is_stored_as_string() {
        let file = write_json(json!([{ "id": 17, "title": "Numeric id" }]));
        let store = MemoryStore::default();

        let summary = ingest(file.path(), &store, None).await.unwrap();

        assert_eq!(
            summary,
            BatchSummary {
                total: 1,
                stored: 1,
                failed: 0
            }
        );
        assert_eq!(store.records()[0]["id"], "17");
    }

    #[tokio::test]
    async fn test_ingest_with_normalization() {
        let file = write_json(json!([{ "title": "Tunnel", "link": "https://www.wsp.com/t", "impact": "Medium" }]));
        let store = Arc::new(MemoryStore::default());
        let pipeline = Pipeline::new(store.clone(), Arc::new(FailingGenerator));

        let summary = ingest(file.path(), store.as_ref(), Some(&pipeline)).await.unwrap();

        assert_eq!(summary.stored, 1);
        let record = &store.records()[0];
        assert_eq!(record["competitor"], "Wsp");
        assert_eq!(record["impact"], "medium");
    }

    #[tokio::test]
    async fn test_ingest_rejects_non_array() {
        let file = write_json(json!({ "title": "not an array" }));
        let store = MemoryStore::default();
        assert!(ingest(file.path(), &store, None).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_fields_report() {
        let store = MemoryStore::with_records(vec![
            raw(json!({ "id": "1", "title": "complete", "description": "d", "impact": "low" })),
            raw(json!({ "id": "2", "title": "no impact", "description": "d" })),
            raw(json!({ "id": "3", "title": "bare" })),
        ]);

        let report = missing_fields(&store, None).await.unwrap();

        assert_eq!(store.queries(), vec![MISSING_FIELDS_QUERY.to_string()]);
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].id.as_deref(), Some("2"));
        assert_eq!(report[0].description.as_deref(), Some("d"));
        assert_eq!(report[1].impact, None);

        let limited = missing_fields(&store, Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
    }
}
