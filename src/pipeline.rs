//! Record normalization pipeline: normalize, persist, project.
//!
//! The pipeline owns its collaborators explicitly so callers (the batch
//! drivers, tests) decide which store and which generator it talks to.

use crate::api::TextGenerator;
use crate::backfill::Backfiller;
use crate::models::{NewsRecord, RawRecord};
use crate::normalize::normalize_record;
use crate::store::NewsStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

/// Whether the enriched record reached the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Persistence {
    Stored,
    /// Enriched in memory only; carries the store's error message.
    NotStored(String),
}

/// Outcome of normalizing one record.
#[derive(Debug, Clone)]
pub struct Normalized {
    /// Client-facing projection of the enriched record.
    pub record: NewsRecord,
    pub persistence: Persistence,
}

impl Normalized {
    pub fn is_stored(&self) -> bool {
        self.persistence == Persistence::Stored
    }
}

pub struct Pipeline {
    store: Arc<dyn NewsStore>,
    backfiller: Backfiller,
}

impl Pipeline {
    pub fn new(store: Arc<dyn NewsStore>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            store,
            backfiller: Backfiller::new(generator),
        }
    }

    /// Normalize one raw record and upsert the result.
    ///
    /// Exactly one upsert is attempted per call. A persistence failure is
    /// logged and reported through [`Persistence::NotStored`]; the enriched
    /// projection is returned either way.
    ///
    /// # Arguments
    ///
    /// * `raw` - The record as stored or scraped
    ///
    /// # Returns
    ///
    /// The client-facing projection and whether the filled document reached
    /// the store. The stored document keeps every value it already had, apart
    /// from the rewrites listed on [`NewsRecord::merge_into`].
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let outcome = pipeline.normalize(raw).await;
    /// if !outcome.is_stored() {
    ///     warn!(id = ?outcome.record.id, "Not stored");
    /// }
    /// ```
    #[instrument(level = "info", skip_all, fields(id = ?raw.get("id")))]
    pub async fn normalize(&self, mut raw: RawRecord) -> Normalized {
        let t0 = Instant::now();
        let record = normalize_record(&raw, &self.backfiller).await;
        record.merge_into(&mut raw);

        let persistence = match self.store.upsert(&raw).await {
            Ok(()) => {
                info!(
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "Backfilled record in store"
                );
                Persistence::Stored
            }
            Err(e) => {
                error!(error = %e, "Failed to update record in store");
                Persistence::NotStored(e.to_string())
            }
        };

        Normalized {
            record,
            persistence,
        }
    }
}
