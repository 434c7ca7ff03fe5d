//! In-memory collaborators for unit tests.

use crate::api::{CompletionRequest, TextGenerator};
use crate::error::{GenerationError, StoreError};
use crate::models::RawRecord;
use crate::store::NewsStore;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

/// Store double keeping records in insertion order, replacing by `id`.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<RawRecord>>,
    upserts: Mutex<Vec<RawRecord>>,
    queries: Mutex<Vec<String>>,
    fail_reads: bool,
    fail_upsert_ids: HashSet<String>,
    fail_all_upserts: bool,
}

impl MemoryStore {
    pub fn with_records(records: Vec<RawRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn failing_upserts(mut self) -> Self {
        self.fail_all_upserts = true;
        self
    }

    pub fn failing_upsert_for(mut self, id: &str) -> Self {
        self.fail_upsert_ids.insert(id.to_string());
        self
    }

    pub fn records(&self) -> Vec<RawRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Every upsert attempt, successful or not.
    pub fn upserts(&self) -> Vec<RawRecord> {
        self.upserts.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    fn unavailable() -> StoreError {
        StoreError::Status {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            body: "store offline".to_string(),
        }
    }
}

#[async_trait]
impl NewsStore for MemoryStore {
    async fn read_all(&self) -> Result<Vec<RawRecord>, StoreError> {
        if self.fail_reads {
            return Err(Self::unavailable());
        }
        Ok(self.records())
    }

    async fn upsert(&self, record: &RawRecord) -> Result<(), StoreError> {
        self.upserts.lock().unwrap().push(record.clone());
        let id = record
            .get("id")
            .and_then(Value::as_str)
            .ok_or(StoreError::MissingId)?;
        if self.fail_all_upserts || self.fail_upsert_ids.contains(id) {
            return Err(Self::unavailable());
        }

        let mut records = self.records.lock().unwrap();
        match records
            .iter_mut()
            .find(|r| r.get("id").and_then(Value::as_str) == Some(id))
        {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(())
    }

    /// Answers every query as the missing-fields report: records lacking
    /// `description` or `impact`.
    async fn query(&self, sql: &str) -> Result<Vec<RawRecord>, StoreError> {
        self.queries.lock().unwrap().push(sql.to_string());
        if self.fail_reads {
            return Err(Self::unavailable());
        }
        Ok(self
            .records()
            .into_iter()
            .filter(|r| !r.contains_key("description") || !r.contains_key("impact"))
            .collect())
    }
}

/// Generator double replaying canned answers in order.
#[derive(Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(GenerationError::EmptyResponse)
    }
}

/// Generator double whose service is always down.
pub struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, GenerationError> {
        Err(GenerationError::Status {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            body: "deployment unavailable".to_string(),
        })
    }
}

/// Build a raw record from a `json!` object literal.
pub fn raw(value: Value) -> RawRecord {
    value.as_object().cloned().expect("test record must be a JSON object")
}
