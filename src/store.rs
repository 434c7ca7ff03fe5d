//! Document store gateway.
//!
//! News records live in an Azure Cosmos DB (SQL API) container. The pipeline
//! and the read endpoint only need three operations, captured by the
//! [`NewsStore`] trait; [`CosmosStore`] implements them against the Cosmos
//! REST API with master-key authorization.
//!
//! # Request signing
//!
//! Every request carries an `authorization` header built from an HMAC-SHA256
//! over `verb`, resource type, resource link and the `x-ms-date` value, keyed
//! with the base64-decoded account key.

use crate::error::StoreError;
use crate::models::RawRecord;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::Sha256;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const API_VERSION: &str = "2018-12-31";
const PAGE_SIZE: &str = "1000";
const CONTINUATION: &str = "x-ms-continuation";

/// Read and write access to the stored news records.
#[async_trait]
pub trait NewsStore: Send + Sync {
    /// Fetch every record in the container.
    async fn read_all(&self) -> Result<Vec<RawRecord>, StoreError>;

    /// Insert or replace a record, keyed by its `id`.
    async fn upsert(&self, record: &RawRecord) -> Result<(), StoreError>;

    /// Run a SQL query across all partitions.
    async fn query(&self, sql: &str) -> Result<Vec<RawRecord>, StoreError>;
}

/// Connection settings for a Cosmos DB container.
#[derive(Debug, Clone)]
pub struct CosmosConfig {
    /// Account endpoint, e.g. `https://account.documents.azure.com:443/`.
    pub uri: String,
    /// Base64 master key.
    pub key: String,
    pub database: String,
    pub container: String,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct DocumentFeed {
    #[serde(rename = "Documents", default)]
    documents: Vec<RawRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerProperties {
    partition_key: Option<PartitionKeyDefinition>,
}

#[derive(Debug, Deserialize)]
struct PartitionKeyDefinition {
    #[serde(default)]
    paths: Vec<String>,
}

/// Cosmos DB SQL API client scoped to one container.
pub struct CosmosStore {
    http: reqwest::Client,
    key: Vec<u8>,
    collection_link: String,
    collection_url: Url,
    docs_url: Url,
    partition_key_path: OnceCell<Vec<String>>,
}

impl CosmosStore {
    pub fn new(config: CosmosConfig) -> Result<Self, StoreError> {
        let key = STANDARD.decode(config.key.trim())?;
        let collection_link = format!("dbs/{}/colls/{}", config.database, config.container);
        let base = Url::parse(&format!("{}/", config.uri.trim_end_matches('/')))?;
        let collection_url = base.join(&collection_link)?;
        let docs_url = base.join(&format!("{collection_link}/docs"))?;
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            key,
            collection_link,
            collection_url,
            docs_url,
            partition_key_path: OnceCell::new(),
        })
    }

    fn headers(&self, verb: &str, resource_type: &str) -> Result<HeaderMap, StoreError> {
        let date = x_ms_date(Utc::now());
        let auth = authorization(&self.key, verb, resource_type, &self.collection_link, &date);

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_str(&auth)?);
        headers.insert("x-ms-date", HeaderValue::from_str(&date)?);
        headers.insert("x-ms-version", HeaderValue::from_static(API_VERSION));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Partition key path of the container, fetched once per process.
    async fn partition_key_path(&self) -> Result<&[String], StoreError> {
        let path = self
            .partition_key_path
            .get_or_try_init(|| async {
                let response = self
                    .http
                    .get(self.collection_url.clone())
                    .headers(self.headers("get", "colls")?)
                    .send()
                    .await?;
                let properties: ContainerProperties = check(response).await?.json().await?;
                let path = properties
                    .partition_key
                    .and_then(|pk| pk.paths.into_iter().next())
                    .ok_or(StoreError::MissingPartitionKey)?;
                info!(partition_key = %path, "Resolved container partition key");
                Ok::<_, StoreError>(parse_partition_key_path(&path))
            })
            .await?;
        Ok(path.as_slice())
    }

    /// Follow continuation tokens until the feed is exhausted.
    async fn collect_pages<F>(&self, mut send: F) -> Result<Vec<RawRecord>, StoreError>
    where
        F: FnMut(Option<&str>) -> Result<reqwest::RequestBuilder, StoreError>,
    {
        let mut documents = Vec::new();
        let mut continuation: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let response = check(send(continuation.as_deref())?.send().await?).await?;
            let next = response
                .headers()
                .get(CONTINUATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let feed: DocumentFeed = serde_json::from_slice(&response.bytes().await?)?;
            pages += 1;
            debug!(page = pages, count = feed.documents.len(), "Fetched page");
            documents.extend(feed.documents);

            match next {
                Some(token) if !token.is_empty() => continuation = Some(token),
                _ => break,
            }
        }
        Ok(documents)
    }
}

#[async_trait]
impl NewsStore for CosmosStore {
    #[instrument(level = "info", skip_all, fields(collection = %self.collection_link))]
    async fn read_all(&self) -> Result<Vec<RawRecord>, StoreError> {
        let t0 = Instant::now();
        let documents = self
            .collect_pages(|continuation| {
                let mut headers = self.headers("get", "docs")?;
                headers.insert("x-ms-max-item-count", HeaderValue::from_static(PAGE_SIZE));
                if let Some(token) = continuation {
                    headers.insert(CONTINUATION, HeaderValue::from_str(token)?);
                }
                Ok(self.http.get(self.docs_url.clone()).headers(headers))
            })
            .await?;
        info!(
            count = documents.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Read all records"
        );
        Ok(documents)
    }

    #[instrument(level = "info", skip_all, fields(id = tracing::field::Empty))]
    async fn upsert(&self, record: &RawRecord) -> Result<(), StoreError> {
        let id = record
            .get("id")
            .and_then(Value::as_str)
            .ok_or(StoreError::MissingId)?;
        tracing::Span::current().record("id", id);

        let partition_key = partition_key_header(record, self.partition_key_path().await?);
        let mut headers = self.headers("post", "docs")?;
        headers.insert("x-ms-documentdb-is-upsert", HeaderValue::from_static("True"));
        headers.insert(
            "x-ms-documentdb-partitionkey",
            HeaderValue::from_str(&partition_key)?,
        );

        let response = self
            .http
            .post(self.docs_url.clone())
            .headers(headers)
            .json(record)
            .send()
            .await?;
        check(response).await?;
        debug!("Upserted record");
        Ok(())
    }

    #[instrument(level = "info", skip_all)]
    async fn query(&self, sql: &str) -> Result<Vec<RawRecord>, StoreError> {
        let body = serde_json::to_vec(&json!({ "query": sql, "parameters": [] }))?;
        let documents = self
            .collect_pages(|continuation| {
                let mut headers = self.headers("post", "docs")?;
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/query+json"));
                headers.insert("x-ms-documentdb-isquery", HeaderValue::from_static("True"));
                headers.insert(
                    "x-ms-documentdb-query-enablecrosspartition",
                    HeaderValue::from_static("True"),
                );
                headers.insert("x-ms-max-item-count", HeaderValue::from_static(PAGE_SIZE));
                if let Some(token) = continuation {
                    headers.insert(CONTINUATION, HeaderValue::from_str(token)?);
                }
                Ok(self
                    .http
                    .post(self.docs_url.clone())
                    .headers(headers)
                    .body(body.clone()))
            })
            .await?;
        info!(count = documents.len(), "Query returned records");
        Ok(documents)
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status { status, body })
}

/// RFC 1123 timestamp as Cosmos expects in `x-ms-date`.
fn x_ms_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// URL-encoded master-key authorization token.
fn authorization(key: &[u8], verb: &str, resource_type: &str, resource_link: &str, date: &str) -> String {
    let payload = format!(
        "{}\n{}\n{}\n{}\n\n",
        verb.to_lowercase(),
        resource_type.to_lowercase(),
        resource_link,
        date.to_lowercase()
    );
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());
    urlencoding::encode(&format!("type=master&ver=1.0&sig={signature}")).into_owned()
}

/// Split `/a/b` into `["a", "b"]`.
fn parse_partition_key_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// JSON array header value carrying the record's partition key.
///
/// A record without the key field is addressed with the "undefined"
/// partition key, `[{}]`.
fn partition_key_header(record: &RawRecord, path: &[String]) -> String {
    let mut segments = path.iter();
    let value = segments.next().and_then(|first| {
        segments.try_fold(record.get(first.as_str())?, |current, segment| {
            current.get(segment.as_str())
        })
    });
    match value {
        Some(v) => json!([v]).to_string(),
        None => "[{}]".to_string(),
    }
}
