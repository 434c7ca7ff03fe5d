//! Generative text service interaction.
//!
//! The pipeline only needs one capability from a language model: turn a
//! prompt into text. That capability is the [`TextGenerator`] trait, so the
//! normalizer can be driven by the real Azure OpenAI deployment in production
//! and by scripted doubles in tests.
//!
//! # Architecture
//!
//! - [`TextGenerator`]: core trait defining an async completion call
//! - [`CompletionRequest`]: prompt plus sampling parameters
//! - [`AzureOpenAiClient`]: chat-completions client for an Azure OpenAI deployment
//!
//! Calls are made once; there is no retry. Callers decide how to degrade.

use crate::error::GenerationError;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};
use url::Url;

/// A single completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

/// Trait for async text generation.
///
/// Implementors send a prompt to a language model and return the generated
/// text, or an error if the service could not be reached or answered with
/// nothing usable.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError>;
}

/// Connection settings for an Azure OpenAI deployment.
#[derive(Debug, Clone)]
pub struct AzureOpenAiConfig {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com/`.
    pub endpoint: String,
    /// Name of the model deployment to call.
    pub deployment: String,
    pub api_key: String,
    /// REST API version, e.g. `2024-02-01`.
    pub api_version: String,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Chat-completions client for one Azure OpenAI deployment.
#[derive(Debug, Clone)]
pub struct AzureOpenAiClient {
    http: reqwest::Client,
    completions_url: Url,
    api_key: String,
}

impl AzureOpenAiClient {
    pub fn new(config: AzureOpenAiConfig) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            completions_url: completions_url(&config)?,
            api_key: config.api_key,
        })
    }

    fn headers(&self) -> Result<HeaderMap, GenerationError> {
        let mut headers = HeaderMap::new();
        headers.insert("api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

/// Build `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version={version}`.
fn completions_url(config: &AzureOpenAiConfig) -> Result<Url, url::ParseError> {
    let base = format!("{}/", config.endpoint.trim_end_matches('/'));
    let mut url = Url::parse(&base)?.join(&format!(
        "openai/deployments/{}/chat/completions",
        urlencoding::encode(&config.deployment)
    ))?;
    url.query_pairs_mut()
        .append_pair("api-version", &config.api_version);
    Ok(url)
}

#[async_trait]
impl TextGenerator for AzureOpenAiClient {
    #[instrument(level = "info", skip_all)]
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        let t0 = Instant::now();
        let body = ChatRequest {
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
        };

        let response = self
            .http
            .post(self.completions_url.clone())
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(
                elapsed_ms = t0.elapsed().as_millis() as u64,
                %status,
                "Completion call failed"
            );
            return Err(GenerationError::Status { status, body });
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(GenerationError::EmptyResponse)?;

        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            bytes = content.len(),
            "Completion call succeeded"
        );
        Ok(content)
    }
}
