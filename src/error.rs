//! Error types for the store gateway, the generative text service, and the
//! HTTP read surface.
//!
//! Collaborator errors never abort a normalization pass; they are logged and
//! the pipeline degrades to default values. Only the read endpoint turns an
//! error into something the client sees, via [`AppError`].

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failures talking to the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("store response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("store master key is not valid base64: {0}")]
    InvalidKey(#[from] base64::DecodeError),

    #[error("invalid store endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("record has no id")]
    MissingId,

    #[error("container has no partition key path")]
    MissingPartitionKey,
}

/// Failures of the generative text service.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid completion endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("completion response had no content")]
    EmptyResponse,
}

/// A required setting was not supplied on the command line or in the environment.
#[derive(Debug, Error)]
#[error("missing configuration: set --{flag} or {env}")]
pub struct ConfigError {
    pub flag: &'static str,
    pub env: &'static str,
}

/// Errors surfaced by the HTTP read endpoint.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();
        tracing::error!(status = status.as_u16(), %message, "Request failed");
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_names_flag_and_env() {
        let err = ConfigError {
            flag: "openai-api-key",
            env: "OPENAI_API_KEY",
        };
        assert_eq!(
            err.to_string(),
            "missing configuration: set --openai-api-key or OPENAI_API_KEY"
        );
    }

    #[test]
    fn test_store_error_maps_to_server_error() {
        let err = AppError::from(StoreError::MissingId);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "record has no id");
    }
}
