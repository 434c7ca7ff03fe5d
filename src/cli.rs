//! Command-line interface definitions for Competitor News.
//!
//! Connection settings for the document store and the generative text
//! service can be given as flags or environment variables (a `.env` file in
//! the working directory is loaded first). Store settings are required for
//! every command; generator settings only for commands that normalize.

use crate::api::AzureOpenAiConfig;
use crate::error::ConfigError;
use crate::store::CosmosConfig;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the Competitor News application.
///
/// # Examples
///
/// ```sh
/// # Serve the dashboard read API
/// competitor_news serve --bind 0.0.0.0:5000
///
/// # Fill missing descriptions, impact ratings and competitors
/// competitor_news backfill
///
/// # Upload scraper output, normalizing on the way in
/// competitor_news ingest aecom_press_releases.json --normalize
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub generator: GeneratorArgs,

    /// Timeout for each store or completion request, in seconds
    #[arg(long, global = true, default_value_t = 60)]
    pub request_timeout_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve `GET /api/news`
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:5000")]
        bind: SocketAddr,
    },
    /// Normalize every stored record and write it back
    Backfill,
    /// Upload a JSON array of scraped records
    Ingest {
        /// Path to the JSON file
        file: PathBuf,
        /// Normalize each record before storing it
        #[arg(long)]
        normalize: bool,
    },
    /// List stored records that lack a description or impact
    Missing {
        /// Show at most this many records
        #[arg(long)]
        limit: Option<usize>,
    },
}

/// Cosmos DB connection settings.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Cosmos DB account endpoint
    #[arg(long, env = "COSMOS_URI")]
    pub cosmos_uri: String,

    /// Cosmos DB master key
    #[arg(long, env = "COSMOS_KEY", hide_env_values = true)]
    pub cosmos_key: String,

    /// Database name
    #[arg(long, env = "COSMOS_DATABASE")]
    pub cosmos_database: String,

    /// Container name
    #[arg(long, env = "COSMOS_CONTAINER")]
    pub cosmos_container: String,
}

impl StoreArgs {
    pub fn config(&self, timeout: Duration) -> CosmosConfig {
        CosmosConfig {
            uri: self.cosmos_uri.clone(),
            key: self.cosmos_key.clone(),
            database: self.cosmos_database.clone(),
            container: self.cosmos_container.clone(),
            timeout,
        }
    }
}

/// Azure OpenAI connection settings.
#[derive(Args, Debug, Clone, Default)]
pub struct GeneratorArgs {
    /// Azure OpenAI resource endpoint
    #[arg(long, env = "OPENAI_ENDPOINT")]
    pub openai_endpoint: Option<String>,

    /// Model deployment name
    #[arg(long, env = "OPENAI_DEPLOYMENT_NAME")]
    pub openai_deployment_name: Option<String>,

    /// Azure OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Azure OpenAI REST API version
    #[arg(long, env = "OPENAI_API_VERSION")]
    pub openai_api_version: Option<String>,
}

impl GeneratorArgs {
    /// Resolve into a client configuration, naming the first missing setting.
    pub fn config(&self, timeout: Duration) -> Result<AzureOpenAiConfig, ConfigError> {
        fn required(
            value: &Option<String>,
            flag: &'static str,
            env: &'static str,
        ) -> Result<String, ConfigError> {
            value
                .clone()
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError { flag, env })
        }

        Ok(AzureOpenAiConfig {
            endpoint: required(&self.openai_endpoint, "openai-endpoint", "OPENAI_ENDPOINT")?,
            deployment: required(
                &self.openai_deployment_name,
                "openai-deployment-name",
                "OPENAI_DEPLOYMENT_NAME",
            )?,
            api_key: required(&self.openai_api_key, "openai-api-key", "OPENAI_API_KEY")?,
            api_version: required(
                &self.openai_api_version,
                "openai-api-version",
                "OPENAI_API_VERSION",
            )?,
            timeout,
        })
    }
}
