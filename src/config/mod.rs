//! Typed configuration from environment variables.
//!
//! Loads once at startup. Sink credentials are wrapped in
//! secrecy::SecretString to prevent log leaks. Pipeline tuning
//! constants are fixed and never read from the environment.

pub mod secrets;

use crate::error::{Error, Result};
use crate::pipeline::PipelineConfig;
use reqwest::Url;
use secrecy::SecretString;

pub const DATABASE_URL_VAR: &str = "ANALYTICS_DATABASE_URL";
pub const SINK_URL_VAR: &str = "ANALYTICS_SINK_URL";
pub const SINK_KEY_VAR: &str = "ANALYTICS_SINK_KEY";

#[derive(Debug)]
pub struct Config {
    /// Where batches go. `None` when no sink variables are set at all.
    pub sink: Option<SinkConfig>,
    pub pipeline: PipelineConfig,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

/// Connection settings for one of the remote sink adapters.
#[derive(Debug)]
pub enum SinkConfig {
    /// Direct SQL inserts into Postgres.
    Postgres { url: SecretString },
    /// PostgREST-style HTTP endpoint with an API key.
    Rest { url: Url, api_key: SecretString },
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when sink variables are present but
    /// incomplete or malformed.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            sink: SinkConfig::from_env()?,
            pipeline: PipelineConfig::default(),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

impl SinkConfig {
    /// Resolve the sink from the environment.
    ///
    /// A database URL takes precedence over the REST endpoint.
    pub fn from_env() -> Result<Option<Self>> {
        if let Ok(url) = std::env::var(DATABASE_URL_VAR) {
            return Ok(Some(SinkConfig::Postgres {
                url: SecretString::from(url),
            }));
        }

        let url = std::env::var(SINK_URL_VAR).ok();
        let key = std::env::var(SINK_KEY_VAR).ok();
        match (url, key) {
            (None, None) => Ok(None),
            (url, key) => {
                let url = url.ok_or_else(|| missing_var(SINK_URL_VAR))?;
                let key = key.ok_or_else(|| missing_var(SINK_KEY_VAR))?;
                Ok(Some(SinkConfig::rest(&url, key)?))
            }
        }
    }

    /// Build a REST sink config, validating the base URL.
    pub fn rest(url: &str, api_key: impl Into<String>) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|_| Error::Config(format!("{SINK_URL_VAR} must be a valid URL")))?;
        Ok(SinkConfig::Rest {
            url,
            api_key: SecretString::from(api_key.into()),
        })
    }

    /// Short label for logs; never includes credentials.
    pub fn kind(&self) -> &'static str {
        match self {
            SinkConfig::Postgres { .. } => "postgres",
            SinkConfig::Rest { .. } => "rest",
        }
    }
}

fn missing_var(name: &str) -> Error {
    Error::Config(format!(
        "{name} environment variable is required but not set"
    ))
}
