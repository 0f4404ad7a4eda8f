use std::env;
use std::time::Duration;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be used.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the xraydesk server.
///
/// Built once in `main` and passed by `Arc` to every component that needs it;
/// there is no ambient global lookup.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the GroundX document parsing service.
    pub groundx_api_key: String,
    /// API key for the OpenRouter completion service.
    pub openrouter_api_key: String,
    /// Base URL of the GroundX management API.
    pub groundx_base_url: String,
    /// Base URL of the OpenRouter API.
    pub openrouter_base_url: String,
    /// Logical bucket name documents are grouped under; created on demand.
    pub bucket_name: String,
    /// Completion model identifier passed to OpenRouter.
    pub chat_model: String,
    /// Delay between ingest status polls.
    pub poll_interval: Duration,
    /// Upper bound on total polling time before an upload is reported as timed out.
    pub max_wait: Duration,
    /// Token budget for the assembled chat context.
    pub context_max_tokens: usize,
    /// Token cap requested for each chat completion.
    pub completion_max_tokens: u32,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

const DEFAULT_GROUNDX_BASE_URL: &str = "https://api.groundx.ai/api/v1";
const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_BUCKET_NAME: &str = "xraydesk";
const DEFAULT_CHAT_MODEL: &str = "openai/gpt-4o-mini";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;
const DEFAULT_MAX_WAIT_SECS: u64 = 300;
const DEFAULT_CONTEXT_MAX_TOKENS: usize = 1500;
const DEFAULT_COMPLETION_MAX_TOKENS: u32 = 300;

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            groundx_api_key: load_api_key("GROUNDX_API_KEY")?,
            openrouter_api_key: load_api_key("OPENROUTER_API_KEY")?,
            groundx_base_url: load_env_optional("GROUNDX_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GROUNDX_BASE_URL.to_string()),
            openrouter_base_url: load_env_optional("OPENROUTER_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENROUTER_BASE_URL.to_string()),
            bucket_name: load_env_optional("GROUNDX_BUCKET_NAME")
                .unwrap_or_else(|| DEFAULT_BUCKET_NAME.to_string()),
            chat_model: load_env_optional("OPENROUTER_MODEL")
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            poll_interval: Duration::from_secs(
                load_parsed("POLL_INTERVAL_SECS")?.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            max_wait: Duration::from_secs(
                load_parsed("MAX_WAIT_SECS")?.unwrap_or(DEFAULT_MAX_WAIT_SECS),
            ),
            context_max_tokens: load_parsed("CHAT_CONTEXT_MAX_TOKENS")?
                .unwrap_or(DEFAULT_CONTEXT_MAX_TOKENS),
            completion_max_tokens: load_parsed("CHAT_MAX_COMPLETION_TOKENS")?
                .unwrap_or(DEFAULT_COMPLETION_MAX_TOKENS),
            server_port: load_parsed("SERVER_PORT")?,
        })
    }
}

/// Load a required API key, rejecting empty and placeholder values.
///
/// Keys copied out of a sample `.env` sometimes keep the placeholder text or a
/// UTF-8 BOM from Windows editors; both would surface at the vendor as a
/// confusing 401, so they are rejected at startup instead.
fn load_api_key(key: &str) -> Result<String, ConfigError> {
    let raw = env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))?;
    let value = raw.trim().trim_start_matches('\u{feff}').trim().to_string();
    if value.is_empty() || value.starts_with("your-") {
        return Err(ConfigError::InvalidValue(key.to_string()));
    }
    Ok(value)
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_parsed<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}
