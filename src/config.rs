use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_STORE_NAME: &str = "demo_filesearch_store";
const DEFAULT_UPLOAD_MAX_BYTES: usize = 100 * 1024 * 1024;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 15 * 60;
const DEFAULT_POLL_MAX_RETRIES: u32 = 3;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// Configuration was read before [`init_config`] installed it.
    #[error("Configuration has not been initialized")]
    NotInitialized,
}

/// Runtime configuration for the File Search service.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// API credential sent with every Gemini request.
    pub gemini_api_key: String,
    /// Base URL of the Gemini REST API.
    pub gemini_base_url: String,
    /// Model used to answer questions.
    pub model: GeminiModel,
    /// Display name of the File Search store used by this process.
    pub store_display_name: String,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Largest accepted upload, in bytes.
    pub upload_max_bytes: usize,
    /// Fixed delay between indexing status polls.
    pub poll_interval_secs: u64,
    /// Budget for a single document to finish indexing.
    pub poll_timeout_secs: u64,
    /// Transient failures tolerated per status poll.
    pub poll_max_retries: u32,
}

/// Models that support the File Search tool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum GeminiModel {
    /// `gemini-2.5-flash`
    #[default]
    #[serde(rename = "gemini-2.5-flash")]
    Flash,
    /// `gemini-2.5-pro`
    #[serde(rename = "gemini-2.5-pro")]
    Pro,
    /// `gemini-2.5-flash-lite`
    #[serde(rename = "gemini-2.5-flash-lite")]
    FlashLite,
}

impl GeminiModel {
    /// Model identifier as used in the `models/{model}` resource path.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flash => "gemini-2.5-flash",
            Self::Pro => "gemini-2.5-pro",
            Self::FlashLite => "gemini-2.5-flash-lite",
        }
    }
}

impl std::fmt::Display for GeminiModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GeminiModel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let normalized = normalized
            .strip_prefix("models/")
            .unwrap_or(normalized.as_str());
        match normalized {
            "gemini-2.5-flash" => Ok(Self::Flash),
            "gemini-2.5-pro" => Ok(Self::Pro),
            "gemini-2.5-flash-lite" => Ok(Self::FlashLite),
            _ => Err(()),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Blank values are treated as absent, so `GEMINI_API_KEY=` fails the same way as an unset
    /// variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY")
                .ok_or(ConfigError::MissingVariable("GEMINI_API_KEY".into()))?,
            gemini_base_url: get("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            model: get("USE_MODEL")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("USE_MODEL".to_string()))
                })
                .transpose()?
                .unwrap_or_default(),
            store_display_name: get("FILE_SEARCH_STORE")
                .map(|value| value.trim().to_string())
                .unwrap_or_else(|| DEFAULT_STORE_NAME.into()),
            server_port: parse_optional(get("SERVER_PORT"), "SERVER_PORT")?,
            upload_max_bytes: parse_optional(get("UPLOAD_MAX_BYTES"), "UPLOAD_MAX_BYTES")?
                .unwrap_or(DEFAULT_UPLOAD_MAX_BYTES),
            poll_interval_secs: parse_optional(get("POLL_INTERVAL_SECS"), "POLL_INTERVAL_SECS")?
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            poll_timeout_secs: parse_optional(get("POLL_TIMEOUT_SECS"), "POLL_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_POLL_TIMEOUT_SECS),
            poll_max_retries: parse_optional(get("POLL_MAX_RETRIES"), "POLL_MAX_RETRIES")?
                .unwrap_or(DEFAULT_POLL_MAX_RETRIES),
        })
    }

    /// Emit the effective settings at debug level. The API key is never logged.
    pub fn log_summary(&self) {
        tracing::debug!(
            base_url = %self.gemini_base_url,
            model = %self.model,
            store = %self.store_display_name,
            server_port = ?self.server_port,
            upload_max_bytes = self.upload_max_bytes,
            poll_interval_secs = self.poll_interval_secs,
            poll_timeout_secs = self.poll_timeout_secs,
            poll_max_retries = self.poll_max_retries,
            "Loaded configuration"
        );
    }
}

fn parse_optional<T: std::str::FromStr>(
    value: Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration.
pub fn get_config() -> Result<&'static Config, ConfigError> {
    CONFIG.get().ok_or(ConfigError::NotInitialized)
}

/// Load configuration from the environment (and `.env`) and install it in the global cache.
///
/// Calling this more than once returns the configuration installed first. Nothing is logged
/// here because tracing is installed afterwards; call [`Config::log_summary`] once it is.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    Ok(CONFIG.get_or_init(|| config))
}
