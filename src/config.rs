use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid target url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported url scheme {scheme:?} (expected http or https)")]
    UnsupportedScheme { scheme: String },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorConfig {
    pub url: String,
    pub token: String,
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_check_interval() -> u64 { 60 }
fn default_timeout() -> u64 { 3500 }
fn default_api_port() -> u16 { 3000 }
fn default_event_buffer() -> usize { 256 }

impl MonitorConfig {
    /// Build the validated target from the configured url and token.
    pub fn target(&self) -> Result<Target, ConfigError> {
        Target::new(&self.url, &self.token)
    }
}

/// The remote endpoint and credential being monitored.
///
/// Construction is the validation point: the url must parse as an absolute
/// http(s) url, so an invalid target can never reach the engine. The token
/// is opaque and only ever forwarded.
#[derive(Debug, Clone)]
pub struct Target {
    pub url: Url,
    pub token: String,
}

impl Target {
    pub fn new(url: &str, token: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(url).map_err(|source| ConfigError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        match parsed.scheme() {
            "http" | "https" => Ok(Self {
                url: parsed,
                token: token.to_string(),
            }),
            other => Err(ConfigError::UnsupportedScheme {
                scheme: other.to_string(),
            }),
        }
    }
}
