use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Path the relay is also served on, matching the serverless function route.
pub const NETLIFY_FUNCTION_PATH: &str = "/.netlify/functions/gemini";

pub const DEFAULT_REQUEST_BODY_LIMIT: usize = 262_144;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_relay_path")]
    pub relay_path: String,
    #[serde(default = "default_request_body_limit")]
    pub request_body_limit_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
    /// Environment variable holding the upstream API key.
    #[serde(default = "default_credential_env")]
    pub credential_env: String,
    #[serde(default)]
    pub error_shape: ErrorShape,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
    #[serde(default)]
    pub metrics_enabled: bool,
    #[serde(default = "default_metrics_bind")]
    pub metrics_bind: String,
}

/// JSON layout of locally generated error bodies.
///
/// `Nested` renders `{"error": {"message": "..."}}`, `Flat` renders
/// `{"error": "..."}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ErrorShape {
    #[default]
    Nested,
    Flat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            relay_path: default_relay_path(),
            request_body_limit_bytes: default_request_body_limit(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_version: default_api_version(),
            model: default_model(),
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            credential_env: default_credential_env(),
            error_shape: ErrorShape::default(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            tracing_level: default_tracing_level(),
            metrics_enabled: false,
            metrics_bind: default_metrics_bind(),
        }
    }
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_relay_path() -> String {
    "/api/gemini".to_string()
}
fn default_request_body_limit() -> usize {
    DEFAULT_REQUEST_BODY_LIMIT
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_api_version() -> String {
    "v1beta".to_string()
}
fn default_model() -> String {
    "gemini-2.5-flash-preview-09-2025".to_string()
}
fn default_connect_timeout() -> u64 {
    800
}
fn default_request_timeout() -> u64 {
    60_000
}
fn default_credential_env() -> String {
    "GEMINI_API_KEY".to_string()
}
fn default_tracing_level() -> String {
    "info".to_string()
}
fn default_metrics_bind() -> String {
    "0.0.0.0:9090".to_string()
}

/// Load the configuration and the upstream credential.
///
/// An explicit `path` must exist. Without one, `config.toml` in the working
/// directory is used when present and defaults otherwise. The credential is
/// `None` when its environment variable is unset or empty; that is served as
/// a per-request error rather than refused at startup.
pub fn load_config(path: Option<&Path>) -> Result<(Config, Option<SecretString>)> {
    let config = match path {
        Some(path) => {
            let config_str = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            parse_config(&config_str)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        }
        None => match std::fs::read_to_string(DEFAULT_CONFIG_FILE) {
            Ok(config_str) => parse_config(&config_str)
                .with_context(|| format!("Failed to parse {}", DEFAULT_CONFIG_FILE))?,
            Err(_) => Config::default(),
        },
    };

    let credential = load_credential(&config.relay.credential_env);

    Ok((config, credential))
}

pub fn parse_config(config_str: &str) -> Result<Config> {
    Ok(toml::from_str(config_str)?)
}

pub fn load_credential(var: &str) -> Option<SecretString> {
    std::env::var(var)
        .ok()
        .filter(|value| !value.is_empty())
        .map(SecretString::new)
}

impl UpstreamConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
