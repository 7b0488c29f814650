//! Configuration loading, validation, and management for RoadClaim.
//!
//! Loads configuration from `~/.roadclaim/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.roadclaim/config.toml`. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Reasoning model endpoint
    #[serde(default)]
    pub provider: ProviderConfig,

    /// HTTP surface
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Agent runner bounds
    #[serde(default)]
    pub agent: AgentConfig,

    /// Live log streaming
    #[serde(default)]
    pub streaming: StreamingConfig,

    /// Transcript intake policy
    #[serde(default)]
    pub intake: IntakeConfig,

    /// Policy and garage catalog
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.1
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider(),
            api_key: None,
            api_url: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// CORS origins. Empty = any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: vec![],
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Tool-loop iterations allowed per model stage
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Deadline for a single tool or model call
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    /// Local retries for transient transport errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First retry delay; doubles on each attempt
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

fn default_max_steps() -> u32 {
    10
}
fn default_call_timeout() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_backoff() -> u64 {
    250
}

impl AgentConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            call_timeout_secs: default_call_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Events buffered per subscriber before it is dropped as lagging
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,

    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u64,
}

fn default_subscriber_buffer() -> usize {
    64
}
fn default_keepalive() -> u64 {
    15
}

impl StreamingConfig {
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: default_subscriber_buffer(),
            keepalive_secs: default_keepalive(),
        }
    }
}

/// What to do when a transcript arrives for a conversation that already has one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Keep the first transcript and its claim.
    #[default]
    Ignore,
    /// Replace the transcript and start a fresh claim once the current run is terminal.
    Reprocess,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeConfig {
    /// Webhook transcripts shorter than this are stored but not processed
    #[serde(default = "default_min_entries")]
    pub min_transcript_entries: usize,

    #[serde(default)]
    pub on_duplicate: DuplicatePolicy,
}

fn default_min_entries() -> usize {
    3
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            min_transcript_entries: default_min_entries(),
            on_duplicate: DuplicatePolicy::Ignore,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// JSON file replacing the embedded sample policies and garages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.roadclaim/config.toml).
    ///
    /// Environment overrides:
    /// - `ROADCLAIM_API_KEY`, then `OPENAI_API_KEY` (when the file has no key)
    /// - `ROADCLAIM_MODEL`
    /// - `ROADCLAIM_API_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.provider.api_key.is_none() {
            config.provider.api_key = std::env::var("ROADCLAIM_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("ROADCLAIM_MODEL") {
            config.provider.model = model;
        }

        if let Ok(url) = std::env::var("ROADCLAIM_API_URL") {
            config.provider.api_url = Some(url);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".roadclaim")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_steps must be at least 1".into(),
            ));
        }
        if self.agent.call_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "agent.call_timeout_secs must be at least 1".into(),
            ));
        }
        if self.streaming.subscriber_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "streaming.subscriber_buffer must be at least 1".into(),
            ));
        }
        if self.streaming.keepalive_secs == 0 {
            return Err(ConfigError::ValidationError(
                "streaming.keepalive_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.provider.model, "gpt-4o");
        assert_eq!(config.gateway.port, 8000);
        assert_eq!(config.agent.max_steps, 10);
        assert_eq!(config.intake.on_duplicate, DuplicatePolicy::Ignore);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider.name, config.provider.name);
        assert_eq!(parsed.streaming.subscriber_buffer, 64);
    }

    #[test]
    fn invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.provider.temperature = 5.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.agent.max_steps = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.streaming.subscriber_buffer = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_keepalive_rejected() {
        let mut config = AppConfig::default();
        config.streaming.keepalive_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("keepalive_secs"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[streaming]\nkeepalive_secs = 0\n").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.provider.name, "openai");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[agent]\ncall_timeout_secs = 5\n\n[intake]\non_duplicate = \"reprocess\""
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.agent.call_timeout(), Duration::from_secs(5));
        assert_eq!(config.agent.max_retries, 2);
        assert_eq!(config.intake.on_duplicate, DuplicatePolicy::Reprocess);
        assert_eq!(config.gateway.body_limit_bytes, 1024 * 1024);
    }

    #[test]
    fn invalid_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[agent]\nmax_steps = \"lots\"").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o"));
        assert!(toml_str.contains("8000"));
        assert!(toml_str.contains("on_duplicate"));
    }
}
