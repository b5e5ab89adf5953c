//! Configuration loading, validation, and management for PostClaw.
//!
//! Loads configuration from `~/.postclaw/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.postclaw/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generation service API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default generation provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Social posting endpoint
    #[serde(default)]
    pub social: SocialConfig,

    /// Rate-limit backoff for the posting endpoint
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Orchestration loop settings
    #[serde(default)]
    pub agent: AgentSettings,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("providers", &self.providers)
            .field("social", &self.social)
            .field("backoff", &self.backoff)
            .field("agent", &self.agent)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// The social posting endpoint and the tool that fronts it.
#[derive(Clone, Serialize, Deserialize)]
pub struct SocialConfig {
    #[serde(default = "default_social_base_url")]
    pub base_url: String,

    /// Bearer token passed through verbatim on every post
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,

    /// Maximum characters per post
    #[serde(default = "default_char_limit")]
    pub char_limit: usize,

    /// Name under which the posting tool is registered and called
    #[serde(default = "default_posting_tool")]
    pub posting_tool: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_social_base_url() -> String {
    "https://api.twitter.com".into()
}
fn default_char_limit() -> usize {
    280
}
fn default_posting_tool() -> String {
    "createPost".into()
}
fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            base_url: default_social_base_url(),
            bearer_token: None,
            char_limit: default_char_limit(),
            posting_tool: default_posting_tool(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for SocialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocialConfig")
            .field("base_url", &self.base_url)
            .field("bearer_token", &redact(&self.bearer_token))
            .field("char_limit", &self.char_limit)
            .field("posting_tool", &self.posting_tool)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Exponential backoff applied after the posting endpoint answers 429.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay unit: the n-th consecutive limit waits `2^n * base_delay_ms`
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound for a single backoff window (15 minutes)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Minimum spacing between two posting attempts
    #[serde(default = "default_min_spacing_ms")]
    pub min_spacing_ms: u64,
}

fn default_base_delay_ms() -> u64 {
    1_000
}
fn default_max_delay_ms() -> u64 {
    900_000
}
fn default_min_spacing_ms() -> u64 {
    1_000
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            min_spacing_ms: default_min_spacing_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Generation calls allowed per user round before the loop gives up
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_max_iterations() -> u32 {
    10
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.postclaw/config.toml),
    /// then apply environment overrides.
    ///
    /// Environment variables:
    /// - `POSTCLAW_API_KEY`, then `GEMINI_API_KEY`, then `OPENAI_API_KEY`
    /// - `POSTCLAW_PROVIDER`, `POSTCLAW_MODEL`
    /// - `POSTCLAW_SOCIAL_TOKEN`, then `TWITTER_BEARER_TOKEN`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
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

    /// Apply environment overrides using `lookup` to read variables.
    ///
    /// Keys already present in the file win for secrets; provider and model
    /// overrides always win.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("POSTCLAW_API_KEY")
                .or_else(|| lookup("GEMINI_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"));
        }

        if self.social.bearer_token.is_none() {
            self.social.bearer_token =
                lookup("POSTCLAW_SOCIAL_TOKEN").or_else(|| lookup("TWITTER_BEARER_TOKEN"));
        }

        if let Some(provider) = lookup("POSTCLAW_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("POSTCLAW_MODEL") {
            self.default_model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".postclaw")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.social.char_limit < 4 {
            return Err(ConfigError::ValidationError(
                "social.char_limit must leave room for an ellipsis (>= 4)".into(),
            ));
        }

        if self.social.posting_tool.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "social.posting_tool must not be empty".into(),
            ));
        }

        if self.backoff.base_delay_ms == 0 || self.backoff.max_delay_ms < self.backoff.base_delay_ms {
            return Err(ConfigError::ValidationError(
                "backoff.max_delay_ms must be >= backoff.base_delay_ms > 0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if a generation API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// A copy with every secret replaced, for printing.
    pub fn redacted(&self) -> Self {
        let mask = |s: &Option<String>| s.as_ref().map(|_| String::from("***"));
        let mut copy = self.clone();
        copy.api_key = mask(&self.api_key);
        copy.social.bearer_token = mask(&self.social.bearer_token);
        for provider in copy.providers.values_mut() {
            provider.api_key = mask(&provider.api_key);
        }
        copy
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            providers: HashMap::new(),
            social: SocialConfig::default(),
            backoff: BackoffConfig::default(),
            agent: AgentSettings::default(),
        }
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

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "gemini");
        assert_eq!(config.social.char_limit, 280);
        assert_eq!(config.social.posting_tool, "createPost");
        assert_eq!(config.backoff.max_delay_ms, 900_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_model, config.default_model);
        assert_eq!(parsed.backoff.min_spacing_ms, config.backoff.min_spacing_ms);
    }

    #[test]
    fn redacted_masks_every_secret() {
        let mut config = AppConfig {
            api_key: Some("gem-key".into()),
            ..AppConfig::default()
        };
        config.social.bearer_token = Some("bearer".into());
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: Some("sk-live".into()),
                ..Default::default()
            },
        );

        let shown = toml::to_string_pretty(&config.redacted()).unwrap();
        assert!(!shown.contains("gem-key"));
        assert!(!shown.contains("bearer\""));
        assert!(!shown.contains("sk-live"));
        assert!(shown.contains("***"));
        // The original is untouched
        assert_eq!(config.api_key.as_deref(), Some("gem-key"));
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_backoff_bounds_rejected() {
        let mut config = AppConfig::default();
        config.backoff.max_delay_ms = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_provider, "gemini");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_model = "gemini-1.5-pro"

[social]
char_limit = 500

[backoff]
min_spacing_ms = 2500
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_model, "gemini-1.5-pro");
        assert_eq!(config.social.char_limit, 500);
        assert_eq!(config.social.posting_tool, "createPost");
        assert_eq!(config.backoff.min_spacing_ms, 2500);
        assert_eq!(config.backoff.base_delay_ms, 1000);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_model = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_fill_missing_secrets() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| match key {
            "GEMINI_API_KEY" => Some("gm-key".into()),
            "TWITTER_BEARER_TOKEN" => Some("tw-token".into()),
            "POSTCLAW_MODEL" => Some("gemini-2.5-flash".into()),
            _ => None,
        });
        assert_eq!(config.api_key.as_deref(), Some("gm-key"));
        assert_eq!(config.social.bearer_token.as_deref(), Some("tw-token"));
        assert_eq!(config.default_model, "gemini-2.5-flash");
        assert_eq!(config.default_provider, "gemini");
    }

    #[test]
    fn file_secrets_beat_env() {
        let mut config = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        config.apply_env_overrides(|key| (key == "POSTCLAW_API_KEY").then(|| "from-env".to_string()));
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = AppConfig {
            api_key: Some("super-secret".into()),
            ..AppConfig::default()
        };
        config.social.bearer_token = Some("bearer-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("bearer-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gemini"));
        assert!(toml_str.contains("createPost"));
    }
}
