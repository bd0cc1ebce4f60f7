//! TOML-based configuration for Dossier
//!
//! Providers, pipeline tuning, publishing, notification and logging are
//! declared in a TOML file (`dossier.toml`). Every field has a default, so an
//! empty or missing file is a valid configuration. Secrets are never stored in
//! the file; it names the environment variables that hold them.

use crate::llm::{ModelTiers, Provider};
use crate::research::PipelineSettings;
use crate::types::AppError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure loaded from dossier.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DossierConfig {
    #[serde(default)]
    pub assistant: AssistantConfig,

    #[serde(default)]
    pub pipeline: PipelineSettings,

    #[serde(default)]
    pub publish: PublishConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// ============= Assistant Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AssistantConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Gemini {
        /// Environment variable containing API key
        #[serde(default = "default_gemini_key_env")]
        api_key_env: String,
        #[serde(default = "default_gemini_base")]
        api_base: String,
        #[serde(default = "ModelTiers::gemini_defaults")]
        models: ModelTiers,
    },
    OpenAI {
        /// Environment variable containing API key
        #[serde(default = "default_openai_key_env")]
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
        #[serde(default = "ModelTiers::openai_defaults")]
        models: ModelTiers,
    },
}

fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_gemini_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Gemini {
            api_key_env: default_gemini_key_env(),
            api_base: default_gemini_base(),
            models: ModelTiers::gemini_defaults(),
        }
    }
}

impl ProviderConfig {
    pub fn api_key_env(&self) -> &str {
        match self {
            ProviderConfig::Gemini { api_key_env, .. } | ProviderConfig::OpenAI { api_key_env, .. } => {
                api_key_env
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProviderConfig::Gemini { .. } => "gemini",
            ProviderConfig::OpenAI { .. } => "openai",
        }
    }
}

// ============= Publishing Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Publish finished reports (the CLI can also enable this per run)
    #[serde(default)]
    pub enabled: bool,

    /// Environment variable containing the Telegraph access token
    #[serde(default = "default_telegraph_token_env")]
    pub access_token_env: String,

    /// Environment variable containing the author name shown on pages
    #[serde(default = "default_telegraph_author_env")]
    pub author_name_env: String,

    #[serde(default = "default_telegraph_base")]
    pub api_base: String,
}

fn default_telegraph_token_env() -> String {
    "TELEGRAPH_API_KEY".to_string()
}

fn default_telegraph_author_env() -> String {
    "TELEGRAPH_AUTHOR_NAME".to_string()
}

fn default_telegraph_base() -> String {
    "https://api.telegra.ph".to_string()
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            access_token_env: default_telegraph_token_env(),
            author_name_env: default_telegraph_author_env(),
            api_base: default_telegraph_base(),
        }
    }
}

// ============= Notification Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Send an email once a report is published; otherwise only log it
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_smtp_server_env")]
    pub smtp_server_env: String,

    #[serde(default = "default_smtp_port_env")]
    pub smtp_port_env: String,

    #[serde(default = "default_sender_env")]
    pub sender_email_env: String,

    #[serde(default = "default_password_env")]
    pub sender_password_env: String,

    #[serde(default = "default_recipient_env")]
    pub recipient_email_env: String,
}

fn default_smtp_server_env() -> String {
    "MAIL_SMTP_SERVER".to_string()
}

fn default_smtp_port_env() -> String {
    "MAIL_SMTP_PORT".to_string()
}

fn default_sender_env() -> String {
    "MAIL_SENDER_EMAIL".to_string()
}

fn default_password_env() -> String {
    "MAIL_SENDER_PASSWORD".to_string()
}

fn default_recipient_env() -> String {
    "MAIL_RECIPIENT_EMAIL".to_string()
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_server_env: default_smtp_server_env(),
            smtp_port_env: default_smtp_port_env(),
            sender_email_env: default_sender_env(),
            sender_password_env: default_password_env(),
            recipient_email_env: default_recipient_env(),
        }
    }
}

impl NotifyConfig {
    fn env_names(&self) -> [&str; 5] {
        [
            self.smtp_server_env.as_str(),
            self.smtp_port_env.as_str(),
            self.sender_email_env.as_str(),
            self.sender_password_env.as_str(),
            self.recipient_email_env.as_str(),
        ]
    }
}

// ============= Logging Configuration =============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Also write JSON logs to this file
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

// ============= Errors =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

// ============= Loading and Validation =============

impl DossierConfig {
    /// Load configuration from a TOML file
    ///
    /// A missing file yields the defaults. Environment variables are only
    /// checked by [`DossierConfig::validate`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!(path = %path.display(), "config_file_missing_using_defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: DossierConfig = toml::from_str(content)?;
        config.validate_structure()?;
        Ok(config)
    }

    /// Checks that do not depend on the environment
    pub fn validate_structure(&self) -> Result<(), ConfigError> {
        self.pipeline
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.assistant.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "assistant.timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Full validation, including the environment variables that enabled
    /// features depend on
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_structure()?;
        self.validate_env_var(self.assistant.provider.api_key_env())?;

        if self.publish.enabled {
            self.validate_env_var(&self.publish.access_token_env)?;
        }

        if self.notify.enabled {
            for name in self.notify.env_names() {
                self.validate_env_var(name)?;
            }
        }

        Ok(())
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// Resolve an environment variable value
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok().filter(|v| !v.is_empty())
    }

    /// Resolve a required environment variable
    pub fn require_env(&self, env_name: &str) -> Result<String, ConfigError> {
        self.resolve_env(env_name)
            .ok_or_else(|| ConfigError::MissingEnvVar(env_name.to_string()))
    }

    /// Build the runtime provider description, resolving its API key
    pub fn provider(&self) -> Result<Provider, ConfigError> {
        let provider = match &self.assistant.provider {
            ProviderConfig::Gemini {
                api_key_env,
                api_base,
                models,
            } => Provider::Gemini {
                api_key: self.require_env(api_key_env)?,
                api_base: api_base.clone(),
                models: models.clone(),
            },
            ProviderConfig::OpenAI {
                api_key_env,
                api_base,
                models,
            } => Provider::OpenAI {
                api_key: self.require_env(api_key_env)?,
                api_base: api_base.clone(),
                models: models.clone(),
            },
        };

        Ok(provider)
    }
}
