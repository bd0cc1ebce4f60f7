//! Assistant client abstraction and provider selection
//!
//! This module provides the single capability the research pipeline depends on:
//! - **ask**: an unstructured request answered with free text
//! - **structured_ask**: a request whose answer must satisfy a JSON schema
//!
//! Providers are plain REST clients built on `reqwest`:
//! - **Gemini**: Google Generative Language API, with search grounding
//! - **OpenAI**: any OpenAI-compatible chat completions endpoint

use crate::types::{AppError, ResourceMode, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Generic assistant trait for provider abstraction
///
/// Implementations must be safe to call concurrently from every worker pool
/// in a pipeline run; the pipeline applies no client-side locking.
#[async_trait]
pub trait Assistant: Send + Sync {
    /// Answer a request with free text, using `persona` as the system instruction
    async fn ask(&self, persona: &str, request: &str) -> Result<String>;

    /// Answer a request with JSON that satisfies `schema`
    ///
    /// Returns [`AppError::SchemaParse`] when the response is not valid JSON.
    async fn structured_ask(&self, persona: &str, request: &str, schema: &Value) -> Result<Value>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// One model identifier per [`ResourceMode`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTiers {
    pub minimal: String,
    pub basic: String,
    pub pro: String,
}

impl ModelTiers {
    /// Tiers used by Gemini when none are configured
    pub fn gemini_defaults() -> Self {
        Self {
            minimal: "gemini-flash-lite-latest".to_string(),
            basic: "gemini-flash-latest".to_string(),
            pro: "gemini-pro-latest".to_string(),
        }
    }

    /// Tiers used by OpenAI-compatible endpoints when none are configured
    pub fn openai_defaults() -> Self {
        Self {
            minimal: "gpt-4o-mini".to_string(),
            basic: "gpt-4o".to_string(),
            pro: "gpt-4.1".to_string(),
        }
    }

    /// Model identifier for a resource mode
    pub fn for_mode(&self, mode: ResourceMode) -> &str {
        match mode {
            ResourceMode::Minimal => &self.minimal,
            ResourceMode::Basic => &self.basic,
            ResourceMode::Pro => &self.pro,
        }
    }
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum Provider {
    /// Google Generative Language API
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::Gemini {
    ///     api_key: "AIza...".to_string(),
    ///     api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
    ///     models: ModelTiers::gemini_defaults(),
    /// };
    /// ```
    Gemini {
        api_key: String,
        api_base: String,
        models: ModelTiers,
    },

    /// OpenAI API provider (including OpenRouter and other compatible APIs)
    OpenAI {
        api_key: String,
        api_base: String,
        models: ModelTiers,
    },
}

impl Provider {
    /// Create a client instance for this provider at the given model tier
    ///
    /// # Errors
    ///
    /// Returns an error if the provider was compiled out or the HTTP client
    /// cannot be built.
    pub fn create_client(&self, mode: ResourceMode, timeout: Duration) -> Result<Arc<dyn Assistant>> {
        match self {
            #[cfg(feature = "gemini")]
            Provider::Gemini {
                api_key,
                api_base,
                models,
            } => Ok(Arc::new(super::gemini::GeminiClient::new(
                api_key.clone(),
                api_base.clone(),
                models.for_mode(mode).to_string(),
                timeout,
            )?)),

            #[cfg(feature = "openai")]
            Provider::OpenAI {
                api_key,
                api_base,
                models,
            } => Ok(Arc::new(super::openai::OpenAIClient::new(
                api_key.clone(),
                api_base.clone(),
                models.for_mode(mode).to_string(),
                timeout,
            )?)),

            #[allow(unreachable_patterns)]
            other => Err(AppError::Configuration(format!(
                "{} provider support was not compiled in (mode {}, timeout {:?})",
                other.name(),
                mode,
                timeout
            ))),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Gemini { .. } => "Gemini",
            Provider::OpenAI { .. } => "OpenAI",
        }
    }
}

/// Map a transport error into an assistant error
pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Assistant(format!("{} request timed out: {}", provider, err))
    } else {
        AppError::Assistant(format!("{} request failed: {}", provider, err))
    }
}

/// Parse the text of a structured response as JSON
pub(crate) fn parse_json_response(provider: &str, text: &str) -> Result<Value> {
    let trimmed = strip_code_fence(text);
    serde_json::from_str(trimmed).map_err(|e| {
        AppError::SchemaParse(format!("{} returned invalid JSON: {}", provider, e))
    })
}

/// Some models wrap JSON in a markdown code fence even when asked not to
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
