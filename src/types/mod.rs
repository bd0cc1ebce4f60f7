use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============= Job Request Types =============

/// A research job as decoded from whatever transport triggered it.
///
/// The queue wire format encodes `resource_mode` and `research_depth` as
/// integers; names are accepted as well.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchRequest {
    #[serde(default)]
    pub request_id: String,
    pub topic: String,
    #[serde(default)]
    pub resource_mode: ResourceMode,
    #[serde(default)]
    pub research_depth: ResearchDepth,
}

impl ResearchRequest {
    /// Create a request with a fresh request id
    pub fn new(topic: impl Into<String>, mode: ResourceMode, depth: ResearchDepth) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            topic: topic.into(),
            resource_mode: mode,
            research_depth: depth,
        }
    }

    /// Decode a request from a JSON body
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| AppError::InvalidInput(format!("failed to parse research request: {}", e)))
    }

    /// Decode a request from base64-encoded JSON (queued message payloads)
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| {
                AppError::InvalidInput(format!("failed to decode base64 request data: {}", e))
            })?;

        Self::from_json(&decoded)
    }

    /// Encode as base64 JSON, the inverse of [`ResearchRequest::from_base64`]
    pub fn to_base64(&self) -> Result<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| AppError::Internal(format!("failed to encode research request: {}", e)))?;
        Ok(base64::engine::general_purpose::STANDARD.encode(json))
    }

    /// Check required fields before the pipeline is invoked
    pub fn validate(&self) -> Result<()> {
        if self.request_id.trim().is_empty() {
            return Err(AppError::InvalidInput("request_id is required".to_string()));
        }
        if self.topic.trim().is_empty() {
            return Err(AppError::InvalidInput("topic is required".to_string()));
        }
        Ok(())
    }
}

/// Outcome of a completed research job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishedReport {
    pub request_id: String,
    pub title: String,
    pub url: String,
}

// ============= Closed Enumerations =============

/// Wire representation accepted for the closed enumerations
#[derive(Deserialize)]
#[serde(untagged)]
enum EnumRepr {
    Index(u8),
    Name(String),
}

/// Controls how many refinement iterations a subtopic may run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "EnumRepr", into = "u8")]
pub enum ResearchDepth {
    #[default]
    Short,
    Medium,
    Long,
}

impl ResearchDepth {
    /// Maximum number of follow-up gathering rounds after the initial one
    pub fn max_iterations(self) -> usize {
        match self {
            ResearchDepth::Short => 0,
            ResearchDepth::Medium => 2,
            ResearchDepth::Long => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResearchDepth::Short => "short",
            ResearchDepth::Medium => "medium",
            ResearchDepth::Long => "long",
        }
    }
}

impl TryFrom<u8> for ResearchDepth {
    type Error = AppError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ResearchDepth::Short),
            1 => Ok(ResearchDepth::Medium),
            2 => Ok(ResearchDepth::Long),
            other => Err(AppError::InvalidInput(format!(
                "invalid research depth: {}",
                other
            ))),
        }
    }
}

impl FromStr for ResearchDepth {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "short" | "basic" | "0" => Ok(ResearchDepth::Short),
            "medium" | "1" => Ok(ResearchDepth::Medium),
            "long" | "2" => Ok(ResearchDepth::Long),
            other => Err(AppError::InvalidInput(format!(
                "invalid research depth '{}': must be one of short, medium, long",
                other
            ))),
        }
    }
}

impl TryFrom<EnumRepr> for ResearchDepth {
    type Error = AppError;

    fn try_from(repr: EnumRepr) -> Result<Self> {
        match repr {
            EnumRepr::Index(i) => Self::try_from(i),
            EnumRepr::Name(name) => name.parse(),
        }
    }
}

impl From<ResearchDepth> for u8 {
    fn from(depth: ResearchDepth) -> u8 {
        match depth {
            ResearchDepth::Short => 0,
            ResearchDepth::Medium => 1,
            ResearchDepth::Long => 2,
        }
    }
}

impl fmt::Display for ResearchDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selects the assistant model tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "EnumRepr", into = "u8")]
pub enum ResourceMode {
    Minimal,
    #[default]
    Basic,
    Pro,
}

impl ResourceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceMode::Minimal => "minimal",
            ResourceMode::Basic => "basic",
            ResourceMode::Pro => "pro",
        }
    }
}

impl TryFrom<u8> for ResourceMode {
    type Error = AppError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ResourceMode::Minimal),
            1 => Ok(ResourceMode::Basic),
            2 => Ok(ResourceMode::Pro),
            other => Err(AppError::InvalidInput(format!(
                "invalid resource mode: {}",
                other
            ))),
        }
    }
}

impl FromStr for ResourceMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "minimal" | "0" => Ok(ResourceMode::Minimal),
            "basic" | "1" => Ok(ResourceMode::Basic),
            "pro" | "2" => Ok(ResourceMode::Pro),
            other => Err(AppError::InvalidInput(format!(
                "invalid resource mode '{}': must be one of minimal, basic, pro",
                other
            ))),
        }
    }
}

impl TryFrom<EnumRepr> for ResourceMode {
    type Error = AppError;

    fn try_from(repr: EnumRepr) -> Result<Self> {
        match repr {
            EnumRepr::Index(i) => Self::try_from(i),
            EnumRepr::Name(name) => name.parse(),
        }
    }
}

impl From<ResourceMode> for u8 {
    fn from(mode: ResourceMode) -> u8 {
        match mode {
            ResourceMode::Minimal => 0,
            ResourceMode::Basic => 1,
            ResourceMode::Pro => 2,
        }
    }
}

impl fmt::Display for ResourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============= Error Types =============

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    #[error("Template error: {0}")]
    Template(String),

    #[error("Assistant error: {0}")]
    Assistant(String),

    #[error("Schema parse error: {0}")]
    SchemaParse(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Planning failed: {0}")]
    Planning(Box<AppError>),

    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<AppError>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wrap an error with the name of the stage it escaped from.
    ///
    /// Cancellation is never wrapped so it stays recognisable to callers.
    pub fn in_stage(self, stage: &'static str) -> Self {
        match self {
            AppError::Cancelled => AppError::Cancelled,
            AppError::Stage { .. } | AppError::Planning(_) => self,
            other => AppError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// True when this error (or the error it wraps) is a cancellation
    pub fn is_cancelled(&self) -> bool {
        match self {
            AppError::Cancelled => true,
            AppError::Planning(inner) => inner.is_cancelled(),
            AppError::Stage { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Name of the failed stage, if this error carries one
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            AppError::Stage { stage, .. } => Some(stage),
            AppError::Planning(_) => Some("plan"),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_iterations_table() {
        assert_eq!(ResearchDepth::Short.max_iterations(), 0);
        assert_eq!(ResearchDepth::Medium.max_iterations(), 2);
        assert_eq!(ResearchDepth::Long.max_iterations(), 5);
    }

    #[test]
    fn test_request_decodes_integer_enums() {
        let json = br#"{"request_id":"r-1","topic":"Forth","resource_mode":2,"research_depth":1}"#;
        let request = ResearchRequest::from_json(json).unwrap();

        assert_eq!(request.resource_mode, ResourceMode::Pro);
        assert_eq!(request.research_depth, ResearchDepth::Medium);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_decodes_named_enums() {
        let json = br#"{"request_id":"r-1","topic":"Forth","resource_mode":"minimal","research_depth":"long"}"#;
        let request = ResearchRequest::from_json(json).unwrap();

        assert_eq!(request.resource_mode, ResourceMode::Minimal);
        assert_eq!(request.research_depth, ResearchDepth::Long);
    }

    #[test]
    fn test_request_rejects_unknown_depth() {
        let json = br#"{"request_id":"r-1","topic":"Forth","research_depth":7}"#;
        let err = ResearchRequest::from_json(json).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_request_base64_payload() {
        let request = ResearchRequest::new("Forth", ResourceMode::Basic, ResearchDepth::Long);
        let encoded = request.to_base64().unwrap();

        let decoded = ResearchRequest::from_base64(&encoded).unwrap();
        assert_eq!(decoded, request);

        assert!(ResearchRequest::from_base64("not base64!!").is_err());
    }

    #[test]
    fn test_request_validation() {
        let mut request = ResearchRequest::new("Forth", ResourceMode::Basic, ResearchDepth::Short);
        request.request_id.clear();
        assert!(request.validate().is_err());

        let request = ResearchRequest::new("   ", ResourceMode::Basic, ResearchDepth::Short);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_cancellation_survives_wrapping() {
        assert!(matches!(AppError::Cancelled.in_stage("edit"), AppError::Cancelled));

        let wrapped = AppError::Planning(Box::new(AppError::Cancelled));
        assert!(wrapped.is_cancelled());

        let stage = AppError::Assistant("boom".into()).in_stage("title");
        assert_eq!(stage.stage(), Some("title"));
        assert!(!stage.is_cancelled());
        assert!(stage.to_string().contains("title"));
    }
}
