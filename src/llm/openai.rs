use crate::llm::client::{parse_json_response, transport_error, Assistant};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Key used to wrap schemas whose root is not an object
const WRAPPED_KEY: &str = "value";

/// Client for OpenAI-compatible `/chat/completions` endpoints
pub struct OpenAIClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl OpenAIClient {
    pub fn new(api_key: String, api_base: String, model: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        let api_base = if api_base.is_empty() {
            DEFAULT_API_BASE.to_string()
        } else {
            api_base.trim_end_matches('/').to_string()
        };

        Ok(Self {
            http,
            api_key,
            api_base,
            model,
        })
    }

    async fn complete(&self, request: &ChatRequest<'_>) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error("OpenAI", e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::Assistant(format!(
                "OpenAI API error ({}): {}",
                status, detail
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Assistant(format!("Failed to decode OpenAI response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| AppError::Assistant("No response from OpenAI".to_string()))
    }
}

#[async_trait]
impl Assistant for OpenAIClient {
    async fn ask(&self, persona: &str, request: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![Message::system(persona), Message::user(request)],
            response_format: None,
        };

        self.complete(&body).await
    }

    async fn structured_ask(&self, persona: &str, request: &str, schema: &Value) -> Result<Value> {
        // Strict mode requires an object at the root
        let wrapped = !is_object_schema(schema);
        let schema = if wrapped {
            json!({
                "type": "object",
                "properties": { WRAPPED_KEY: schema },
                "required": [WRAPPED_KEY],
                "additionalProperties": false,
            })
        } else {
            schema.clone()
        };

        let body = ChatRequest {
            model: &self.model,
            messages: vec![Message::system(persona), Message::user(request)],
            response_format: Some(json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "response",
                    "schema": schema,
                },
            })),
        };

        let text = self.complete(&body).await?;
        let mut value = parse_json_response("OpenAI", &text)?;

        if wrapped {
            value = value
                .get_mut(WRAPPED_KEY)
                .map(Value::take)
                .ok_or_else(|| {
                    AppError::SchemaParse(format!("OpenAI response is missing '{}'", WRAPPED_KEY))
                })?;
        }

        Ok(value)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn is_object_schema(schema: &Value) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("object")
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> Message<'a> {
    fn system(content: &'a str) -> Self {
        Self {
            role: "system",
            content,
        }
    }

    fn user(content: &'a str) -> Self {
        Self {
            role: "user",
            content,
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
