use crate::publish::Publisher;
use crate::research::ResearchReport;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.telegra.ph";

/// Publishes reports as Telegraph pages via `createPage`
pub struct TelegraphPublisher {
    http: reqwest::Client,
    api_base: String,
    access_token: String,
    author_name: Option<String>,
}

impl TelegraphPublisher {
    pub fn new(
        access_token: String,
        author_name: Option<String>,
        api_base: String,
        timeout: Duration,
    ) -> Result<Self> {
        if access_token.trim().is_empty() {
            return Err(AppError::Configuration(
                "Telegraph access token is empty".to_string(),
            ));
        }

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
            api_base,
            access_token,
            author_name: author_name.filter(|name| !name.trim().is_empty()),
        })
    }
}

#[async_trait]
impl Publisher for TelegraphPublisher {
    async fn publish(&self, report: &ResearchReport) -> Result<String> {
        let content = serde_json::to_string(&page_content(report))
            .map_err(|e| AppError::Publish(format!("failed to encode page content: {}", e)))?;

        let mut form = vec![
            ("access_token", self.access_token.as_str()),
            ("title", report.title.as_str()),
            ("content", content.as_str()),
            ("return_content", "false"),
        ];
        if let Some(author) = &self.author_name {
            form.push(("author_name", author.as_str()));
        }

        let url = format!("{}/createPage", self.api_base);
        let response = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::Publish(format!("Telegraph request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Publish(format!("failed to read Telegraph response: {}", e)))?;

        let parsed: ApiResponse = serde_json::from_str(&body).map_err(|e| {
            AppError::Publish(format!(
                "failed to decode Telegraph response ({}): {}",
                status, e
            ))
        })?;

        if !parsed.ok {
            return Err(AppError::Publish(format!(
                "Telegraph API error: {}",
                parsed.error.unwrap_or_else(|| "unknown error".to_string())
            )));
        }

        let page_url = parsed.result.map(|page| page.url).unwrap_or_default();
        if page_url.trim().is_empty() {
            return Err(AppError::Publish("Telegraph returned an empty page URL".to_string()));
        }

        tracing::info!(title = %report.title, url = %page_url, "report_published");
        Ok(page_url)
    }
}

/// Telegraph DOM: an `h3` per section title, a `p` per paragraph
fn page_content(report: &ResearchReport) -> Vec<Node> {
    let mut nodes = Vec::new();
    for section in &report.sections {
        nodes.push(Node::element("h3", &section.title));
        for paragraph in &section.paragraphs {
            nodes.push(Node::element("p", paragraph));
        }
    }
    nodes
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
enum Node {
    Text(String),
    Element { tag: &'static str, children: Vec<Node> },
}

impl Node {
    fn element(tag: &'static str, text: &str) -> Self {
        Node::Element {
            tag,
            children: vec![Node::Text(text.to_string())],
        }
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<Page>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct Page {
    #[serde(default)]
    url: String,
}
