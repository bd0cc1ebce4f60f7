//! Queued research jobs
//!
//! A job arrives as base64-encoded JSON (or plain JSON), names a topic, a
//! model tier and a depth, and ends with a published report and one
//! notification. Whatever transport delivers the payload is outside this
//! module.

use crate::llm::Assistant;
use crate::notify::{LogNotifier, Notifier};
use crate::publish::{Publisher, TelegraphPublisher};
use crate::research::{PipelineSettings, ResearchOrchestrator};
use crate::types::{AppError, PublishedReport, ResearchRequest, ResourceMode, Result};
use crate::utils::toml_config::DossierConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Builds the assistant for a request's model tier
pub type AssistantFactory = Arc<dyn Fn(ResourceMode) -> Result<Arc<dyn Assistant>> + Send + Sync>;

/// Research, publish and notify for one request at a time
pub struct ResearchJob {
    assistants: AssistantFactory,
    settings: PipelineSettings,
    publisher: Arc<dyn Publisher>,
    notifier: Arc<dyn Notifier>,
}

impl ResearchJob {
    pub fn new(
        assistants: AssistantFactory,
        publisher: Arc<dyn Publisher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            assistants,
            settings: PipelineSettings::default(),
            publisher,
            notifier,
        }
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Wire a job from configuration: configured provider, Telegraph
    /// publisher, and SMTP notifier when `[notify]` is enabled
    pub fn from_config(config: &DossierConfig) -> Result<Self> {
        let provider = config.provider()?;
        let timeout = config.assistant.timeout();
        let assistants: AssistantFactory =
            Arc::new(move |mode: ResourceMode| provider.create_client(mode, timeout));

        Ok(Self::new(assistants, publisher_from_config(config)?, notifier_from_config(config)?)
            .with_settings(config.pipeline.clone()))
    }

    /// Run a job from a base64-encoded JSON payload
    pub async fn run_base64(&self, payload: &str, token: &CancellationToken) -> Result<PublishedReport> {
        let request = ResearchRequest::from_base64(payload).inspect_err(|e| {
            tracing::error!(error = %e, "invalid_job_payload");
        })?;
        self.run(request, token).await
    }

    /// Run a job from a JSON body
    pub async fn run_json(&self, body: &[u8], token: &CancellationToken) -> Result<PublishedReport> {
        let request = ResearchRequest::from_json(body).inspect_err(|e| {
            tracing::error!(error = %e, "invalid_job_payload");
        })?;
        self.run(request, token).await
    }

    /// Research the request's topic, publish the report, then notify once
    pub async fn run(&self, request: ResearchRequest, token: &CancellationToken) -> Result<PublishedReport> {
        request.validate()?;

        let span = tracing::info_span!("research_job", request_id = %request.request_id);
        self.process(request, token, span.clone()).instrument(span).await
    }

    async fn process(
        &self,
        request: ResearchRequest,
        token: &CancellationToken,
        span: tracing::Span,
    ) -> Result<PublishedReport> {
        let topic = request.topic.as_str();
        tracing::info!(
            topic,
            mode = %request.resource_mode,
            depth = %request.research_depth,
            "processing_research_job"
        );

        let assistant = (self.assistants)(request.resource_mode)?;
        let orchestrator = ResearchOrchestrator::new(assistant)?
            .with_settings(self.settings.clone())
            .with_span(span);

        let report = orchestrator
            .research_topic(topic, request.research_depth, token)
            .await
            .inspect_err(|e| tracing::error!(topic, error = %e, "failed_researching_topic"))?;

        let url = self.publisher.publish(&report).await.inspect_err(|e| {
            tracing::error!(topic, report_title = %report.title, error = %e, "failed_posting_research_report");
        })?;

        if url.trim().is_empty() {
            tracing::error!(topic, report_title = %report.title, "published_url_is_empty");
            return Err(AppError::Publish("published URL is empty".to_string()));
        }

        tracing::info!(topic, report_title = %report.title, url = %url, "research_report_posted");

        self.notifier.notify(&report.title, &url).await.inspect_err(|e| {
            tracing::error!(
                topic,
                report_title = %report.title,
                url = %url,
                error = %e,
                "failed_sending_notification"
            );
        })?;

        tracing::info!(topic, report_title = %report.title, url = %url, "research_job_completed");

        Ok(PublishedReport {
            request_id: request.request_id,
            title: report.title,
            url,
        })
    }
}

/// Telegraph publisher with the token and author resolved from the environment
pub fn publisher_from_config(config: &DossierConfig) -> Result<Arc<dyn Publisher>> {
    let publish = &config.publish;
    let token = config.require_env(&publish.access_token_env)?;
    let author = config.resolve_env(&publish.author_name_env);

    let publisher = TelegraphPublisher::new(
        token,
        author,
        publish.api_base.clone(),
        config.assistant.timeout(),
    )?;
    Ok(Arc::new(publisher))
}

/// SMTP notifier when `[notify]` is enabled, otherwise a log-only notifier
pub fn notifier_from_config(config: &DossierConfig) -> Result<Arc<dyn Notifier>> {
    if !config.notify.enabled {
        return Ok(Arc::new(LogNotifier));
    }

    smtp_notifier(config)
}

#[cfg(feature = "smtp")]
fn smtp_notifier(config: &DossierConfig) -> Result<Arc<dyn Notifier>> {
    use crate::notify::{SmtpNotifier, SmtpSettings};

    let notify = &config.notify;
    let port = config.require_env(&notify.smtp_port_env)?;
    let port = port.trim().parse::<u16>().map_err(|e| {
        AppError::Configuration(format!("invalid SMTP port '{}': {}", port, e))
    })?;

    let settings = SmtpSettings {
        server: config.require_env(&notify.smtp_server_env)?,
        port,
        sender: config.require_env(&notify.sender_email_env)?,
        password: config.require_env(&notify.sender_password_env)?,
        recipient: config.require_env(&notify.recipient_email_env)?,
    };

    Ok(Arc::new(SmtpNotifier::new(settings)?))
}

#[cfg(not(feature = "smtp"))]
fn smtp_notifier(_config: &DossierConfig) -> Result<Arc<dyn Notifier>> {
    Err(AppError::Configuration(
        "email notification requires the 'smtp' feature".to_string(),
    ))
}
