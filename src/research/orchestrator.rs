use crate::llm::Assistant;
use crate::pipeline::{queue, Pipeline, WorkerGauge};
use crate::research::context::ResearchContext;
use crate::research::models::{ResearchItem, ResearchPlan, ResearchReport, ResearchResult, Section};
use crate::research::refinement::{refine, refine_staged};
use crate::research::settings::{PipelineSettings, PipelineShape};
use crate::research::synthesis::Synthesizer;
use crate::types::{AppError, ResearchDepth, Result};
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

/// Runs a topic through planning, research, synthesis, editing and titling
///
/// # Example
///
/// ```ignore
/// let orchestrator = ResearchOrchestrator::new(assistant)?
///     .with_settings(PipelineSettings::default().with_shape(PipelineShape::Staged));
///
/// let token = CancellationToken::new();
/// let report = orchestrator
///     .research_topic("Forth programming language", ResearchDepth::Long, &token)
///     .await?;
/// println!("{}", report.title);
/// ```
pub struct ResearchOrchestrator {
    ctx: ResearchContext,
    settings: PipelineSettings,
    synthesizer: Arc<dyn Synthesizer>,
    span: Span,
    gauge: WorkerGauge,
}

impl ResearchOrchestrator {
    pub fn new(assistant: Arc<dyn Assistant>) -> Result<Self> {
        Ok(Self::with_context(ResearchContext::new(assistant)?))
    }

    pub fn with_context(ctx: ResearchContext) -> Self {
        let settings = PipelineSettings::default();
        Self {
            ctx,
            synthesizer: settings.synthesis.synthesizer(),
            settings,
            span: tracing::info_span!("research"),
            gauge: WorkerGauge::new(),
        }
    }

    /// Replace the settings; also selects the synthesizer for the new mode
    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.synthesizer = settings.synthesis.synthesizer();
        self.settings = settings;
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn Synthesizer>) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    /// Span every log event of a run is recorded under
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Gauge counting every worker this orchestrator starts
    pub fn gauge(&self) -> WorkerGauge {
        self.gauge.clone()
    }

    pub fn active_workers(&self) -> usize {
        self.gauge.get()
    }

    /// Research a topic and return the finished report
    ///
    /// Cancelling `token` stops every stage; the call then returns
    /// [`AppError::Cancelled`] once all workers have exited.
    pub async fn research_topic(
        &self,
        topic: &str,
        depth: ResearchDepth,
        token: &CancellationToken,
    ) -> Result<ResearchReport> {
        self.settings.validate()?;

        let topic = topic.trim();
        if topic.is_empty() {
            return Err(AppError::InvalidInput("topic is required".to_string()));
        }

        let run = async {
            tracing::info!(
                topic,
                %depth,
                shape = %self.settings.shape,
                research_concurrency = self.settings.research_concurrency,
                synthesis_concurrency = self.settings.synthesis_concurrency,
                edit_concurrency = self.settings.edit_concurrency,
                "research_started"
            );

            let report = match self.settings.shape {
                PipelineShape::Simple => self.research_simple(topic, depth, token).await,
                PipelineShape::Staged => self.research_staged(topic, depth, token).await,
            };

            match &report {
                Ok(report) => tracing::info!(
                    title = %report.title,
                    sections = report.sections.len(),
                    "research_finished"
                ),
                Err(e) if e.is_cancelled() => tracing::warn!("research_cancelled"),
                Err(e) => tracing::error!(stage = e.stage(), error = %e, "research_failed"),
            }

            report
        };

        run.instrument(self.span.clone()).await
    }

    /// Plan up front, fan out one task per subtopic, then write the report
    async fn research_simple(
        &self,
        topic: &str,
        depth: ResearchDepth,
        token: &CancellationToken,
    ) -> Result<ResearchReport> {
        let plan = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(AppError::Cancelled),
            plan = self.ctx.plan(topic) => plan?,
        };

        let results = self.research_items(&plan, depth, token).await?;
        let results = self.settings.failed_subtopics.apply(results)?;

        let goal: Arc<str> = Arc::from(plan.goal.as_str());
        let capacity = self.settings.queue_capacity;

        let mut pipeline = self.pipeline(token);
        let results = pipeline.source("results", capacity, move |emit| async move {
            for result in results {
                emit.emit((goal.clone(), result)).await?;
            }
            Ok::<(), AppError>(())
        });

        self.write_report(pipeline, results).await
    }

    /// Run every subtopic's refinement loop in its own task
    ///
    /// Waits for all of them; a failed subtopic does not stop the others.
    async fn research_items(
        &self,
        plan: &ResearchPlan,
        depth: ResearchDepth,
        token: &CancellationToken,
    ) -> Result<Vec<ResearchResult>> {
        let (tx, mut rx) = queue::<ResearchResult>(plan.items.len());
        let goal: Arc<str> = Arc::from(plan.goal.as_str());
        let mut tasks = JoinSet::new();

        for item in plan.items.iter().cloned() {
            let ctx = self.ctx.clone();
            let goal = goal.clone();
            let tx = tx.clone();
            let token = token.clone();
            let guard = self.gauge.enter();

            tasks.spawn(
                async move {
                    let _guard = guard;
                    let subtopic = item.subtopic.clone();

                    let result = tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            let mut result = ResearchResult::new(subtopic);
                            result.error = Some(AppError::Cancelled);
                            result
                        }
                        result = refine(&ctx, &goal, item, depth) => result,
                    };

                    // sized to the item count, so this never waits
                    if tx.send(result).await.is_err() {
                        tracing::debug!("results_receiver_dropped");
                    }
                }
                .instrument(Span::current()),
            );
        }
        drop(tx);

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    return Err(AppError::Stage {
                        stage: "research",
                        source: Box::new(AppError::Internal(format!(
                            "subtopic task panicked: {}",
                            e
                        ))),
                    });
                }
            }
        }

        let mut results = Vec::with_capacity(plan.items.len());
        while let Some(result) = rx.recv().await {
            results.push(result);
        }

        if token.is_cancelled() || results.iter().any(ResearchResult::is_cancelled) {
            return Err(AppError::Cancelled);
        }

        let failed = results.iter().filter(|r| r.is_failed()).count();
        tracing::info!(subtopics = results.len(), failed, "subtopics_researched");

        Ok(results)
    }

    /// Every step is a stage, including each subtopic's refinement loop
    async fn research_staged(
        &self,
        topic: &str,
        depth: ResearchDepth,
        token: &CancellationToken,
    ) -> Result<ResearchReport> {
        let settings = &self.settings;
        let mut pipeline = self.pipeline(token);

        let ctx = self.ctx.clone();
        let topic = topic.to_string();
        let items = pipeline.source("plan", 1, move |emit| async move {
            let plan = ctx.plan(&topic).await?;
            let goal: Arc<str> = Arc::from(plan.goal);
            for item in plan.items {
                emit.emit((goal.clone(), item)).await?;
            }
            Ok::<(), AppError>(())
        });

        let ctx = self.ctx.clone();
        let nested_parent = pipeline.token();
        let gauge = self.gauge.clone();
        let policy = settings.failed_subtopics;
        let results = pipeline.parallel_filter_map(
            "research",
            items,
            settings.queue_capacity,
            settings.research_concurrency,
            move |(goal, item): (Arc<str>, ResearchItem)| {
                let ctx = ctx.clone();
                let parent = nested_parent.clone();
                let gauge = gauge.clone();
                async move {
                    let result = refine_staged(ctx, goal.to_string(), item, depth, &parent, gauge).await?;
                    Ok::<_, AppError>(policy.screen(result)?.map(|result| (goal, result)))
                }
            },
        );

        self.write_report(pipeline, results).await
    }

    /// Synthesis, edit, aggregation and titling stages, then wait for the report
    async fn write_report(
        &self,
        mut pipeline: Pipeline,
        results: Receiver<(Arc<str>, ResearchResult)>,
    ) -> Result<ResearchReport> {
        let settings = &self.settings;

        let ctx = self.ctx.clone();
        let synthesizer = self.synthesizer.clone();
        let sections = pipeline.parallel_transform(
            "synthesize",
            results,
            settings.queue_capacity,
            settings.synthesis_concurrency,
            move |(goal, result): (Arc<str>, ResearchResult)| {
                let ctx = ctx.clone();
                let synthesizer = synthesizer.clone();
                async move { ctx.synthesize_section(synthesizer.as_ref(), &goal, &result).await }
            },
        );

        let ctx = self.ctx.clone();
        let edited = pipeline.parallel_transform(
            "edit",
            sections,
            settings.queue_capacity,
            settings.edit_concurrency,
            move |section: Section| {
                let ctx = ctx.clone();
                async move { ctx.edit_section(section).await }
            },
        );

        let aggregated = pipeline.aggregate("aggregate", edited, settings.aggregate_capacity);

        let ctx = self.ctx.clone();
        let mode = settings.titling;
        let titled = pipeline.transform("title", aggregated, settings.aggregate_capacity, move |sections| {
            let ctx = ctx.clone();
            async move { ctx.compose_report(sections, mode).await }
        });

        pipeline
            .collect(titled)
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("pipeline finished without a report".to_string()))
    }

    fn pipeline(&self, token: &CancellationToken) -> Pipeline {
        Pipeline::new(token)
            .with_gauge(self.gauge.clone())
            .with_span(Span::current())
    }
}

impl std::fmt::Debug for ResearchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchOrchestrator")
            .field("ctx", &self.ctx)
            .field("settings", &self.settings)
            .field("synthesizer", &self.synthesizer.name())
            .finish()
    }
}
