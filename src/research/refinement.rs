//! Per-subtopic knowledge refinement
//!
//! Iteration 0 always gathers knowledge for the plan's questions. Each
//! following iteration asks the assistant which gaps remain and gathers
//! knowledge for the follow-up questions, until the depth's iteration budget
//! is spent or the analysis returns no questions.
//!
//! The loop runs either directly inside one task ([`refine`]) or as a chain of
//! single-worker stages ([`refine_staged`]); both use the same steps and make
//! the same assistant calls.

use crate::pipeline::{Pipeline, WorkerGauge};
use crate::research::context::ResearchContext;
use crate::research::models::{Knowledge, ResearchItem, ResearchResult};
use crate::types::{AppError, ResearchDepth, Result};
use tokio_util::sync::CancellationToken;
use tracing::Span;

/// A subtopic's loop as it moves through the refinement steps
#[derive(Debug, Clone)]
pub struct RefinementState {
    pub goal: String,
    pub subtopic: String,
    /// Questions for the next gathering call
    pub questions: Vec<String>,
    pub knowledge: Vec<Knowledge>,
    pub error: Option<AppError>,
    /// Set once no further assistant calls should be made
    pub finished: bool,
    /// Gathering calls issued so far
    pub gathered: usize,
}

impl RefinementState {
    pub fn new(goal: impl Into<String>, item: ResearchItem) -> Self {
        Self {
            goal: goal.into(),
            subtopic: item.subtopic,
            questions: item.questions,
            knowledge: Vec::new(),
            error: None,
            finished: false,
            gathered: 0,
        }
    }

    fn record_failure(&mut self, step: &str, error: AppError) {
        tracing::warn!(
            subtopic = %self.subtopic,
            step,
            knowledge_count = self.knowledge.len(),
            error = %error,
            "refinement_failed"
        );
        self.error = Some(error);
        self.finished = true;
    }

    pub fn into_result(self) -> ResearchResult {
        ResearchResult {
            subtopic: self.subtopic,
            knowledge: self.knowledge,
            error: self.error,
        }
    }
}

/// Gather knowledge for the current questions
///
/// Does nothing once the state is finished. A failure is recorded on the
/// state and finishes it.
pub async fn gather_step(ctx: &ResearchContext, mut state: RefinementState) -> RefinementState {
    if state.finished {
        return state;
    }

    state.gathered += 1;
    match ctx.generate_knowledge(&state.subtopic, &state.questions).await {
        Ok(knowledge) => state.knowledge.extend(knowledge),
        Err(e) => state.record_failure("gather", e),
    }

    state
}

/// Ask for follow-up questions about the knowledge gathered so far
///
/// An empty answer finishes the state normally.
pub async fn analyze_step(ctx: &ResearchContext, mut state: RefinementState, iteration: usize) -> RefinementState {
    if state.finished {
        return state;
    }

    let analysis = ctx
        .analyze_knowledge(&state.goal, &state.subtopic, &state.questions, &state.knowledge)
        .await;

    match analysis {
        Ok(questions) if questions.is_empty() => {
            tracing::info!(subtopic = %state.subtopic, iteration, "knowledge_sufficient");
            state.finished = true;
        }
        Ok(questions) => {
            tracing::info!(
                subtopic = %state.subtopic,
                iteration,
                questions = questions.len(),
                "follow_up_questions"
            );
            state.questions = questions;
        }
        Err(e) => state.record_failure("analyze", e),
    }

    state
}

/// Run the refinement loop for one subtopic inside the calling task
///
/// Never fails: errors end the loop early and are recorded on the result,
/// which keeps the knowledge gathered before the failure.
pub async fn refine(
    ctx: &ResearchContext,
    goal: &str,
    item: ResearchItem,
    depth: ResearchDepth,
) -> ResearchResult {
    let max_iterations = depth.max_iterations();
    tracing::info!(subtopic = %item.subtopic, max_iterations, "researching_subtopic");

    let mut state = gather_step(ctx, RefinementState::new(goal, item)).await;

    for iteration in 1..=max_iterations {
        if state.finished {
            break;
        }
        state = analyze_step(ctx, state, iteration).await;
        state = gather_step(ctx, state).await;
    }

    log_finished(&state);
    state.into_result()
}

/// Run the refinement loop for one subtopic as its own pipeline
///
/// The loop is unrolled into a chain of single-worker stages,
/// `gather -> (analyze -> gather) x max_iterations`, joined by capacity-1
/// queues. Only cancellation is returned as an error; loop failures are
/// recorded on the result as with [`refine`].
pub async fn refine_staged(
    ctx: ResearchContext,
    goal: String,
    item: ResearchItem,
    depth: ResearchDepth,
    parent: &CancellationToken,
    gauge: WorkerGauge,
) -> Result<ResearchResult> {
    let max_iterations = depth.max_iterations();
    let subtopic = item.subtopic.clone();
    tracing::info!(subtopic = %subtopic, max_iterations, "researching_subtopic");

    let mut pipeline = Pipeline::new(parent)
        .with_gauge(gauge)
        .with_span(Span::current());

    let seed = RefinementState::new(goal, item);
    let mut states = pipeline.source("seed", 1, move |emit| async move { emit.emit(seed).await });

    states = pipeline.transform("gather", states, 1, gather_stage(ctx.clone()));
    for iteration in 1..=max_iterations {
        let analyze_ctx = ctx.clone();
        states = pipeline.transform("analyze", states, 1, move |state| {
            let ctx = analyze_ctx.clone();
            async move { Ok::<_, AppError>(analyze_step(&ctx, state, iteration).await) }
        });
        states = pipeline.transform("gather", states, 1, gather_stage(ctx.clone()));
    }

    let state = pipeline
        .collect(states)
        .await?
        .pop()
        .ok_or(AppError::Cancelled)?;

    log_finished(&state);
    Ok(state.into_result())
}

fn gather_stage(
    ctx: ResearchContext,
) -> impl Fn(RefinementState) -> futures::future::BoxFuture<'static, Result<RefinementState>> + Send + Sync + 'static {
    move |state| {
        let ctx = ctx.clone();
        Box::pin(async move { Ok(gather_step(&ctx, state).await) })
    }
}

fn log_finished(state: &RefinementState) {
    tracing::info!(
        subtopic = %state.subtopic,
        gathering_calls = state.gathered,
        knowledge_count = state.knowledge.len(),
        failed = state.error.is_some(),
        "subtopic_researched"
    );
}
