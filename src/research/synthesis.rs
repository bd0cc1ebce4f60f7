use crate::llm::structured::ask_for;
use crate::prompts::{ProseSynthesisArgs, StructuredSynthesisArgs, SynthesizeArgs, WRITER_PERSONA};
use crate::research::context::ResearchContext;
use crate::research::edit::split_paragraphs;
use crate::research::models::{ResearchResult, Section};
use crate::research::settings::SynthesisMode;
use crate::types::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

/// Turns one subtopic's knowledge into a report section
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, ctx: &ResearchContext, goal: &str, result: &ResearchResult) -> Result<Section>;

    fn name(&self) -> &'static str;
}

impl SynthesisMode {
    pub fn synthesizer(self) -> Arc<dyn Synthesizer> {
        match self {
            SynthesisMode::Structured => Arc::new(StructuredSynthesizer),
            SynthesisMode::Prose => Arc::new(ProseSynthesizer),
        }
    }
}

/// A paragraph as returned by structured synthesis
#[derive(Debug, Deserialize, JsonSchema)]
struct NamedParagraph {
    /// Short label for the paragraph
    #[allow(dead_code)]
    name: String,
    /// The paragraph text
    body: String,
}

/// Asks for a list of named paragraphs
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredSynthesizer;

#[async_trait]
impl Synthesizer for StructuredSynthesizer {
    async fn synthesize(&self, ctx: &ResearchContext, goal: &str, result: &ResearchResult) -> Result<Section> {
        let request = ctx.prompts().render(&StructuredSynthesisArgs(SynthesizeArgs {
            goal,
            subtopic: &result.subtopic,
            knowledge: &result.knowledge,
        }))?;

        let paragraphs: Vec<NamedParagraph> = ask_for(ctx.assistant(), WRITER_PERSONA, &request).await?;

        Ok(Section::new(
            result.subtopic.clone(),
            paragraphs
                .into_iter()
                .map(|p| p.body.trim().to_string())
                .filter(|body| !body.is_empty())
                .collect(),
        ))
    }

    fn name(&self) -> &'static str {
        "structured"
    }
}

/// Asks for free text and splits it on blank lines
#[derive(Debug, Clone, Copy, Default)]
pub struct ProseSynthesizer;

#[async_trait]
impl Synthesizer for ProseSynthesizer {
    async fn synthesize(&self, ctx: &ResearchContext, goal: &str, result: &ResearchResult) -> Result<Section> {
        let request = ctx.prompts().render(&ProseSynthesisArgs(SynthesizeArgs {
            goal,
            subtopic: &result.subtopic,
            knowledge: &result.knowledge,
        }))?;

        let text = ctx.assistant().ask(WRITER_PERSONA, &request).await?;

        Ok(Section::new(result.subtopic.clone(), split_paragraphs(&text)))
    }

    fn name(&self) -> &'static str {
        "prose"
    }
}

impl ResearchContext {
    /// Synthesize one section, logging the outcome
    pub async fn synthesize_section(
        &self,
        synthesizer: &dyn Synthesizer,
        goal: &str,
        result: &ResearchResult,
    ) -> Result<Section> {
        tracing::info!(
            subtopic = %result.subtopic,
            strategy = synthesizer.name(),
            knowledge_count = result.knowledge.len(),
            "synthesizing_section"
        );

        let section = synthesizer.synthesize(self, goal, result).await?;

        tracing::debug!(
            subtopic = %result.subtopic,
            paragraphs = section.paragraphs.len(),
            "section_synthesized"
        );
        Ok(section)
    }
}
