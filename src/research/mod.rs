//! Topic Research Pipeline
//!
//! Turns a free-text topic into a multi-section [`models::ResearchReport`]:
//!
//! 1. **Planning** - split the topic into subtopics, each with opening questions
//! 2. **Refinement** - per subtopic, gather knowledge and ask follow-up
//!    questions for as many rounds as the [`ResearchDepth`](crate::types::ResearchDepth) allows
//! 3. **Synthesis** - write each subtopic's knowledge up as paragraphs
//! 4. **Edit** - clean every section into neutral plain prose
//! 5. **Aggregation** - collect the sections into one document
//! 6. **Titling** - title the document, optionally with a consistency pass
//!
//! Subtopics are researched concurrently. A subtopic whose refinement loop
//! fails does not stop the run; [`settings::FailedSubtopicPolicy`] decides
//! what happens to it. A failure in any other stage aborts the run.
//!
//! # Usage
//!
//! ```ignore
//! use dossier::research::ResearchOrchestrator;
//!
//! let orchestrator = ResearchOrchestrator::new(assistant)?;
//! let report = orchestrator
//!     .research_topic("Forth programming language", ResearchDepth::Medium, &token)
//!     .await?;
//! ```

/// Assistant and prompts shared by every stage.
pub mod context;
/// Section editing and markup removal.
pub mod edit;
/// Knowledge gathering and gap analysis.
pub mod knowledge;
/// Plans, knowledge, results, sections and reports.
pub mod models;
/// Top-level research runs in both pipeline shapes.
pub mod orchestrator;
/// Topic planning.
pub mod planning;
/// The per-subtopic refinement loop.
pub mod refinement;
/// Pipeline shape, concurrency and strategy settings.
pub mod settings;
/// Pluggable synthesis strategies.
pub mod synthesis;
pub mod titling;

pub use context::ResearchContext;
pub use models::{Knowledge, ResearchItem, ResearchPlan, ResearchReport, ResearchResult, Section};
pub use orchestrator::ResearchOrchestrator;
pub use settings::{FailedSubtopicPolicy, PipelineSettings, PipelineShape, SynthesisMode, TitlingMode};
pub use synthesis::Synthesizer;
