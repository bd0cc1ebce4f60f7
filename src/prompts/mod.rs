//! Prompt rendering
//!
//! Every request sent to the assistant is rendered from a named Handlebars
//! template. Each template has exactly one argument type implementing
//! [`PromptArgs`], so the pairing of template and arguments is fixed at
//! compile time and strict mode catches any field the template expects but
//! the type does not provide.

use crate::research::models::{Knowledge, Section};
use crate::types::{AppError, Result};
use handlebars::Handlebars;
use serde::Serialize;

// ============= Personas =============

pub const PLANNER_PERSONA: &str = "You are an expert research planner. You turn a research topic \
into a complete, structured plan of subtopics and the questions that open each one up.";

pub const RESEARCHER_PERSONA: &str = "You are an expert researcher. You search the web to \
gather detailed, accurate information that answers a set of questions.";

pub const ORGANIZER_PERSONA: &str = "You are an expert research organizer. You structure \
gathered information into an organized list of topics and the information about each.";

pub const ANALYST_PERSONA: &str = "You are an expert research analyst. You review what other \
researchers gathered and decide whether it answers the questions for a subtopic of a research goal.";

pub const WRITER_PERSONA: &str = "You are an expert research writer. You synthesize researched \
information into sections of a formal research report.";

pub const EDITOR_PERSONA: &str = "You are an expert editor. You clean up report sections so they \
read as neutral plain prose. You never research or add new content.";

pub const TITLE_PERSONA: &str = "Create a document title";

// ============= Templates =============

const TEMPLATES: &[(&str, &str)] = &[
    ("plan_context", include_str!("templates/plan_context.hbs")),
    ("plan_extract", include_str!("templates/plan_extract.hbs")),
    ("knowledge_gather", include_str!("templates/knowledge_gather.hbs")),
    ("knowledge_structure", include_str!("templates/knowledge_structure.hbs")),
    ("knowledge_analyze", include_str!("templates/knowledge_analyze.hbs")),
    ("synthesize_structured", include_str!("templates/synthesize_structured.hbs")),
    ("synthesize_prose", include_str!("templates/synthesize_prose.hbs")),
    ("edit_section", include_str!("templates/edit_section.hbs")),
    ("title_document", include_str!("templates/title_document.hbs")),
    ("consistency_pass", include_str!("templates/consistency_pass.hbs")),
];

/// Arguments for one specific template
pub trait PromptArgs: Serialize {
    /// Name of the template these arguments render
    const TEMPLATE: &'static str;
}

/// Renders registered templates against typed arguments
pub struct PromptBuilder {
    registry: Handlebars<'static>,
}

impl PromptBuilder {
    /// Register every built-in template
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);

        for (name, source) in TEMPLATES {
            registry
                .register_template_string(name, *source)
                .map_err(|e| AppError::Template(format!("invalid template '{}': {}", name, e)))?;
        }

        Ok(Self { registry })
    }

    /// Render the template bound to `A`
    pub fn render<A: PromptArgs>(&self, args: &A) -> Result<String> {
        self.render_named(A::TEMPLATE, args)
    }

    /// Render a template by name against arbitrary arguments
    pub fn render_named<T: Serialize>(&self, name: &str, args: &T) -> Result<String> {
        if !self.registry.has_template(name) {
            return Err(AppError::Template(format!("unknown template '{}'", name)));
        }

        self.registry
            .render(name, args)
            .map_err(|e| AppError::Template(format!("failed to render '{}': {}", name, e)))
    }

    /// Names of all registered templates
    pub fn template_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.registry.get_templates().keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for PromptBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptBuilder")
            .field("templates", &self.template_names())
            .finish()
    }
}

// ============= Argument Types =============

#[derive(Debug, Serialize)]
pub struct PlanContextArgs<'a> {
    pub topic: &'a str,
}

impl PromptArgs for PlanContextArgs<'_> {
    const TEMPLATE: &'static str = "plan_context";
}

#[derive(Debug, Serialize)]
pub struct PlanExtractArgs<'a> {
    pub topic: &'a str,
    pub context: &'a str,
}

impl PromptArgs for PlanExtractArgs<'_> {
    const TEMPLATE: &'static str = "plan_extract";
}

#[derive(Debug, Serialize)]
pub struct GatherArgs<'a> {
    pub subtopic: &'a str,
    pub questions: &'a [String],
}

impl PromptArgs for GatherArgs<'_> {
    const TEMPLATE: &'static str = "knowledge_gather";
}

#[derive(Debug, Serialize)]
pub struct StructureArgs<'a> {
    pub subtopic: &'a str,
    pub information: &'a str,
}

impl PromptArgs for StructureArgs<'_> {
    const TEMPLATE: &'static str = "knowledge_structure";
}

#[derive(Debug, Serialize)]
pub struct AnalyzeArgs<'a> {
    pub goal: &'a str,
    pub subtopic: &'a str,
    pub questions: &'a [String],
    pub knowledge: &'a [Knowledge],
}

impl PromptArgs for AnalyzeArgs<'_> {
    const TEMPLATE: &'static str = "knowledge_analyze";
}

/// Shared by both synthesis strategies
#[derive(Debug, Serialize)]
pub struct SynthesizeArgs<'a> {
    pub goal: &'a str,
    pub subtopic: &'a str,
    pub knowledge: &'a [Knowledge],
}

/// [`SynthesizeArgs`] bound to the structured synthesis template
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct StructuredSynthesisArgs<'a>(pub SynthesizeArgs<'a>);

impl PromptArgs for StructuredSynthesisArgs<'_> {
    const TEMPLATE: &'static str = "synthesize_structured";
}

/// [`SynthesizeArgs`] bound to the prose synthesis template
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ProseSynthesisArgs<'a>(pub SynthesizeArgs<'a>);

impl PromptArgs for ProseSynthesisArgs<'_> {
    const TEMPLATE: &'static str = "synthesize_prose";
}

#[derive(Debug, Serialize)]
pub struct EditArgs<'a> {
    pub title: &'a str,
    pub paragraphs: &'a [String],
}

impl PromptArgs for EditArgs<'_> {
    const TEMPLATE: &'static str = "edit_section";
}

#[derive(Debug, Serialize)]
pub struct TitleArgs<'a> {
    pub sections: &'a [Section],
}

impl PromptArgs for TitleArgs<'_> {
    const TEMPLATE: &'static str = "title_document";
}

#[derive(Debug, Serialize)]
pub struct ConsistencyArgs<'a> {
    pub sections: &'a [Section],
}

impl PromptArgs for ConsistencyArgs<'_> {
    const TEMPLATE: &'static str = "consistency_pass";
}
