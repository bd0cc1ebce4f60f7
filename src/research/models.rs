use crate::types::AppError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Subtopics to research for one topic, produced once by planning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResearchPlan {
    /// One sentence describing what the finished report must explain
    pub goal: String,
    /// Every subtopic needed to reach the goal
    pub items: Vec<ResearchItem>,
}

/// One subtopic and the questions that seed its refinement loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResearchItem {
    pub subtopic: String,
    /// Initial research questions, never empty
    pub questions: Vec<String>,
}

/// A single gathered fact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Knowledge {
    pub topic: String,
    pub information: String,
}

impl Knowledge {
    pub fn new(topic: impl Into<String>, information: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            information: information.into(),
        }
    }
}

/// Everything one subtopic's refinement loop produced
///
/// A loop failure is recorded in `error` instead of being returned, so the
/// knowledge gathered before the failure is kept.
#[derive(Debug, Clone)]
pub struct ResearchResult {
    pub subtopic: String,
    pub knowledge: Vec<Knowledge>,
    pub error: Option<AppError>,
}

impl ResearchResult {
    pub fn new(subtopic: impl Into<String>) -> Self {
        Self {
            subtopic: subtopic.into(),
            knowledge: Vec::new(),
            error: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.error.as_ref().is_some_and(|e| e.is_cancelled())
    }
}

/// One titled section of a report
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Section {
    pub title: String,
    pub paragraphs: Vec<String>,
}

impl Section {
    pub fn new(title: impl Into<String>, paragraphs: Vec<String>) -> Self {
        Self {
            title: title.into(),
            paragraphs,
        }
    }
}

/// A finished research document
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ResearchReport {
    pub title: String,
    pub sections: Vec<Section>,
}

impl ResearchReport {
    pub fn paragraph_count(&self) -> usize {
        self.sections.iter().map(|s| s.paragraphs.len()).sum()
    }

    /// Plain-text rendering: title, then each section heading and its paragraphs
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.title);
        out.push('\n');

        for section in &self.sections {
            out.push('\n');
            out.push_str(&section.title);
            out.push('\n');
            for paragraph in &section.paragraphs {
                out.push('\n');
                out.push_str(paragraph);
                out.push('\n');
            }
        }

        out
    }
}
