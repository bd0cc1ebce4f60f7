use crate::research::models::ResearchResult;
use crate::types::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the stages of one research run are wired together
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineShape {
    /// Plan first, research every subtopic in its own task, then run the
    /// writing stages as a pipeline
    #[default]
    Simple,
    /// Every step, including each subtopic's refinement loop, is a stage
    Staged,
}

/// What to do with a subtopic whose refinement loop recorded an error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailedSubtopicPolicy {
    /// Synthesize whatever was gathered, even nothing
    #[default]
    Include,
    /// Drop subtopics that failed without gathering anything
    Omit,
    /// Abort the run
    Fail,
}

impl FailedSubtopicPolicy {
    /// Decide whether a finished subtopic goes on to synthesis
    ///
    /// Cancellation always aborts, whatever the policy.
    pub fn screen(self, result: ResearchResult) -> Result<Option<ResearchResult>> {
        let Some(error) = result.error.as_ref() else {
            return Ok(Some(result));
        };

        if error.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        match self {
            FailedSubtopicPolicy::Include => Ok(Some(result)),
            FailedSubtopicPolicy::Omit if result.knowledge.is_empty() => {
                tracing::warn!(subtopic = %result.subtopic, error = %error, "subtopic_omitted");
                Ok(None)
            }
            FailedSubtopicPolicy::Omit => Ok(Some(result)),
            FailedSubtopicPolicy::Fail => Err(AppError::Stage {
                stage: "research",
                source: Box::new(AppError::Internal(format!(
                    "subtopic '{}' failed: {}",
                    result.subtopic, error
                ))),
            }),
        }
    }

    /// Apply [`FailedSubtopicPolicy::screen`] to a batch of results
    pub fn apply(self, results: Vec<ResearchResult>) -> Result<Vec<ResearchResult>> {
        let mut kept = Vec::with_capacity(results.len());
        for result in results {
            if let Some(result) = self.screen(result)? {
                kept.push(result);
            }
        }
        Ok(kept)
    }
}

/// Strategy used to turn a subtopic's knowledge into paragraphs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisMode {
    /// Structured list of named paragraphs
    #[default]
    Structured,
    /// Free text split on blank lines
    Prose,
}

/// How the final document is titled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitlingMode {
    /// Ask only for a title
    #[default]
    TitleOnly,
    /// Ask for a title and a consistency pass over every section
    ConsistencyPass,
}

/// Concurrency, capacity and strategy knobs for a research run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default)]
    pub shape: PipelineShape,

    /// Workers researching subtopics at once (staged shape; the simple shape
    /// runs one task per subtopic)
    #[serde(default = "default_concurrency")]
    pub research_concurrency: usize,

    /// Workers in the synthesis stage
    #[serde(default = "default_concurrency")]
    pub synthesis_concurrency: usize,

    /// Workers in the edit stage
    #[serde(default = "default_concurrency")]
    pub edit_concurrency: usize,

    /// Capacity of the queues between stages
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Capacity of the aggregate and title queues
    #[serde(default = "default_aggregate_capacity")]
    pub aggregate_capacity: usize,

    #[serde(default)]
    pub failed_subtopics: FailedSubtopicPolicy,

    #[serde(default)]
    pub synthesis: SynthesisMode,

    #[serde(default)]
    pub titling: TitlingMode,
}

fn default_concurrency() -> usize {
    3
}

fn default_queue_capacity() -> usize {
    6
}

fn default_aggregate_capacity() -> usize {
    1
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            shape: PipelineShape::default(),
            research_concurrency: default_concurrency(),
            synthesis_concurrency: default_concurrency(),
            edit_concurrency: default_concurrency(),
            queue_capacity: default_queue_capacity(),
            aggregate_capacity: default_aggregate_capacity(),
            failed_subtopics: FailedSubtopicPolicy::default(),
            synthesis: SynthesisMode::default(),
            titling: TitlingMode::default(),
        }
    }
}

impl PipelineSettings {
    pub fn with_shape(mut self, shape: PipelineShape) -> Self {
        self.shape = shape;
        self
    }

    /// Same worker count for every parallel stage
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.research_concurrency = concurrency;
        self.synthesis_concurrency = concurrency;
        self.edit_concurrency = concurrency;
        self
    }

    pub fn with_research_concurrency(mut self, concurrency: usize) -> Self {
        self.research_concurrency = concurrency;
        self
    }

    pub fn with_synthesis_concurrency(mut self, concurrency: usize) -> Self {
        self.synthesis_concurrency = concurrency;
        self
    }

    pub fn with_edit_concurrency(mut self, concurrency: usize) -> Self {
        self.edit_concurrency = concurrency;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_failed_subtopics(mut self, policy: FailedSubtopicPolicy) -> Self {
        self.failed_subtopics = policy;
        self
    }

    pub fn with_synthesis(mut self, mode: SynthesisMode) -> Self {
        self.synthesis = mode;
        self
    }

    pub fn with_titling(mut self, mode: TitlingMode) -> Self {
        self.titling = mode;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let stages = [
            ("research_concurrency", self.research_concurrency),
            ("synthesis_concurrency", self.synthesis_concurrency),
            ("edit_concurrency", self.edit_concurrency),
        ];
        for (name, workers) in stages {
            if workers == 0 {
                return Err(AppError::Configuration(format!(
                    "pipeline.{} must be at least 1",
                    name
                )));
            }
        }
        if self.queue_capacity == 0 || self.aggregate_capacity == 0 {
            return Err(AppError::Configuration(
                "pipeline queue capacities must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl FromStr for PipelineShape {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Ok(PipelineShape::Simple),
            "staged" => Ok(PipelineShape::Staged),
            other => Err(AppError::InvalidInput(format!(
                "invalid pipeline shape '{}': must be simple or staged",
                other
            ))),
        }
    }
}

impl fmt::Display for PipelineShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineShape::Simple => f.write_str("simple"),
            PipelineShape::Staged => f.write_str("staged"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::models::Knowledge;

    fn failed(subtopic: &str, knowledge: usize) -> ResearchResult {
        let mut result = ResearchResult::new(subtopic);
        result.knowledge = (0..knowledge)
            .map(|i| Knowledge::new(format!("k{}", i), "info"))
            .collect();
        result.error = Some(AppError::Assistant("boom".into()));
        result
    }

    #[test]
    fn test_include_keeps_everything() {
        let results = vec![ResearchResult::new("a"), failed("b", 0)];
        let kept = FailedSubtopicPolicy::Include.apply(results).unwrap();
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_omit_drops_only_empty_failures() {
        let results = vec![ResearchResult::new("a"), failed("b", 0), failed("c", 2)];
        let kept = FailedSubtopicPolicy::Omit.apply(results).unwrap();
        let names: Vec<_> = kept.iter().map(|r| r.subtopic.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_fail_aborts() {
        let err = FailedSubtopicPolicy::Fail
            .apply(vec![ResearchResult::new("a"), failed("b", 3)])
            .unwrap_err();
        assert_eq!(err.stage(), Some("research"));
    }

    #[test]
    fn test_cancellation_always_aborts() {
        let mut result = ResearchResult::new("a");
        result.error = Some(AppError::Cancelled);
        let err = FailedSubtopicPolicy::Include.apply(vec![result]).unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_settings_defaults_from_empty_toml() {
        let settings: PipelineSettings = toml::from_str("").unwrap();
        assert_eq!(settings, PipelineSettings::default());
        assert_eq!(settings.research_concurrency, 3);
        assert_eq!(settings.synthesis_concurrency, 3);
        assert_eq!(settings.edit_concurrency, 3);
        assert_eq!(settings.queue_capacity, 6);
    }

    #[test]
    fn test_settings_parse_modes() {
        let settings: PipelineSettings = toml::from_str(
            r#"
            shape = "staged"
            failed_subtopics = "omit"
            synthesis = "prose"
            titling = "consistency_pass"
            "#,
        )
        .unwrap();
        assert_eq!(settings.shape, PipelineShape::Staged);
        assert_eq!(settings.failed_subtopics, FailedSubtopicPolicy::Omit);
        assert_eq!(settings.synthesis, SynthesisMode::Prose);
        assert_eq!(settings.titling, TitlingMode::ConsistencyPass);
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let settings = PipelineSettings::default().with_concurrency(0);
        assert!(settings.validate().is_err());

        let err = PipelineSettings::default()
            .with_edit_concurrency(0)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("edit_concurrency"));
    }

    #[test]
    fn test_stage_concurrency_is_independent() {
        let settings: PipelineSettings = toml::from_str(
            r#"
            research_concurrency = 10
            edit_concurrency = 1
            "#,
        )
        .unwrap();
        assert_eq!(settings.research_concurrency, 10);
        assert_eq!(settings.synthesis_concurrency, 3);
        assert_eq!(settings.edit_concurrency, 1);
        assert!(settings.validate().is_ok());
    }
}
