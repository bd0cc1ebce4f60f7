use crate::llm::structured::ask_for;
use crate::prompts::{PlanContextArgs, PlanExtractArgs, PLANNER_PERSONA, RESEARCHER_PERSONA};
use crate::research::context::ResearchContext;
use crate::research::models::{ResearchItem, ResearchPlan};
use crate::types::{AppError, Result};

impl ResearchContext {
    /// Turn a topic into a research plan
    ///
    /// Two assistant calls: a free-text overview of the topic, then a
    /// structured extraction of subtopics and their opening questions. Any
    /// failure is reported as [`AppError::Planning`], except cancellation,
    /// which is returned as is.
    pub async fn plan(&self, topic: &str) -> Result<ResearchPlan> {
        tracing::info!(topic, "generating_research_plan");

        match self.build_plan(topic).await {
            Ok(plan) => {
                tracing::info!(
                    goal = %plan.goal,
                    items = plan.items.len(),
                    "research_plan_ready"
                );
                Ok(plan)
            }
            Err(AppError::Cancelled) => Err(AppError::Cancelled),
            Err(e) => {
                tracing::error!(topic, error = %e, "research_plan_failed");
                Err(AppError::Planning(Box::new(e)))
            }
        }
    }

    async fn build_plan(&self, topic: &str) -> Result<ResearchPlan> {
        let request = self.prompts().render(&PlanContextArgs { topic })?;
        let context = self.assistant().ask(RESEARCHER_PERSONA, &request).await?;

        let request = self.prompts().render(&PlanExtractArgs {
            topic,
            context: &context,
        })?;
        let plan: ResearchPlan = ask_for(self.assistant(), PLANNER_PERSONA, &request).await?;

        normalize_plan(plan)
    }
}

/// Drop blank subtopics and questions; reject a plan with nothing left
///
/// An item whose questions are all blank is asked about its subtopic
/// directly, so every item seeds its loop with at least one question.
fn normalize_plan(plan: ResearchPlan) -> Result<ResearchPlan> {
    let items: Vec<ResearchItem> = plan
        .items
        .into_iter()
        .filter_map(|item| {
            let subtopic = item.subtopic.trim().to_string();
            if subtopic.is_empty() {
                return None;
            }

            let mut questions: Vec<String> = item
                .questions
                .into_iter()
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty())
                .collect();

            if questions.is_empty() {
                tracing::warn!(subtopic = %subtopic, "plan_item_without_questions");
                questions.push(subtopic.clone());
            }

            Some(ResearchItem {
                subtopic,
                questions,
            })
        })
        .collect();

    if items.is_empty() {
        return Err(AppError::SchemaParse(
            "research plan contains no subtopics".to_string(),
        ));
    }

    Ok(ResearchPlan {
        goal: plan.goal.trim().to_string(),
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(subtopic: &str, questions: &[&str]) -> ResearchItem {
        ResearchItem {
            subtopic: subtopic.to_string(),
            questions: questions.iter().map(|q| q.to_string()).collect(),
        }
    }

    #[test]
    fn test_normalize_plan_trims_and_filters() {
        let plan = ResearchPlan {
            goal: "  Explain Forth ".to_string(),
            items: vec![
                item(" Origins ", &["Who?", "  "]),
                item("   ", &["ignored"]),
                item("Dialects", &[" "]),
            ],
        };

        let plan = normalize_plan(plan).unwrap();
        assert_eq!(plan.goal, "Explain Forth");
        assert_eq!(plan.items.len(), 2);
        assert_eq!(plan.items[0], item("Origins", &["Who?"]));
        assert_eq!(plan.items[1], item("Dialects", &["Dialects"]));
    }

    #[test]
    fn test_normalize_plan_rejects_empty() {
        let plan = ResearchPlan {
            goal: "Explain Forth".to_string(),
            items: vec![],
        };
        assert!(matches!(normalize_plan(plan), Err(AppError::SchemaParse(_))));
    }
}
