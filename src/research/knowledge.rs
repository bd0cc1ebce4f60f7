use crate::llm::structured::ask_for;
use crate::prompts::{
    AnalyzeArgs, GatherArgs, StructureArgs, ANALYST_PERSONA, ORGANIZER_PERSONA, RESEARCHER_PERSONA,
};
use crate::research::context::ResearchContext;
use crate::research::models::Knowledge;
use crate::types::Result;

impl ResearchContext {
    /// Gather knowledge that answers `questions` about `subtopic`
    ///
    /// One free-text gathering call, then one structured call that splits the
    /// answer into topic/information pairs.
    pub async fn generate_knowledge(&self, subtopic: &str, questions: &[String]) -> Result<Vec<Knowledge>> {
        tracing::info!(subtopic, questions = questions.len(), "generating_knowledge");

        let request = self.prompts().render(&GatherArgs { subtopic, questions })?;
        let information = self.assistant().ask(RESEARCHER_PERSONA, &request).await?;

        let request = self.prompts().render(&StructureArgs {
            subtopic,
            information: &information,
        })?;
        let knowledge: Vec<Knowledge> = ask_for(self.assistant(), ORGANIZER_PERSONA, &request).await?;

        let knowledge: Vec<Knowledge> = knowledge
            .into_iter()
            .filter(|k| !k.information.trim().is_empty())
            .collect();

        tracing::debug!(subtopic, knowledge_count = knowledge.len(), "knowledge_generated");
        Ok(knowledge)
    }

    /// Review gathered knowledge and return follow-up questions
    ///
    /// An empty list means the knowledge already answers the questions.
    pub async fn analyze_knowledge(
        &self,
        goal: &str,
        subtopic: &str,
        questions: &[String],
        knowledge: &[Knowledge],
    ) -> Result<Vec<String>> {
        tracing::info!(subtopic, knowledge_count = knowledge.len(), "analyzing_knowledge");

        let request = self.prompts().render(&AnalyzeArgs {
            goal,
            subtopic,
            questions,
            knowledge,
        })?;
        let follow_ups: Vec<String> = ask_for(self.assistant(), ANALYST_PERSONA, &request).await?;

        Ok(follow_ups
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect())
    }
}
