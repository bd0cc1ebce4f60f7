use crate::llm::Assistant;
use crate::prompts::PromptBuilder;
use crate::types::Result;
use std::sync::Arc;

/// Everything a research stage needs to talk to the assistant
///
/// Cheap to clone; every stage worker gets its own copy instead of looking
/// the assistant up from ambient state.
#[derive(Clone)]
pub struct ResearchContext {
    assistant: Arc<dyn Assistant>,
    prompts: Arc<PromptBuilder>,
}

impl ResearchContext {
    pub fn new(assistant: Arc<dyn Assistant>) -> Result<Self> {
        Ok(Self {
            assistant,
            prompts: Arc::new(PromptBuilder::new()?),
        })
    }

    pub fn with_prompts(assistant: Arc<dyn Assistant>, prompts: Arc<PromptBuilder>) -> Self {
        Self { assistant, prompts }
    }

    pub fn assistant(&self) -> &dyn Assistant {
        self.assistant.as_ref()
    }

    pub fn prompts(&self) -> &PromptBuilder {
        &self.prompts
    }
}

impl std::fmt::Debug for ResearchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchContext")
            .field("model", &self.assistant.model_name())
            .finish()
    }
}
