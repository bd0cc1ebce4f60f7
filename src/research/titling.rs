use crate::llm::structured::ask_for;
use crate::prompts::{ConsistencyArgs, TitleArgs, EDITOR_PERSONA, TITLE_PERSONA};
use crate::research::context::ResearchContext;
use crate::research::edit::{split_paragraphs, strip_markup};
use crate::research::models::{ResearchReport, Section};
use crate::research::settings::TitlingMode;
use crate::types::{AppError, Result};

impl ResearchContext {
    /// Give the aggregated sections a title, producing the final report
    pub async fn compose_report(&self, sections: Vec<Section>, mode: TitlingMode) -> Result<ResearchReport> {
        tracing::info!(sections = sections.len(), ?mode, "titling_document");

        let report = match mode {
            TitlingMode::TitleOnly => {
                let title = self.generate_title(&sections).await?;
                ResearchReport { title, sections }
            }
            TitlingMode::ConsistencyPass => self.consistency_pass(sections).await?,
        };

        tracing::info!(title = %report.title, "document_titled");
        Ok(report)
    }

    /// One structured call over all paragraph text, answered with a string
    pub async fn generate_title(&self, sections: &[Section]) -> Result<String> {
        let request = self.prompts().render(&TitleArgs { sections })?;
        let title: String = ask_for(self.assistant(), TITLE_PERSONA, &request).await?;
        clean_title(&title)
    }

    /// Ask for a revised document and a title in one call
    ///
    /// The revised sections replace the originals only when the section count
    /// is unchanged; otherwise the originals are kept with the new title.
    /// Adopted paragraphs get the same markup cleanup as the edit stage.
    async fn consistency_pass(&self, sections: Vec<Section>) -> Result<ResearchReport> {
        let request = self.prompts().render(&ConsistencyArgs {
            sections: &sections,
        })?;
        let revised: ResearchReport = ask_for(self.assistant(), EDITOR_PERSONA, &request).await?;
        let title = clean_title(&revised.title)?;

        if revised.sections.len() != sections.len() {
            tracing::warn!(
                expected = sections.len(),
                returned = revised.sections.len(),
                "consistency_pass_section_mismatch"
            );
            return Ok(ResearchReport { title, sections });
        }

        Ok(ResearchReport {
            title,
            sections: adopt_sections(sections, revised.sections),
        })
    }
}

/// Cleaned revised sections; a revision left empty keeps the original
fn adopt_sections(original: Vec<Section>, revised: Vec<Section>) -> Vec<Section> {
    original
        .into_iter()
        .zip(revised)
        .map(|(original, revised)| {
            let paragraphs: Vec<String> = revised
                .paragraphs
                .iter()
                .flat_map(|p| split_paragraphs(&strip_markup(p)))
                .collect();
            if paragraphs.is_empty() {
                return original;
            }

            let title = strip_markup(&revised.title);
            match title.trim() {
                "" => Section::new(original.title, paragraphs),
                title => Section::new(title, paragraphs),
            }
        })
        .collect()
}

fn clean_title(title: &str) -> Result<String> {
    let title = title.trim().trim_matches('"').trim();
    if title.is_empty() {
        return Err(AppError::SchemaParse("document title is empty".to_string()));
    }
    Ok(title.to_string())
}
