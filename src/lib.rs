//! # Dossier
//!
//! A concurrent, depth-controlled research pipeline. Give it a topic and a
//! generative-text assistant; it returns a titled, multi-section report.
//!
//! ## Overview
//!
//! Dossier can be used in two ways:
//!
//! 1. **As a command-line tool and job worker** - Run the `dossier` binary
//! 2. **As a library** - Embed the pipeline with your own [`Assistant`]
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use dossier::{Provider, ResearchOrchestrator, ResearchDepth, ResourceMode};
//! use dossier::llm::ModelTiers;
//! use tokio_util::sync::CancellationToken;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = Provider::Gemini {
//!         api_key: std::env::var("GEMINI_API_KEY")?,
//!         api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
//!         models: ModelTiers::gemini_defaults(),
//!     };
//!     let assistant = provider.create_client(ResourceMode::Basic, Duration::from_secs(300))?;
//!
//!     let orchestrator = ResearchOrchestrator::new(assistant)?;
//!     let report = orchestrator
//!         .research_topic("Forth programming language", ResearchDepth::Medium, &CancellationToken::new())
//!         .await?;
//!
//!     println!("{}", report.to_text());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `gemini` | Google Generative Language API (default) |
//! | `openai` | OpenAI-compatible chat completions (default) |
//! | `smtp` | Email notification via lettre (default) |
//!
//! ## Modules
//!
//! - [`pipeline`] - Stage primitives: queues, workers, cancellation
//! - [`research`] - Planning, refinement, synthesis, editing, titling
//! - [`llm`] - Assistant clients
//! - [`prompts`] - Personas and request templates
//! - [`publish`] / [`notify`] - Where finished reports go
//! - [`worker`] - Queued research jobs
//! - [`types`] - Requests, enumerations and errors

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// Command-line interface definitions and output helpers.
pub mod cli;
/// Assistant provider clients and abstractions.
pub mod llm;
/// Publication notices (email, log).
pub mod notify;
/// Generic concurrent pipeline stages.
pub mod pipeline;
/// Personas and request templates.
pub mod prompts;
/// Report publishing.
pub mod publish;
/// The topic research pipeline.
pub mod research;
/// Core types (requests, enumerations, errors).
pub mod types;
/// Configuration and logging utilities.
pub mod utils;
/// Queued research jobs.
pub mod worker;

// Re-export commonly used types
pub use llm::{Assistant, ModelTiers, Provider};
pub use notify::{LogNotifier, Notifier};
pub use publish::{Publisher, TelegraphPublisher};
pub use research::{PipelineSettings, PipelineShape, ResearchOrchestrator, ResearchReport, Section};
pub use types::{AppError, PublishedReport, ResearchDepth, ResearchRequest, ResourceMode, Result};
pub use utils::toml_config::DossierConfig;
pub use worker::ResearchJob;
