//! Assistant Clients and Abstractions
//!
//! Every research stage talks to a generative-text service through the
//! [`Assistant`] trait. The pipeline never sees which provider is behind it.
//!
//! # Supported Providers
//!
//! Enable providers via Cargo features:
//! - `gemini` - Google Generative Language API, grounded with Google Search
//! - `openai` - OpenAI and compatible chat completion endpoints
//!
//! # Example
//!
//! ```ignore
//! use dossier::llm::{structured, ModelTiers, Provider};
//! use dossier::types::ResourceMode;
//!
//! let provider = Provider::Gemini {
//!     api_key,
//!     api_base: String::new(),
//!     models: ModelTiers::gemini_defaults(),
//! };
//! let assistant = provider.create_client(ResourceMode::Basic, timeout)?;
//!
//! let answer = assistant.ask("You are terse.", "What is Forth?").await?;
//! let topics: Vec<String> = structured::ask_for(&*assistant, "You are terse.", "List three topics").await?;
//! ```

/// Core assistant trait and provider selection.
pub mod client;
/// Schema generation and typed structured requests.
pub mod structured;

#[cfg(feature = "gemini")]
pub mod gemini;

#[cfg(feature = "openai")]
pub mod openai;

pub use client::{Assistant, ModelTiers, Provider};
