//! CLI module for Dossier
//!
//! Provides command-line interface parsing for the `dossier` binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod output;

use crate::research::PipelineShape;
use crate::types::{ResearchDepth, ResourceMode};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Dossier - topic research reports from a generative-text assistant
#[derive(Parser, Debug)]
#[command(
    name = "dossier",
    version,
    about = "Dossier - turn a topic into a multi-section research report",
    long_about = "Plans a topic into subtopics, researches each one concurrently with a\n\
                  depth-controlled refinement loop, then synthesizes, edits and titles\n\
                  the results into a single report.",
    after_help = "EXAMPLES:\n    \
                  dossier research \"Forth programming language\"\n    \
                  dossier research \"Forth\" --depth long --mode pro --output forth.json\n    \
                  dossier research \"Forth\" --shape staged --publish --notify\n    \
                  dossier job --payload eyJyZXF1ZXN0X2lkIjoici0xIiwidG9waWMiOiJGb3J0aCJ9\n    \
                  dossier config --validate"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "dossier.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Research a topic and print the report
    Research {
        /// Topic to research
        topic: String,

        /// How many refinement rounds each subtopic may run (short, medium, long)
        #[arg(short, long, default_value = "short")]
        depth: ResearchDepth,

        /// Assistant model tier (minimal, basic, pro)
        #[arg(short, long, default_value = "basic")]
        mode: ResourceMode,

        /// Override the configured pipeline shape (simple, staged)
        #[arg(long)]
        shape: Option<PipelineShape>,

        /// Publish the finished report
        #[arg(long)]
        publish: bool,

        /// Send a notification after publishing
        #[arg(long, requires = "publish")]
        notify: bool,

        /// Write the report as JSON to this file instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run one queued research job: decode, research, publish, notify
    Job {
        /// Base64-encoded JSON research request
        #[arg(long, env = "RESEARCH_REQUEST")]
        payload: String,
    },

    /// Show configuration information
    Config {
        /// Validate the configuration, including required environment variables
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_research_command() {
        let cli = Cli::try_parse_from([
            "dossier",
            "research",
            "Forth programming language",
            "--depth",
            "long",
            "--mode",
            "pro",
            "--shape",
            "staged",
        ])
        .unwrap();

        match cli.command {
            Commands::Research {
                topic,
                depth,
                mode,
                shape,
                publish,
                ..
            } => {
                assert_eq!(topic, "Forth programming language");
                assert_eq!(depth, ResearchDepth::Long);
                assert_eq!(mode, ResourceMode::Pro);
                assert_eq!(shape, Some(PipelineShape::Staged));
                assert!(!publish);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.config, PathBuf::from("dossier.toml"));
    }

    #[test]
    fn test_notify_requires_publish() {
        let result = Cli::try_parse_from(["dossier", "research", "Forth", "--notify"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_depth_rejected() {
        let result = Cli::try_parse_from(["dossier", "research", "Forth", "--depth", "forever"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["dossier", "config", "--validate", "--no-color", "-v", "-c", "x.toml"]).unwrap();
        assert!(cli.no_color);
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("x.toml"));
        assert!(matches!(cli.command, Commands::Config { validate: true }));
    }
}
