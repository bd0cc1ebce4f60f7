use anyhow::{Context, Result};
use dossier::cli::output::Output;
use dossier::cli::{Cli, Commands};
use dossier::research::{ResearchOrchestrator, ResearchReport};
use dossier::types::{ResearchDepth, ResourceMode};
use dossier::utils::logging;
use dossier::utils::toml_config::DossierConfig;
use dossier::worker::{notifier_from_config, publisher_from_config, ResearchJob};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    if let Err(e) = run(cli, &output).await {
        output.error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    let mut config = DossierConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    let _log_guard = logging::init(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::Research {
            topic,
            depth,
            mode,
            shape,
            publish,
            notify,
            output: output_path,
        } => {
            if let Some(shape) = shape {
                config.pipeline.shape = shape;
            }
            if notify {
                config.notify.enabled = true;
            }

            let run = ResearchRun {
                topic,
                depth,
                mode,
                publish: publish || config.publish.enabled,
                output_path,
            };
            research(&config, run, output).await
        }
        Commands::Job { payload } => job(&config, &payload, output).await,
        Commands::Config { validate } => show_config(&config, &cli.config, validate, output),
    }
}

struct ResearchRun {
    topic: String,
    depth: ResearchDepth,
    mode: ResourceMode,
    publish: bool,
    output_path: Option<PathBuf>,
}

async fn research(config: &DossierConfig, run: ResearchRun, output: &Output) -> Result<()> {
    output.banner();
    output.kv("Topic", &run.topic);
    output.kv("Depth", run.depth.as_str());
    output.kv("Mode", &run.mode.to_string());
    output.kv("Shape", &config.pipeline.shape.to_string());

    // Resolve publishing before spending tokens on research
    let publisher = if run.publish {
        Some(publisher_from_config(config).context("publishing is not configured")?)
    } else {
        None
    };

    let provider = config.provider().context("assistant is not configured")?;
    let assistant = provider.create_client(run.mode, config.assistant.timeout())?;
    output.kv("Model", assistant.model_name());

    let orchestrator = ResearchOrchestrator::new(assistant)?.with_settings(config.pipeline.clone());
    let token = cancel_on_ctrl_c();

    output.step(1, if run.publish { 2 } else { 1 }, "Researching...");
    let report = orchestrator
        .research_topic(&run.topic, run.depth, &token)
        .await
        .context("research failed")?;
    output.success(&format!(
        "Report ready: {} sections, {} paragraphs",
        report.sections.len(),
        report.paragraph_count()
    ));

    emit_report(&report, run.output_path.as_deref(), output)?;

    if let Some(publisher) = publisher {
        output.step(2, 2, "Publishing...");
        let url = publisher.publish(&report).await.context("publishing failed")?;
        output.success(&format!("Published: {}", url));

        let notifier = notifier_from_config(config)?;
        notifier
            .notify(&report.title, &url)
            .await
            .context("notification failed")?;
    }

    Ok(())
}

fn emit_report(report: &ResearchReport, path: Option<&std::path::Path>, output: &Output) -> Result<()> {
    match path {
        Some(path) => {
            let json = serde_json::to_string_pretty(report)?;
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            output.success(&format!("Report written to {}", path.display()));
        }
        None => output.report(report),
    }
    Ok(())
}

async fn job(config: &DossierConfig, payload: &str, output: &Output) -> Result<()> {
    let job = ResearchJob::from_config(config)?;
    let token = cancel_on_ctrl_c();

    let published = job.run_base64(payload, &token).await.context("research job failed")?;

    output.success(&format!("Published \"{}\"", published.title));
    output.kv("Request", &published.request_id);
    output.kv("URL", &published.url);
    Ok(())
}

fn show_config(config: &DossierConfig, path: &std::path::Path, validate: bool, output: &Output) -> Result<()> {
    output.header("Configuration");
    output.kv("File", &path.display().to_string());
    output.kv("Provider", config.assistant.provider.name());
    output.kv("API key env", config.assistant.provider.api_key_env());
    output.kv("Timeout", &format!("{}s", config.assistant.timeout_secs));

    let pipeline = &config.pipeline;
    output.header("Pipeline");
    output.kv("Shape", &pipeline.shape.to_string());
    output.kv(
        "Concurrency",
        &format!(
            "research {}, synthesis {}, edit {}",
            pipeline.research_concurrency, pipeline.synthesis_concurrency, pipeline.edit_concurrency
        ),
    );
    output.kv("Queue capacity", &pipeline.queue_capacity.to_string());
    output.kv("Failed subtopics", &format!("{:?}", pipeline.failed_subtopics));
    output.kv("Synthesis", &format!("{:?}", pipeline.synthesis));
    output.kv("Titling", &format!("{:?}", pipeline.titling));

    output.header("Outputs");
    output.kv("Publish", &config.publish.enabled.to_string());
    output.kv("Notify", &config.notify.enabled.to_string());
    output.kv("Log level", &config.logging.level);

    if validate {
        output.newline();
        config.validate().context("configuration is invalid")?;
        output.success("Configuration is valid");
    } else {
        output.hint("Run with --validate to check required environment variables");
    }

    Ok(())
}

/// A token cancelled on the first Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let handle = token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt_received_cancelling");
            handle.cancel();
        }
    });

    token
}
