mod cli;

use anyhow::{anyhow, Context};
use clap::Parser;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use studyforge::artifact::StudyArtifact;
use studyforge::config::AppConfig;
use studyforge::core::Ingestor;
use studyforge::ingest::LocalIngestor;
use studyforge::prompts::load_study_instruction;
use studyforge::providers::gemini::GeminiClient;
use studyforge::utils::ensure_dir;
use studyforge::{
    normalize, ContentAssembler, ContentSource, ModelInvoker, PipelineError, RequestScope,
    StudyEngine,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();

    let cmd = match cli.cmd {
        cli::Command::Normalize { path } => return normalize_saved(path.as_deref()),
        cli::Command::Remote(cmd) => cmd,
    };

    let cfg = AppConfig::load(cli.config.as_deref())?;
    let instruction = load_study_instruction(cfg.system_instruction_file.as_deref())?;
    let client = Arc::new(GeminiClient::from_config(&cfg)?);
    let invoker = ModelInvoker::new(
        client,
        cfg.generation_retry.clone(),
        cfg.embedding_retry.clone(),
    );
    let engine = StudyEngine::new(
        ContentAssembler::new(instruction).with_json_suffix(cfg.strict_json_suffix),
        invoker,
    );

    let scope = RequestScope::new();
    let cancel = scope.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, abandoning the request");
            cancel.cancel();
        }
    });

    let outcome = scope
        .run_until_cancelled(run_command(cmd, &engine, &scope))
        .await
        .unwrap_or_else(|| Err(anyhow!("interrupted").into()));

    if let Some(path) = &cli.telemetry {
        scope.monitor.flush_summary(path)?;
        info!("telemetry written to {}", path.display());
    }

    outcome.map_err(|err| match err {
        CommandError::Pipeline(err) => {
            if let PipelineError::MalformedOutput(failure) = &err {
                eprintln!("raw model output:\n{}", failure.raw_text);
            }
            anyhow!("[{}] {}", err.kind(), err)
        }
        CommandError::Other(err) => err,
    })
}

enum CommandError {
    Pipeline(PipelineError),
    Other(anyhow::Error),
}

impl From<PipelineError> for CommandError {
    fn from(err: PipelineError) -> Self {
        CommandError::Pipeline(err)
    }
}

impl From<anyhow::Error> for CommandError {
    fn from(err: anyhow::Error) -> Self {
        CommandError::Other(err)
    }
}

fn normalize_saved(path: Option<&Path>) -> anyhow::Result<()> {
    let raw = match path {
        Some(path) => fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            buf
        }
    };
    match normalize(&raw) {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(failure) => {
            if let Some(attempted) = &failure.attempted {
                eprintln!("attempted substring:\n{attempted}");
            }
            Err(anyhow!(failure))
        }
    }
}

async fn run_command(
    cmd: cli::RemoteCommand,
    engine: &StudyEngine<GeminiClient>,
    scope: &RequestScope,
) -> Result<(), CommandError> {
    match cmd {
        cli::RemoteCommand::Generate {
            text,
            file,
            mime,
            output,
        } => {
            let source = match (text, file) {
                (Some(text), _) => ContentSource::Text(text),
                (None, Some(path)) => LocalIngestor.load(&path, mime.as_deref())?,
                (None, None) => return Err(anyhow!("either --text or --file is required").into()),
            };
            let value = engine.run(&source, scope).await?;
            match StudyArtifact::from_value(&value) {
                Ok(artifact) => {
                    for problem in artifact.problems() {
                        warn!("study artifact: {problem}");
                    }
                }
                Err(err) => warn!("response does not match the study artifact shape: {err}"),
            }
            let rendered = serde_json::to_string_pretty(&value).map_err(anyhow::Error::from)?;
            match output {
                Some(path) => write_output(&path, &rendered)?,
                None => println!("{rendered}"),
            }
        }
        cli::RemoteCommand::Embed { text } => {
            let values = engine.invoker.embed(&text, scope).await?;
            println!(
                "{}",
                serde_json::to_string(&values).map_err(anyhow::Error::from)?
            );
        }
        cli::RemoteCommand::Ask { prompt } => {
            let value = engine.invoker.generate_json(&prompt, scope).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&value).map_err(anyhow::Error::from)?
            );
        }
    }
    Ok(())
}

fn write_output(path: &Path, rendered: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    fs::write(path, format!("{rendered}\n")).with_context(|| format!("writing {}", path.display()))?;
    info!("study artifact written to {}", path.display());
    Ok(())
}
