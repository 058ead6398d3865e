mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use conclave_core::Task;
use conclave_orchestrator::{CancellationToken, Orchestrator, TranscriptRecorder};
use conclave_session::FileTranscriptStore;
use config::{AgentSpec, ConclaveConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "conclave", about = "Conclave: multi-agent compliance review")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = "conclave.toml")]
    config: PathBuf,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one review session and print the report as JSON
    Run {
        /// The compliance request
        #[arg(short, long)]
        task: String,
        /// Regulation or policy scope, e.g. "GDPR"
        #[arg(long)]
        scope: Option<String>,
        /// System under review
        #[arg(long)]
        target: Option<String>,
        /// Write the transcript as JSON Lines into this directory
        #[arg(long)]
        transcript_dir: Option<PathBuf>,
    },
    /// Check a config file without running anything
    Validate,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = ConclaveConfig::load(&cli.config).await?;

    match cli.command {
        Commands::Validate => {
            let agents = config.agents.len();
            build(config, None)?;
            info!(config = %cli.config.display(), agents, "Config is valid");
            println!("{}: ok ({agents} agents)", cli.config.display());
        }
        Commands::Run {
            task,
            scope,
            target,
            transcript_dir,
        } => {
            let recorder = match transcript_dir {
                Some(dir) => {
                    let store = FileTranscriptStore::new(dir.clone())
                        .await
                        .with_context(|| format!("Failed to open {}", dir.display()))?;
                    Some(Arc::new(TranscriptRecorder::new(Arc::new(store))))
                }
                None => None,
            };
            let orchestrator = build(config, recorder)?;

            let mut task = Task::new(task);
            if let Some(scope) = scope {
                task = task.with_scope(scope);
            }
            if let Some(target) = target {
                task = task.with_target_system(target);
            }

            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, finishing with a partial report");
                    on_ctrl_c.cancel();
                }
            });

            let outcome = orchestrator.run_until_cancelled(task, cancel).await?;
            println!("{}", serde_json::to_string_pretty(&outcome.report)?);
        }
    }

    Ok(())
}

fn build(
    config: ConclaveConfig,
    recorder: Option<Arc<TranscriptRecorder>>,
) -> anyhow::Result<Orchestrator> {
    let mut builder = Orchestrator::builder(config.orchestrator);
    for agent in config.agents {
        builder = builder.agent(AgentSpec::into_descriptor(agent));
    }
    if let Some(recorder) = recorder {
        builder = builder.observer(recorder);
    }
    Ok(builder.build()?)
}
