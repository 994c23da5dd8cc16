//! `scribe` -- command-line client for the transcription backend.
//!
//! Uploads audio files, follows each task until it completes or fails,
//! and downloads the resulting transcripts.
//!
//! # Environment variables
//!
//! | Variable                      | Default                 | Description                        |
//! |-------------------------------|-------------------------|------------------------------------|
//! | `SCRIBE_API_URL`              | `http://127.0.0.1:5000` | Backend base URL                   |
//! | `SCRIBE_POLL_INTERVAL_MS`     | `2000`                  | Delay between status polls         |
//! | `SCRIBE_REQUEST_TIMEOUT_SECS` | `30`                    | Timeout for short requests         |
//! | `SCRIBE_CONNECT_TIMEOUT_SECS` | `10`                    | TCP connect timeout                |
//! | `RUST_LOG`                    | `scribe_cli=info,scribe_client=info` | Log filter            |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use scribe_cli::output;
use scribe_client::{
    ApiError, AudioFile, ClientConfig, ScribeApi, SubmitError, TaskOutcome, Tracker,
    TrackerEvent,
};
use scribe_core::lifecycle::{project, LifecycleState, Projection};
use scribe_core::results::materialize;
use scribe_core::submission::{SubmitOptions, WhisperModel};
use scribe_core::types::TaskId;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line client for the speech transcription backend
#[derive(Parser)]
#[command(name = "scribe", version, about, long_about = None)]
struct Cli {
    /// Backend base URL
    #[arg(long, global = true, env = "SCRIBE_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload audio files and follow them until they finish
    Transcribe {
        /// Audio files to transcribe
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Whisper model size
        #[arg(long, default_value = "small", value_parser = parse_model)]
        model: WhisperModel,

        /// Include segment timestamps
        #[arg(long)]
        timestamps: bool,

        /// Separate speakers (requires a token on the backend)
        #[arg(long)]
        diarization: bool,

        /// Expected number of speakers
        #[arg(long, requires = "diarization")]
        speakers: Option<u32>,

        /// Download every output file into this directory
        #[arg(long)]
        download_dir: Option<PathBuf>,

        /// Print tracker events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Show the current status of one task
    Status {
        task_id: String,
    },

    /// Download one output file
    Download {
        filename: String,

        /// Destination directory
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },

    /// Show or store the diarization token
    Token {
        #[command(subcommand)]
        command: TokenCommand,
    },

    /// Set the transcription language on the backend
    Language {
        /// Language code, e.g. `es` or `en`
        code: String,
    },

    /// Check backend health
    Health,
}

#[derive(Subcommand)]
enum TokenCommand {
    /// Show whether a token is configured
    Show,
    /// Store a new token
    Set { token: String },
}

fn parse_model(s: &str) -> Result<WhisperModel, String> {
    s.parse().map_err(|e: scribe_core::error::CoreError| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scribe_cli=info,scribe_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env().context("Invalid configuration")?;
    if let Some(url) = cli.api_url.as_deref() {
        config = config.with_api_url(url).context("Invalid --api-url")?;
    }
    let api = Arc::new(ScribeApi::from_config(&config).context("Failed to build HTTP client")?);

    match cli.command {
        Command::Transcribe {
            files,
            model,
            timestamps,
            diarization,
            speakers,
            download_dir,
            json,
        } => {
            let options = SubmitOptions {
                model,
                timestamps,
                diarization,
                speakers,
            };
            transcribe(api, &config, files, options, download_dir.as_deref(), json).await
        }
        Command::Status { task_id } => status(&api, &TaskId::new(task_id)).await,
        Command::Download { filename, dir } => {
            let path = api
                .download(&filename, &dir)
                .await
                .map_err(|e| explain(e, &config.api_url))?;
            println!("{}", path.display());
            Ok(())
        }
        Command::Token { command } => match command {
            TokenCommand::Show => {
                let cfg = api.get_config().await.map_err(|e| explain(e, &config.api_url))?;
                println!("{}", output::format_config(&cfg));
                Ok(())
            }
            TokenCommand::Set { token } => {
                api.set_token(&token).await.map_err(|e| explain(e, &config.api_url))?;
                println!("Token saved");
                Ok(())
            }
        },
        Command::Language { code } => {
            api.set_language(&code).await.map_err(|e| explain(e, &config.api_url))?;
            println!("Language set to {code}");
            Ok(())
        }
        Command::Health => {
            let health = api.health().await.map_err(|e| explain(e, &config.api_url))?;
            println!("{}", output::format_health(&health));
            if !health.is_ok() {
                bail!("Backend reported status '{}'", health.status);
            }
            Ok(())
        }
    }
}

async fn transcribe(
    api: Arc<ScribeApi>,
    config: &ClientConfig,
    paths: Vec<PathBuf>,
    options: SubmitOptions,
    download_dir: Option<&Path>,
    json: bool,
) -> Result<()> {
    if options.diarization {
        let cfg = api.get_config().await.map_err(|e| explain(e, &config.api_url))?;
        if !cfg.has_token {
            bail!("Diarization requires a token; store one with `scribe token set <TOKEN>`");
        }
    }

    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        let file = AudioFile::from_path(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        files.push(file);
    }

    let sizes: Vec<u64> = files.iter().map(AudioFile::size).collect();
    if let Some(estimate) = output::format_estimate(&sizes, options.model) {
        println!("{estimate}");
    }

    let tracker = Tracker::new(api.clone(), config.poll_config());
    let mut events = tracker.subscribe();

    let ids = match tracker.submit(files, &options).await {
        Ok(ids) => ids,
        Err(SubmitError::Unreachable { url }) => bail!(output::unreachable_hint(&url)),
        Err(e) => return Err(e.into()),
    };
    if ids.is_empty() {
        println!("Nothing to transcribe");
        return Ok(());
    }
    tracing::info!(tasks = ids.len(), "Batch accepted");

    let interrupted = loop {
        tokio::select! {
            biased;
            event = events.recv() => match event {
                Ok(event) => print_event(&event, json),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event stream lagged");
                }
                Err(RecvError::Closed) => break false,
            },
            _ = tracker.wait_idle() => break false,
            _ = tokio::signal::ctrl_c() => break true,
        }
    };
    if interrupted {
        tracing::warn!("Interrupted, stopping poll loops");
        tracker.shutdown().await;
    }
    while let Ok(event) = events.try_recv() {
        print_event(&event, json);
    }

    println!();
    let settled = tracker.registry().settled_tasks().await;
    let mut failures = 0usize;
    for snapshot in settled.iter().rev() {
        for line in output::format_snapshot(snapshot) {
            println!("{line}");
        }
        match &snapshot.outcome {
            Some(TaskOutcome::Completed(result)) => {
                if let Some(dir) = download_dir {
                    for file in &result.files {
                        let path = api
                            .download(&file.filename, dir)
                            .await
                            .with_context(|| format!("Failed to download {}", file.filename))?;
                        println!("  -> {}", path.display());
                    }
                }
            }
            Some(TaskOutcome::Failed(_)) => failures += 1,
            _ => {}
        }
    }

    if failures > 0 {
        bail!("{failures} of {} tasks failed", ids.len());
    }
    Ok(())
}

async fn status(api: &ScribeApi, task_id: &TaskId) -> Result<()> {
    let payload = api
        .get_status(task_id)
        .await
        .map_err(|e| explain(e, api.api_url()))?;

    match project(&payload) {
        Projection::Active { state, progress } => {
            println!("{task_id}: {} {}", state.label(), output::progress_bar(progress));
        }
        Projection::Completed { .. } => {
            println!("{task_id}: {}", LifecycleState::Completed.label());
            for line in output::format_result(&materialize(&payload)) {
                println!("{line}");
            }
        }
        Projection::Errored { message } => {
            println!("{task_id}: {}: {message}", LifecycleState::Errored.label());
        }
        Projection::Unrecognized { status } => {
            println!("{task_id}: unknown status '{status}'");
        }
    }
    Ok(())
}

fn print_event(event: &TrackerEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize event"),
        }
    } else {
        println!("{}", output::format_event(event));
    }
}

/// Attach connection guidance to unreachable-backend errors.
fn explain(err: ApiError, url: &str) -> anyhow::Error {
    match err {
        ApiError::Unreachable { .. } => anyhow::anyhow!(output::unreachable_hint(url)),
        other => other.into(),
    }
}
