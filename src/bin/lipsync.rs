//! CLI binary for building viseme timelines.
//!
//! Reads a transcript and an optional WAV file, runs the lip-sync pipeline
//! and prints the resulting timeline as JSON on stdout. Tracing goes to
//! stderr so the output can be piped.

use anyhow::Context;
use clap::Parser;
use fae_lipsync::{LipSyncConfig, LipSyncPipeline, TimelineRequest, TimelineResult, Viseme};
use serde::Serialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Build a viseme timeline for synthesized speech.
#[derive(Parser)]
#[command(name = "fae-lipsync", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, env = "FAE_LIPSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Transcript text.
    #[arg(short, long, conflicts_with = "text_file")]
    text: Option<String>,

    /// Read the transcript from a file.
    #[arg(long)]
    text_file: Option<PathBuf>,

    /// WAV file produced by the TTS engine.
    #[arg(short, long)]
    wav: Option<PathBuf>,

    /// Skip forced alignment and always use the heuristic timeline.
    #[arg(long)]
    no_align: bool,

    /// Override the aligner endpoint URL.
    #[arg(long, env = "FAE_LIPSYNC_ALIGNER")]
    aligner: Option<String>,

    /// Seed for fallback jitter.
    #[arg(long)]
    seed: Option<u64>,

    /// Also emit one viseme per frame at this rate.
    #[arg(long)]
    fps: Option<f64>,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,
}

/// Output document: the pipeline result plus optional frames.
#[derive(Serialize)]
struct Output {
    #[serde(flatten)]
    result: TimelineResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    fps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frames: Option<Vec<Viseme>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("fae_lipsync=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let transcript = match (&cli.text, &cli.text_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read transcript {}", path.display()))?,
        (None, None) => String::new(),
    };
    let wav = match &cli.wav {
        Some(path) => Some(
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?,
        ),
        None => None,
    };
    if let Some(fps) = cli.fps
        && (!fps.is_finite() || fps <= 0.0)
    {
        anyhow::bail!("--fps must be a positive number, got {fps}");
    }

    let pipeline = LipSyncPipeline::from_config(config)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, skipping alignment");
            ctrl_c.cancel();
        }
    });

    let mut request = TimelineRequest::new(&transcript);
    if let Some(bytes) = wav.as_deref() {
        request = request.with_wav(bytes);
    }
    let result = pipeline.build_with(request, &cancel).await?;

    let frames = cli.fps.map(|fps| result.timeline.frames(fps));
    let output = Output {
        result,
        fps: cli.fps,
        frames,
    };
    let json = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{json}");
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<LipSyncConfig> {
    let mut config = match &cli.config {
        Some(path) => LipSyncConfig::from_file(path)?,
        None => {
            let path = LipSyncConfig::default_config_path();
            if path.is_file() {
                LipSyncConfig::from_file(&path)?
            } else {
                LipSyncConfig::default()
            }
        }
    };

    if cli.no_align {
        config.aligner.enabled = false;
    }
    if let Some(url) = &cli.aligner {
        config.aligner.endpoint_url = url.clone();
    }
    if cli.seed.is_some() {
        config.fallback.seed = cli.seed;
    }
    Ok(config)
}
