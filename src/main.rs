//! vidsub command line entry point.
//!
//! The pipeline runs on a background task; this thread only renders the events
//! it emits.

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::unbounded_channel;
use tracing::{Level, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use vidsub::cli::{Args, Commands, JobArgs, find_video_files, render_events};
use vidsub::config::Config;
use vidsub::error::VidsubError;
use vidsub::language::{COMMON_LANGUAGES, display_name};
use vidsub::media::{MediaProcessorFactory, SubtitleStyle};
use vidsub::workflow::{Workflow, spawn_batch};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Commands::Process { inputs, job } => {
            run_pipeline(config, &job, inputs).await?;
        }
        Commands::Batch { input_dir, job } => {
            if !input_dir.is_dir() {
                return Err(VidsubError::Config(format!(
                    "Input path is not a directory: {}",
                    input_dir.display()
                ))
                .into());
            }
            let inputs = find_video_files(&input_dir);
            info!("Found {} video files to process", inputs.len());
            if inputs.is_empty() {
                println!("No video files found in {}", input_dir.display());
                return Ok(());
            }
            run_pipeline(config, &job, inputs).await?;
        }
        Commands::Burn {
            video,
            subtitles,
            output,
            font,
            font_size,
        } => {
            let style = SubtitleStyle::new(
                font.unwrap_or_else(|| config.media.font.clone()),
                font_size.unwrap_or(config.media.font_size),
            );
            let burner = MediaProcessorFactory::create_burner(config.media.clone());
            burner.check_availability().await?;
            let output = burner.burn(&video, &subtitles, &output, &style).await?;
            println!("Burned video written to {}", output.display());
        }
        Commands::Languages => {
            println!("{:<6} {:<20}", "Code", "Language");
            println!("{}", "-".repeat(26));
            for code in COMMON_LANGUAGES {
                println!("{:<6} {:<20}", code, display_name(code));
            }
            println!(
                "\nThe local model {} accepts {} language codes; the remote backend accepts any ISO 639 code.",
                config.translate.local.model,
                config.translate.local.languages.len()
            );
        }
        Commands::InitConfig { path, force } => {
            if path.exists() && !force {
                return Err(VidsubError::Config(format!(
                    "{} already exists, use --force to overwrite",
                    path.display()
                ))
                .into());
            }
            Config::default().save_to_file(&path)?;
            println!("Default configuration written to {}", path.display());
        }
    }

    Ok(())
}

/// Load `--config`, else `./config.toml` when present, else defaults
fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };
    Ok(config)
}

async fn run_pipeline(mut config: Config, job: &JobArgs, inputs: Vec<PathBuf>) -> Result<()> {
    job.apply(&mut config);

    let (tx, rx) = unbounded_channel();
    let workflow = Workflow::from_config(&config, Arc::new(tx))?;
    workflow.check_dependencies().await?;

    info!(
        "Processing {} files into {} with the {} backend",
        inputs.len(),
        workflow.options().output_dir.display(),
        workflow.backend_name()
    );

    let total = inputs.len() as u64;
    let handle = spawn_batch(workflow, inputs);
    let failed = render_events(rx, &progress_bar(), total).await;

    let report = handle
        .await
        .map_err(|e| anyhow::anyhow!("Pipeline task failed: {}", e))?;

    for outcome in &report.completed {
        let outputs: Vec<String> = [&outcome.translated_srt, &outcome.source_srt, &outcome.burned_video]
            .into_iter()
            .flatten()
            .map(|p| p.display().to_string())
            .collect();
        println!("{} -> {}", outcome.input.display(), outputs.join(", "));
    }
    for path in &report.skipped {
        println!("Not processed: {}", path.display());
    }

    if failed || !report.is_success() {
        anyhow::bail!("{} of {} files failed", report.failed.len(), total);
    }

    info!("vidsub completed successfully");
    Ok(())
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".vidsub").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Daily rotated log file, written off the calling thread
    let file_appender = rolling::daily(&log_dir, "vidsub.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("vidsub.log").display()
    );

    Ok(())
}
