use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error};
use walkdir::WalkDir;

use crate::config::{Config, TranslationBackendKind};
use crate::progress::PipelineEvent;

/// Video extensions picked up by `batch`
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "mov", "avi", "flv", "webm"];

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transcribe, translate and subtitle the given video files, in order
    Process {
        /// Input video files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Process every video file found in a directory
    Batch {
        /// Input directory containing video files
        #[arg(short, long)]
        input_dir: PathBuf,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Burn an existing subtitle file into a video
    Burn {
        /// Input video file
        #[arg(short, long)]
        video: PathBuf,

        /// Subtitle file
        #[arg(short, long)]
        subtitles: PathBuf,

        /// Output video file
        #[arg(short, long)]
        output: PathBuf,

        /// Subtitle font
        #[arg(long)]
        font: Option<String>,

        /// Subtitle font size
        #[arg(long)]
        font_size: Option<u32>,
    },

    /// List languages supported by the local translation model
    Languages,

    /// Write the default configuration to a file
    InitConfig {
        /// Destination path
        #[arg(short, long, default_value = "config.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Local,
    Remote,
}

impl From<BackendArg> for TranslationBackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Local => TranslationBackendKind::Local,
            BackendArg::Remote => TranslationBackendKind::Remote,
        }
    }
}

/// Per-run overrides on top of the configuration file
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct JobArgs {
    /// Target language code
    #[arg(short, long)]
    pub target_lang: Option<String>,

    /// Source language code (detected by whisper when omitted)
    #[arg(short, long)]
    pub source_lang: Option<String>,

    /// Whisper model size
    #[arg(short, long)]
    pub model_size: Option<String>,

    /// Output directory for processed files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Translation backend
    #[arg(long, value_enum)]
    pub backend: Option<BackendArg>,

    /// Model used by the local backend
    #[arg(long)]
    pub translation_model: Option<String>,

    /// Chat completions endpoint used by the remote backend
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Model name sent to the remote endpoint
    #[arg(long)]
    pub remote_model: Option<String>,

    /// Domain hint for the remote model (e.g. "medical", "gaming")
    #[arg(long)]
    pub domain: Option<String>,

    /// Subtitle font for burning
    #[arg(long)]
    pub font: Option<String>,

    /// Subtitle font size for burning
    #[arg(long)]
    pub font_size: Option<u32>,

    /// Do not burn subtitles into a new video
    #[arg(long)]
    pub no_burn: bool,

    /// Delete the translated subtitle file once it has been burned in
    #[arg(long)]
    pub no_export_srt: bool,

    /// Do not write the untranslated subtitle file
    #[arg(long)]
    pub no_source_srt: bool,

    /// Keep going with the next file when one fails
    #[arg(long)]
    pub continue_on_error: bool,
}

impl JobArgs {
    /// Apply command line overrides to a loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(lang) = &self.target_lang {
            config.translate.target_lang = lang.clone();
        }
        if let Some(lang) = &self.source_lang {
            config.translate.source_lang = lang.clone();
        }
        if let Some(size) = &self.model_size {
            config.transcriber.model_size = size.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output.output_dir = dir.clone();
        }
        if let Some(backend) = self.backend {
            config.translate.backend = backend.into();
        }
        if let Some(model) = &self.translation_model {
            config.translate.local.model = model.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            config.translate.remote.endpoint = endpoint.clone();
        }
        if let Some(model) = &self.remote_model {
            config.translate.remote.model = model.clone();
        }
        if let Some(domain) = &self.domain {
            config.translate.domain = domain.clone();
        }
        if let Some(font) = &self.font {
            config.media.font = font.clone();
        }
        if let Some(size) = self.font_size {
            config.media.font_size = size;
        }
        if self.no_burn {
            config.output.burn_subtitles = false;
        }
        if self.no_export_srt {
            config.output.export_srt = false;
        }
        if self.no_source_srt {
            config.output.keep_source_srt = false;
        }
        if self.continue_on_error {
            config.output.continue_on_error = true;
        }
    }
}

/// Collect video files under `dir`, sorted by path
pub fn find_video_files(dir: &Path) -> Vec<PathBuf> {
    let mut video_files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_video_file(path))
        .collect();

    video_files.sort();
    video_files
}

fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Drive a progress bar from pipeline events until the channel closes.
/// Returns whether any error was reported.
///
/// Progress lines only reach the log at debug level; the bar shows them.
/// Errors are logged with the bar suspended so console output stays intact.
pub async fn render_events(
    mut rx: UnboundedReceiver<PipelineEvent>,
    bar: &ProgressBar,
    total: u64,
) -> bool {
    let mut failed = false;
    let mut done = 0u64;
    while let Some(event) = rx.recv().await {
        match event {
            PipelineEvent::Progress(message) => {
                debug!("{}", message);
                bar.set_message(message);
            }
            PipelineEvent::FileProgress { path, percent } => {
                done += 1;
                bar.set_position(u64::from(percent));
                bar.println(format!("[{}/{}] {}", done, total, path.display()));
            }
            PipelineEvent::Error { message, detail } => {
                failed = true;
                bar.suspend(|| error!("{}\n{}", message, detail));
            }
            PipelineEvent::Finished => {
                bar.finish_with_message("done");
            }
        }
    }

    failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tracing::instrument::WithSubscriber;

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLog {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
        }
    }

    #[test]
    fn test_parse_process_command() {
        let args = Args::try_parse_from([
            "vidsub",
            "process",
            "a.mp4",
            "b.mkv",
            "--target-lang",
            "ja",
            "--backend",
            "remote",
            "--no-burn",
        ])
        .unwrap();

        match args.command {
            Commands::Process { inputs, job } => {
                assert_eq!(inputs, vec![PathBuf::from("a.mp4"), PathBuf::from("b.mkv")]);
                assert_eq!(job.target_lang.as_deref(), Some("ja"));
                assert_eq!(job.backend, Some(BackendArg::Remote));
                assert!(job.no_burn);
            }
            _ => panic!("expected process command"),
        }
    }

    #[test]
    fn test_process_requires_inputs() {
        assert!(Args::try_parse_from(["vidsub", "process"]).is_err());
    }

    #[test]
    fn test_job_args_override_config() {
        let mut config = Config::default();
        let job = JobArgs {
            target_lang: Some("fr".to_string()),
            backend: Some(BackendArg::Remote),
            endpoint: Some("http://localhost:9000/v1/chat/completions".to_string()),
            font_size: Some(20),
            no_export_srt: true,
            continue_on_error: true,
            ..JobArgs::default()
        };
        job.apply(&mut config);

        assert_eq!(config.translate.target_lang, "fr");
        assert_eq!(config.translate.backend, TranslationBackendKind::Remote);
        assert_eq!(
            config.translate.remote.endpoint,
            "http://localhost:9000/v1/chat/completions"
        );
        assert_eq!(config.media.font_size, 20);
        assert!(!config.output.export_srt);
        assert!(config.output.burn_subtitles);
        assert!(config.output.continue_on_error);
    }

    #[test]
    fn test_find_video_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("nested")).unwrap();
        for name in ["b.MP4", "a.mkv", "notes.txt", "nested/c.webm", "clip.srt"] {
            std::fs::write(root.join(name), b"").unwrap();
        }

        let found = find_video_files(root);
        assert_eq!(
            found,
            vec![root.join("a.mkv"), root.join("b.MP4"), root.join("nested/c.webm")]
        );
    }

    #[tokio::test]
    async fn test_render_events_keeps_progress_out_of_info_log() {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tx.send(PipelineEvent::Progress("Transcribing with whisper model small...".to_string()))
            .unwrap();
        tx.send(PipelineEvent::FileProgress {
            path: PathBuf::from("a.mp4"),
            percent: 100,
        })
        .unwrap();
        tx.send(PipelineEvent::Error {
            message: "Failed to process a.mp4 while burning".to_string(),
            detail: "Media(\"exit 1\")".to_string(),
        })
        .unwrap();
        tx.send(PipelineEvent::Finished).unwrap();
        drop(tx);

        let bar = ProgressBar::hidden();
        let failed = render_events(rx, &bar, 1)
            .with_subscriber(subscriber)
            .await;

        assert!(failed);
        assert!(bar.is_finished());
        let text = log.text();
        assert!(!text.contains("Transcribing with whisper model"), "{}", text);
        assert!(text.contains("Failed to process a.mp4 while burning"), "{}", text);
    }

    #[tokio::test]
    async fn test_render_events_without_errors() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tx.send(PipelineEvent::Progress("Processing: a.mp4".to_string()))
            .unwrap();
        tx.send(PipelineEvent::Finished).unwrap();
        drop(tx);

        let bar = ProgressBar::hidden();
        assert!(!render_events(rx, &bar, 1).await);
        assert_eq!(bar.message(), "done");
    }
}
