//! Per-file pipeline and batch driver.
//!
//! Each file goes through `Transcribing -> Translating -> WritingSubtitles ->
//! Burning (optional) -> Cleanup -> Done`. Files are processed one after
//! another; the translation backend is created once and reused for the whole
//! batch.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::{Config, FailurePolicy, JobOptions};
use crate::error::{Result, VidsubError};
use crate::language;
use crate::media::{MediaProcessorFactory, SubtitleStyle, VideoBurner};
use crate::progress::{EventSink, PipelineEvent, completion_percent};
use crate::subtitle::write_srt;
use crate::transcribe::{Transcriber, TranscriberFactory};
use crate::translate::{TranslationBackend, TranslatorFactory, ensure_aligned};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStage {
    Transcribing,
    Translating,
    WritingSubtitles,
    Burning,
    Cleanup,
    Done,
}

impl fmt::Display for FileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileStage::Transcribing => "transcribing",
            FileStage::Translating => "translating",
            FileStage::WritingSubtitles => "writing subtitles",
            FileStage::Burning => "burning",
            FileStage::Cleanup => "cleanup",
            FileStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Output locations for one input file.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    /// `<stem>_<target_lang>.srt`
    pub translated_srt: PathBuf,
    /// `<stem>_source.srt`
    pub source_srt: PathBuf,
    /// `<stem>_<target_lang>_sub.mp4`
    pub burned_video: PathBuf,
}

impl ArtifactPaths {
    pub fn new(output_dir: &Path, stem: &str, target_lang: &str) -> Self {
        Self {
            translated_srt: output_dir.join(format!("{}_{}.srt", stem, target_lang)),
            source_srt: output_dir.join(format!("{}_source.srt", stem)),
            burned_video: output_dir.join(format!("{}_{}_sub.mp4", stem, target_lang)),
        }
    }
}

/// The standalone translated subtitle is kept when the user asked for it, or
/// when no video was burned and the subtitle is the only deliverable.
pub fn keep_translated_srt(export_srt: bool, burned: bool) -> bool {
    export_srt || !burned
}

/// Artifacts left on disk for a successfully processed file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub source_lang: String,
    pub segments: usize,
    pub translated_srt: Option<PathBuf>,
    pub source_srt: Option<PathBuf>,
    pub burned_video: Option<PathBuf>,
}

/// A file that failed, and the stage it failed in.
#[derive(Debug)]
pub struct FileFailure {
    pub input: PathBuf,
    pub stage: FileStage,
    pub error: VidsubError,
}

impl FileFailure {
    fn message(&self) -> String {
        format!(
            "Failed to process {} while {}: {}",
            self.input.display(),
            self.stage,
            self.error
        )
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub completed: Vec<FileOutcome>,
    pub failed: Vec<FileFailure>,
    /// Files never started because an earlier failure stopped the batch
    pub skipped: Vec<PathBuf>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Render an error and its source chain for the error channel.
pub fn error_detail(error: &(dyn std::error::Error + 'static)) -> String {
    let mut detail = format!("{:?}", error);
    let mut source = error.source();
    while let Some(cause) = source {
        detail.push_str(&format!("\nCaused by: {}", cause));
        source = cause.source();
    }
    detail
}

pub struct Workflow {
    options: JobOptions,
    transcriber: Box<dyn Transcriber>,
    translator: Box<dyn TranslationBackend>,
    burner: Box<dyn VideoBurner>,
    events: Arc<dyn EventSink>,
}

impl Workflow {
    pub fn new(
        options: JobOptions,
        transcriber: Box<dyn Transcriber>,
        translator: Box<dyn TranslationBackend>,
        burner: Box<dyn VideoBurner>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            transcriber,
            translator,
            burner,
            events,
        })
    }

    /// Build the workflow and its default collaborators from configuration
    pub fn from_config(config: &Config, events: Arc<dyn EventSink>) -> Result<Self> {
        let options = JobOptions::from_config(config)?;
        let transcriber = TranscriberFactory::create_default(config.transcriber.clone());
        let translator =
            TranslatorFactory::create_backend(options.translation_backend, &config.translate)?;
        let burner = MediaProcessorFactory::create_burner(config.media.clone());

        Self::new(options, transcriber, translator, burner, events)
    }

    pub fn options(&self) -> &JobOptions {
        &self.options
    }

    pub fn backend_name(&self) -> &'static str {
        self.translator.name()
    }

    /// Check external tools needed by the configured options
    pub async fn check_dependencies(&self) -> Result<()> {
        if self.options.burn_subtitles {
            self.burner.check_availability().await?;
        }
        Ok(())
    }

    /// Process files in order. Emits one `FileProgress` per finished file and
    /// exactly one `Finished` at the end.
    pub async fn run_batch(&mut self, files: &[PathBuf]) -> BatchReport {
        let total = files.len();
        let mut report = BatchReport::default();
        info!(
            "Starting batch of {} files with {} translation backend",
            total,
            self.translator.name()
        );

        for (index, file) in files.iter().enumerate() {
            match self.process_file(file).await {
                Ok(outcome) => {
                    info!("Successfully processed: {}", file.display());
                    report.completed.push(outcome);
                }
                Err(failure) => {
                    let message = failure.message();
                    error!("{}", message);
                    self.events.emit(PipelineEvent::Error {
                        message,
                        detail: error_detail(&failure.error),
                    });
                    report.failed.push(failure);

                    if self.options.failure_policy == FailurePolicy::AbortBatch {
                        report.skipped = files[index + 1..].to_vec();
                        if !report.skipped.is_empty() {
                            warn!("Batch aborted, {} files not processed", report.skipped.len());
                        }
                        break;
                    }
                }
            }

            self.events.emit(PipelineEvent::FileProgress {
                path: file.clone(),
                percent: completion_percent(index + 1, total),
            });
        }

        self.events.emit(PipelineEvent::Finished);
        info!(
            "Batch finished: {} completed, {} failed, {} skipped",
            report.completed.len(),
            report.failed.len(),
            report.skipped.len()
        );
        report
    }

    /// Run one file through every stage.
    pub async fn process_file(&mut self, path: &Path) -> std::result::Result<FileOutcome, FileFailure> {
        let mut stage = FileStage::Transcribing;
        let span = info_span!("file", path = %path.display());

        let result = self.run_stages(path, &mut stage).instrument(span).await;
        result.map_err(|error| FileFailure {
            input: path.to_path_buf(),
            stage,
            error,
        })
    }

    async fn run_stages(&mut self, path: &Path, stage: &mut FileStage) -> Result<FileOutcome> {
        let input = std::path::absolute(path)?;
        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| input.display().to_string());
        let stem = input
            .file_stem()
            .ok_or_else(|| VidsubError::Config(format!("Invalid video filename: {}", input.display())))?
            .to_string_lossy()
            .to_string();
        let events = Arc::clone(&self.events);
        let options = &self.options;

        events.progress(format!("Processing: {}", file_name));

        // Transcribe
        *stage = FileStage::Transcribing;
        events.progress(format!("Transcribing with whisper model {}...", options.model_size));
        let transcription = self
            .transcriber
            .transcribe(&input, &options.model_size, options.source_lang.as_deref())
            .await?;
        events.progress(format!(
            "Transcription finished: {} segments",
            transcription.segments.len()
        ));
        if transcription.is_empty() {
            warn!("No speech segments found in {}", file_name);
        }

        let source_lang = match (&options.source_lang, &transcription.language) {
            (Some(configured), _) => configured.clone(),
            (None, Some(detected)) => {
                events.progress(format!("Detected language: {}", detected));
                detected.clone()
            }
            (None, None) => language::AUTO.to_string(),
        };
        let target_lang = options.target_lang.as_str();

        // Translate
        *stage = FileStage::Translating;
        self.translator.check_languages(&source_lang, target_lang)?;
        events.progress(format!(
            "Translating {} -> {} ({} backend)...",
            source_lang,
            target_lang,
            self.translator.name()
        ));
        let translated = self
            .translator
            .translate(
                &transcription.segments,
                &source_lang,
                target_lang,
                options.domain.as_deref(),
                events.as_ref(),
            )
            .await?;
        ensure_aligned(&transcription.segments, &translated)?;

        // Write subtitles
        *stage = FileStage::WritingSubtitles;
        tokio::fs::create_dir_all(&options.output_dir).await?;
        let artifacts = ArtifactPaths::new(&options.output_dir, &stem, target_lang);

        write_srt(&translated, &artifacts.translated_srt).await?;
        events.progress(format!(
            "Translated subtitles written: {}",
            artifacts.translated_srt.display()
        ));

        let source_srt = if options.keep_source_srt {
            write_srt(&transcription.segments, &artifacts.source_srt).await?;
            events.progress(format!(
                "Source subtitles written: {}",
                artifacts.source_srt.display()
            ));
            Some(artifacts.source_srt.clone())
        } else {
            None
        };

        // Burn
        let burned_video = if options.burn_subtitles {
            *stage = FileStage::Burning;
            events.progress(format!("Burning subtitles into {}...", file_name));
            let style = SubtitleStyle::new(options.font.clone(), options.font_size);
            let output = self
                .burner
                .burn(&input, &artifacts.translated_srt, &artifacts.burned_video, &style)
                .await?;
            events.progress(format!("Burned video written: {}", output.display()));
            Some(output)
        } else {
            events.progress("Burning skipped, subtitle files only".to_string());
            None
        };

        // Cleanup
        *stage = FileStage::Cleanup;
        let translated_srt = if keep_translated_srt(options.export_srt, burned_video.is_some()) {
            Some(artifacts.translated_srt.clone())
        } else {
            match tokio::fs::remove_file(&artifacts.translated_srt).await {
                Ok(()) => debug!("Removed {}", artifacts.translated_srt.display()),
                Err(e) => debug!(
                    "Could not remove {}: {}",
                    artifacts.translated_srt.display(),
                    e
                ),
            }
            None
        };

        *stage = FileStage::Done;
        events.progress(format!("Finished: {}", file_name));

        Ok(FileOutcome {
            input,
            source_lang,
            segments: translated.len(),
            translated_srt,
            source_srt,
            burned_video,
        })
    }
}

/// Run a batch on a background task. Events go to the sink the workflow was built with.
pub fn spawn_batch(mut workflow: Workflow, files: Vec<PathBuf>) -> JoinHandle<BatchReport> {
    tokio::spawn(async move { workflow.run_batch(&files).await })
}
