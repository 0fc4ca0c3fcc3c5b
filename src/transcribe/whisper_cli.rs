use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

use super::Transcriber;
use crate::config::TranscriberConfig;
use crate::error::{Result, VidsubError};
use crate::transcript::{Segment, TranscriptionResult};

/// JSON document written by `whisper --output_format json`
#[derive(Debug, Clone, Deserialize)]
pub struct WhisperJsonOutput {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub segments: Vec<WhisperJsonSegment>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhisperJsonSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl From<WhisperJsonOutput> for TranscriptionResult {
    fn from(output: WhisperJsonOutput) -> Self {
        let segments = output
            .segments
            .into_iter()
            .map(|seg| Segment::new(seg.start, seg.end, seg.text.trim()))
            .collect();
        let language = output
            .language
            .map(|lang| lang.trim().to_string())
            .filter(|lang| !lang.is_empty());

        TranscriptionResult::new(language, segments)
    }
}

/// Runs the whisper command line tool on a media file and reads back its JSON output.
pub struct WhisperCliTranscriber {
    config: TranscriberConfig,
}

impl WhisperCliTranscriber {
    pub fn new(config: TranscriberConfig) -> Self {
        Self { config }
    }

    fn build_command(
        &self,
        media_path: &Path,
        output_dir: &Path,
        model_size: &str,
        language: Option<&str>,
    ) -> Command {
        let mut cmd = Command::new(&self.config.binary_path);
        cmd.arg(media_path)
            .arg("--model")
            .arg(model_size)
            .arg("--output_dir")
            .arg(output_dir)
            .arg("--output_format")
            .arg("json")
            .arg("--verbose")
            .arg("False");

        if let Some(lang) = language {
            cmd.arg("--language").arg(lang);
        }
        if let Some(device) = &self.config.device {
            cmd.arg("--device").arg(device);
        }

        cmd
    }
}

#[async_trait]
impl Transcriber for WhisperCliTranscriber {
    async fn transcribe(
        &self,
        media_path: &Path,
        model_size: &str,
        language: Option<&str>,
    ) -> Result<TranscriptionResult> {
        info!(
            "Transcribing {} with whisper model {}",
            media_path.display(),
            model_size
        );

        if !media_path.exists() {
            return Err(VidsubError::FileNotFound(media_path.display().to_string()));
        }

        let temp_dir = tempfile::tempdir().map_err(|e| {
            VidsubError::Transcriber(format!("Failed to create temp directory: {}", e))
        })?;

        let mut cmd = self.build_command(media_path, temp_dir.path(), model_size, language);
        debug!("Executing whisper command: {:?}", cmd);

        let output = cmd
            .output()
            .await
            .map_err(|e| VidsubError::Transcriber(format!("Failed to execute whisper: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VidsubError::Transcriber(format!("Whisper failed: {}", stderr)));
        }

        let media_stem = media_path
            .file_stem()
            .ok_or_else(|| VidsubError::Transcriber("Invalid media filename".to_string()))?;
        let json_file = temp_dir
            .path()
            .join(format!("{}.json", media_stem.to_string_lossy()));

        let json_content = tokio::fs::read_to_string(&json_file)
            .await
            .map_err(|e| VidsubError::Transcriber(format!("Failed to read output: {}", e)))?;

        let result = parse_whisper_json(&json_content)?;
        info!(
            "Transcription produced {} segments (language: {})",
            result.segments.len(),
            result.language.as_deref().unwrap_or("unknown")
        );
        Ok(result)
    }
}

/// Parse whisper's JSON output into a transcription result.
pub fn parse_whisper_json(content: &str) -> Result<TranscriptionResult> {
    let output: WhisperJsonOutput = serde_json::from_str(content)
        .map_err(|e| VidsubError::Transcriber(format!("Failed to parse whisper JSON: {}", e)))?;
    Ok(output.into())
}
