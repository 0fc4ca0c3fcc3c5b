// Speech recognition
//
// The workflow only depends on the `Transcriber` trait. The default
// implementation drives the `whisper` command line tool; other engines plug in
// by implementing the trait and adding a variant to the factory.

pub mod whisper_cli;

use async_trait::async_trait;
use std::path::Path;

use crate::config::TranscriberConfig;
use crate::error::Result;
use crate::transcript::TranscriptionResult;

pub use whisper_cli::WhisperCliTranscriber;

/// Turns a media file into a detected language plus ordered, timestamped segments.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        media_path: &Path,
        model_size: &str,
        language: Option<&str>,
    ) -> Result<TranscriptionResult>;
}

/// Factory for creating transcriber instances
pub struct TranscriberFactory;

impl TranscriberFactory {
    /// Create the default transcriber (whisper command line)
    pub fn create_default(config: TranscriberConfig) -> Box<dyn Transcriber> {
        Box::new(WhisperCliTranscriber::new(config))
    }
}
