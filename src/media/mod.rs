// Media processing
//
// - Commands: ffmpeg command builder and subtitle filter helpers
// - Processor: ffmpeg-backed `VideoBurner`

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;

/// Re-encodes a video with a subtitle file composited into the image.
#[async_trait]
pub trait VideoBurner: Send + Sync {
    /// Burn `subtitle_path` into `video_path`, writing `output_path`. Returns the output path.
    async fn burn(
        &self,
        video_path: &Path,
        subtitle_path: &Path,
        output_path: &Path,
        style: &SubtitleStyle,
    ) -> Result<PathBuf>;

    /// Check if the external encoder can be run
    async fn check_availability(&self) -> Result<()>;
}

/// Factory for creating video burner instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default burner implementation (FFmpeg-based)
    pub fn create_burner(config: MediaConfig) -> Box<dyn VideoBurner> {
        Box::new(processor::FfmpegBurner::new(config))
    }
}
