use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{MediaCommandBuilder, SubtitleStyle, VideoBurner};
use crate::config::MediaConfig;
use crate::error::{Result, VidsubError};

/// Burns subtitles with ffmpeg's `subtitles` filter
pub struct FfmpegBurner {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl FfmpegBurner {
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path);

        Self {
            config,
            command_builder,
        }
    }
}

#[async_trait]
impl VideoBurner for FfmpegBurner {
    async fn burn(
        &self,
        video_path: &Path,
        subtitle_path: &Path,
        output_path: &Path,
        style: &SubtitleStyle,
    ) -> Result<PathBuf> {
        info!(
            "Burning subtitles from {} into {} -> {}",
            subtitle_path.display(),
            video_path.display(),
            output_path.display()
        );

        if !video_path.exists() {
            return Err(VidsubError::FileNotFound(video_path.display().to_string()));
        }
        if !subtitle_path.exists() {
            return Err(VidsubError::FileNotFound(subtitle_path.display().to_string()));
        }

        let video_path = std::path::absolute(video_path)?;
        let subtitle_path = std::path::absolute(subtitle_path)?;
        let output_path = std::path::absolute(output_path)?;
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let command = self.command_builder.burn_subtitles(
            &video_path,
            &subtitle_path,
            &output_path,
            style,
            &self.config.subtitle_options,
        );
        command.execute().await?;

        info!("Subtitle burning completed successfully");
        Ok(output_path)
    }

    async fn check_availability(&self) -> Result<()> {
        self.command_builder
            .version_check()
            .execute()
            .await
            .map_err(|e| VidsubError::Media(format!("Media processor not available: {}", e)))?;

        info!("Media processor is available");
        Ok(())
    }
}
