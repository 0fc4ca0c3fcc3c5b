use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, VidsubError};

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Set audio codec
    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Copy audio stream
    pub fn copy_audio(self) -> Self {
        self.audio_codec("copy")
    }

    /// Add video filter
    pub fn video_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-vf").arg(filter)
    }

    /// Execute the command; a non-zero exit is an error carrying stderr
    pub async fn execute(&self) -> Result<()> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| VidsubError::Media(format!("Failed to execute media processor: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VidsubError::Media(format!(
                "{} failed ({}): {}",
                self.description, output.status, stderr
            )));
        }

        Ok(())
    }
}

/// Font settings applied to burned-in subtitles
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleStyle {
    pub font: String,
    pub font_size: u32,
}

impl SubtitleStyle {
    pub fn new(font: impl Into<String>, font_size: u32) -> Self {
        Self {
            font: font.into(),
            font_size,
        }
    }

    /// ASS `force_style` value: white text on a translucent box
    pub fn force_style(&self) -> String {
        format!(
            "Fontname={},Fontsize={},PrimaryColour=&H00FFFFFF&,\
             Outline=1,BorderStyle=3,BackColour=&H50000000&",
            self.font, self.font_size
        )
    }
}

/// Escape a path for use inside the ffmpeg `subtitles` filter.
///
/// Windows separators become forward slashes. Elsewhere a backslash is part of
/// the file name and is escaped for both filter parsing levels, like `'`.
/// `:` (including a drive letter colon) is escaped everywhere.
pub fn escape_filter_path(path: &Path) -> String {
    let path = path.to_string_lossy();
    #[cfg(windows)]
    let path = path.replace('\\', "/");
    #[cfg(not(windows))]
    let path = path.replace('\\', "\\\\\\\\");
    path.replace(':', "\\:").replace('\'', "\\\\'")
}

/// Builder for common media processing operations
pub struct MediaCommandBuilder {
    binary_path: String,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Build subtitle burning command
    pub fn burn_subtitles(
        &self,
        video_path: &Path,
        subtitle_path: &Path,
        output_path: &Path,
        style: &SubtitleStyle,
        additional_options: &[String],
    ) -> MediaCommand {
        let filter = format!(
            "subtitles='{}':charenc=UTF-8:force_style='{}'",
            escape_filter_path(subtitle_path),
            style.force_style()
        );

        MediaCommand::new(&self.binary_path, "Subtitle burning")
            .overwrite()
            .input(video_path)
            .video_filter(filter)
            .copy_audio()
            .args(additional_options.iter().cloned())
            .output(output_path)
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check").arg("-version")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_filter_path() {
        assert_eq!(
            escape_filter_path(Path::new("/tmp/out/clip_zh.srt")),
            "/tmp/out/clip_zh.srt"
        );
        assert_eq!(
            escape_filter_path(Path::new("/tmp/it's:v.srt")),
            "/tmp/it\\\\'s\\:v.srt"
        );
    }

    #[cfg(windows)]
    #[test]
    fn test_escape_filter_path_windows_separators() {
        assert_eq!(
            escape_filter_path(Path::new("C:\\Videos\\it's.srt")),
            "C\\:/Videos/it\\\\'s.srt"
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn test_escape_filter_path_keeps_unix_backslash() {
        assert_eq!(
            escape_filter_path(Path::new("/tmp/a\\b.srt")),
            "/tmp/a\\\\\\\\b.srt"
        );
    }

    #[test]
    fn test_burn_subtitles_command() {
        let builder = MediaCommandBuilder::new("ffmpeg");
        let style = SubtitleStyle::new("Noto Sans", 28);
        let cmd = builder.burn_subtitles(
            Path::new("/in/a.mp4"),
            Path::new("/out/a_zh.srt"),
            Path::new("/out/a_zh_sub.mp4"),
            &style,
            &["-crf".to_string(), "23".to_string()],
        );

        assert_eq!(cmd.binary_path, "ffmpeg");
        assert_eq!(
            cmd.args,
            vec![
                "-y".to_string(),
                "-i".to_string(),
                "/in/a.mp4".to_string(),
                "-vf".to_string(),
                "subtitles='/out/a_zh.srt':charenc=UTF-8:force_style='Fontname=Noto Sans,Fontsize=28,PrimaryColour=&H00FFFFFF&,Outline=1,BorderStyle=3,BackColour=&H50000000&'".to_string(),
                "-c:a".to_string(),
                "copy".to_string(),
                "-crf".to_string(),
                "23".to_string(),
                "/out/a_zh_sub.mp4".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_execute_reports_missing_binary() {
        let cmd = MediaCommand::new("/nonexistent/ffmpeg-binary", "Version check").arg("-version");
        assert!(matches!(cmd.execute().await, Err(VidsubError::Media(_))));
    }
}
