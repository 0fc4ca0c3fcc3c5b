use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{Result, VidsubError};
use crate::transcript::Segment;

/// Serialize segments as SRT text: entries numbered from 1, separated by a blank line.
pub fn format_srt(segments: &[Segment]) -> String {
    let mut srt_content = String::new();

    for (index, segment) in segments.iter().enumerate() {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_srt_time(segment.start),
            format_srt_time(segment.end),
            segment.text.trim()
        ));
    }

    srt_content
}

/// Write segments to `output_path` as SRT, creating parent directories as needed.
pub async fn write_srt<P: AsRef<Path>>(segments: &[Segment], output_path: P) -> Result<PathBuf> {
    let output_path = output_path.as_ref();
    info!("Generating SRT file: {}", output_path.display());

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await.map_err(|e| {
                VidsubError::Subtitle(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    fs::write(output_path, format_srt(segments)).await.map_err(|e| {
        VidsubError::Subtitle(format!("Failed to write {}: {}", output_path.display(), e))
    })?;

    debug!("Wrote {} subtitle entries", segments.len());
    Ok(output_path.to_path_buf())
}

/// Format time in seconds to SRT time format (HH:MM:SS,mmm)
fn format_srt_time(seconds: f64) -> String {
    let total_milliseconds = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}
