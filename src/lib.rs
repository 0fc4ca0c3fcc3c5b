//! vidsub - batch video subtitling
//!
//! Transcribes videos with whisper, translates the segments with a local model
//! or a remote chat completions endpoint, writes SRT files, and optionally burns
//! the translated subtitles into a new video with ffmpeg.

pub mod cli;
pub mod config;
pub mod error;
pub mod language;
pub mod media;
pub mod progress;
pub mod subtitle;
pub mod transcribe;
pub mod transcript;
pub mod translate;
pub mod workflow;
