use serde::{Deserialize, Serialize};

/// A timestamped span of text. Times are seconds from the start of the media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Segment {
    /// Build a segment, clamping times so that `0 <= start <= end` holds.
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        let start = if start.is_finite() { start.max(0.0) } else { 0.0 };
        let end = if end.is_finite() { end.max(start) } else { start };
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Same timing, different text.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            start: self.start,
            end: self.end,
            text: text.into(),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Output of one transcriber run over one media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    /// Language reported by the transcriber, if it reported one.
    pub language: Option<String>,
    pub segments: Vec<Segment>,
}

impl TranscriptionResult {
    pub fn new(language: Option<String>, segments: Vec<Segment>) -> Self {
        Self { language, segments }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
