//! Events emitted by a batch run.
//!
//! The workflow only talks to an [`EventSink`], so any consumer (the CLI
//! progress bar, a GUI bridge, a test recorder) can observe a run. A single
//! producer emits events in stage order and `Finished` exactly once, last.

use std::path::PathBuf;
use std::sync::Mutex;

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Human-readable status line (stage transitions, batch sizes).
    Progress(String),
    /// One completed file and the batch completion percentage (0-100).
    FileProgress { path: PathBuf, percent: u8 },
    /// A fatal error with its diagnostic chain.
    Error { message: String, detail: String },
    /// End of the run, success or not.
    Finished,
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);

    fn progress(&self, message: String) {
        self.emit(PipelineEvent::Progress(message));
    }
}

impl EventSink for UnboundedSender<PipelineEvent> {
    fn emit(&self, event: PipelineEvent) {
        // The receiver may be gone if the consumer exited early; the run still completes.
        if let Err(e) = self.send(event) {
            debug!("Dropping pipeline event, receiver closed: {:?}", e.0);
        }
    }
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PipelineEvent::Progress(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn percents(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PipelineEvent::FileProgress { percent, .. } => Some(percent),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PipelineEvent::Error { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: PipelineEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// `round(completed / total * 100)`, clamped to 0-100.
pub fn completion_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = (completed as f64 / total as f64 * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_percent() {
        assert_eq!(completion_percent(1, 2), 50);
        assert_eq!(completion_percent(2, 2), 100);
        assert_eq!(completion_percent(1, 3), 33);
        assert_eq!(completion_percent(2, 3), 67);
        assert_eq!(completion_percent(0, 0), 100);
    }

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.progress("a".to_string());
        sink.emit(PipelineEvent::FileProgress {
            path: PathBuf::from("x.mp4"),
            percent: 100,
        });
        sink.emit(PipelineEvent::Finished);

        assert_eq!(sink.messages(), vec!["a".to_string()]);
        assert_eq!(sink.percents(), vec![100]);
        assert_eq!(sink.events().last(), Some(&PipelineEvent::Finished));
    }

    #[tokio::test]
    async fn test_channel_sink_delivers_events() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.progress("hello".to_string());
        tx.emit(PipelineEvent::Finished);

        assert_eq!(rx.recv().await, Some(PipelineEvent::Progress("hello".to_string())));
        assert_eq!(rx.recv().await, Some(PipelineEvent::Finished));
    }

    #[test]
    fn test_channel_sink_ignores_closed_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<PipelineEvent>();
        drop(rx);
        tx.emit(PipelineEvent::Finished);
    }
}
