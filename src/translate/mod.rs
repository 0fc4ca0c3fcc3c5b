// Translation backends
//
// Two interchangeable strategies behind one trait:
// - Local: a translation model loaded once into a long-lived inference process
// - Remote: an OpenAI-compatible chat completions endpoint
//
// Both split the input into fixed-size sub-batches, translate them strictly in
// order, and return exactly one segment per input segment with its timing copied.

pub mod common;
pub mod local;
pub mod remote;

use async_trait::async_trait;

pub use common::*;
use crate::config::{TranslateConfig, TranslationBackendKind};
use crate::error::Result;
use crate::progress::EventSink;
use crate::transcript::Segment;

/// Main trait for translation operations
#[async_trait]
pub trait TranslationBackend: Send {
    /// Short name used in logs and progress messages
    fn name(&self) -> &'static str;

    /// Reject a language pair this backend cannot translate, before any model call.
    fn check_languages(&self, source_lang: &str, target_lang: &str) -> Result<()>;

    /// Translate ordered segments. The output has the same length as the input and
    /// the i-th output keeps the i-th input's `start`/`end`.
    async fn translate(
        &mut self,
        segments: &[Segment],
        source_lang: &str,
        target_lang: &str,
        domain: Option<&str>,
        events: &dyn EventSink,
    ) -> Result<Vec<Segment>>;
}

/// Factory for creating translation backends
pub struct TranslatorFactory;

impl TranslatorFactory {
    /// Create a backend of the given kind from its configuration section
    pub fn create_backend(
        kind: TranslationBackendKind,
        config: &TranslateConfig,
    ) -> Result<Box<dyn TranslationBackend>> {
        match kind {
            TranslationBackendKind::Local => Ok(Box::new(local::LocalModelTranslator::new(
                config.local.clone(),
                Box::new(local::ProcessModelLoader::new(config.local.clone())),
            ))),
            TranslationBackendKind::Remote => Ok(Box::new(
                remote::RemoteApiTranslator::with_http_transport(config.remote.clone())?,
            )),
        }
    }
}
