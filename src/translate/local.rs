use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use super::{TranslationBackend, common::{batch_count, merge_translations}};
use crate::config::LocalModelConfig;
use crate::error::{Result, VidsubError};
use crate::language;
use crate::progress::EventSink;
use crate::transcript::Segment;

/// A loaded translation model. One call translates one sub-batch of texts.
#[async_trait]
pub trait TranslationModel: Send {
    async fn generate(
        &mut self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<String>>;
}

/// Loads a translation model by name.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, model_name: &str) -> Result<Box<dyn TranslationModel>>;
}

/// Translates with a local model that is loaded on first use and kept for the
/// lifetime of the translator.
pub struct LocalModelTranslator {
    config: LocalModelConfig,
    loader: Box<dyn ModelLoader>,
    model: Option<Box<dyn TranslationModel>>,
}

impl LocalModelTranslator {
    pub fn new(config: LocalModelConfig, loader: Box<dyn ModelLoader>) -> Self {
        Self {
            config,
            loader,
            model: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    fn supports(&self, code: &str) -> bool {
        let code = language::normalize_code(code);
        self.config
            .languages
            .iter()
            .any(|known| language::normalize_code(known) == code)
    }

    async fn ensure_model(&mut self, events: &dyn EventSink) -> Result<()> {
        if self.model.is_none() {
            events.progress(format!("Loading translation model {}...", self.config.model));
            let model = self.loader.load(&self.config.model).await?;
            info!("Translation model {} loaded", self.config.model);
            self.model = Some(model);
        }
        Ok(())
    }
}

#[async_trait]
impl TranslationBackend for LocalModelTranslator {
    fn name(&self) -> &'static str {
        "local"
    }

    fn check_languages(&self, source_lang: &str, target_lang: &str) -> Result<()> {
        for (role, code) in [("source", source_lang), ("target", target_lang)] {
            if !self.supports(code) {
                return Err(VidsubError::Language(format!(
                    "Local model {} cannot translate {} language '{}'",
                    self.config.model, role, code
                )));
            }
        }
        Ok(())
    }

    async fn translate(
        &mut self,
        segments: &[Segment],
        source_lang: &str,
        target_lang: &str,
        _domain: Option<&str>,
        events: &dyn EventSink,
    ) -> Result<Vec<Segment>> {
        if segments.is_empty() {
            return Ok(Vec::new());
        }

        self.ensure_model(events).await?;
        let batch_size = self.config.batch_size.max(1);
        let source_lang = language::normalize_code(source_lang);
        let target_lang = language::normalize_code(target_lang);
        let Some(model) = self.model.as_mut() else {
            return Err(VidsubError::Translation("Translation model is not loaded".to_string()));
        };

        info!(
            "Local translation: {} segments in {} sub-batches",
            segments.len(),
            batch_count(segments.len(), batch_size)
        );
        let result =
            translate_batches(model.as_mut(), segments, batch_size, &source_lang, &target_lang)
                .await;
        if result.is_err() {
            // The process may still hold unread output from the failed exchange.
            warn!("Discarding translation model {} after a failed batch", self.config.model);
            self.model = None;
        }
        result
    }
}

async fn translate_batches(
    model: &mut dyn TranslationModel,
    segments: &[Segment],
    batch_size: usize,
    source_lang: &str,
    target_lang: &str,
) -> Result<Vec<Segment>> {
    let mut translated = Vec::with_capacity(segments.len());
    for batch in segments.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|s| s.text.clone()).collect();
        debug!("Local model translating {} segments", texts.len());

        let outputs = model.generate(&texts, source_lang, target_lang).await?;
        if outputs.len() != batch.len() {
            return Err(VidsubError::Translation(format!(
                "Local model returned {} translations for {} segments",
                outputs.len(),
                batch.len()
            )));
        }
        translated.extend(merge_translations(batch, outputs));
    }

    Ok(translated)
}

#[derive(Debug, Serialize)]
struct ModelRequest<'a> {
    source_lang: &'a str,
    target_lang: &'a str,
    texts: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ModelReply {
    #[serde(default)]
    translations: Option<Vec<String>>,
    #[serde(default)]
    error: Option<String>,
}

/// A running inference process speaking one JSON object per line.
///
/// Request: `{"source_lang": "en", "target_lang": "zh", "texts": [...]}`
/// Reply: `{"translations": [...]}` or `{"error": "..."}`
pub struct ModelProcess {
    _child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl ModelProcess {
    async fn request(&mut self, request: &ModelRequest<'_>) -> Result<Vec<String>> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');

        self.stdin.write_all(line.as_bytes()).await.map_err(|e| {
            VidsubError::Translation(format!("Failed to send batch to model process: {}", e))
        })?;
        self.stdin.flush().await?;

        let mut reply = String::new();
        let read = self.stdout.read_line(&mut reply).await.map_err(|e| {
            VidsubError::Translation(format!("Failed to read from model process: {}", e))
        })?;
        if read == 0 {
            return Err(VidsubError::Translation(
                "Model process closed its output".to_string(),
            ));
        }

        parse_model_reply(&reply)
    }
}

#[async_trait]
impl TranslationModel for ModelProcess {
    async fn generate(
        &mut self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<String>> {
        let request = ModelRequest {
            source_lang,
            target_lang,
            texts,
        };
        self.request(&request).await
    }
}

fn parse_model_reply(line: &str) -> Result<Vec<String>> {
    let reply: ModelReply = serde_json::from_str(line.trim()).map_err(|e| {
        VidsubError::Translation(format!("Invalid reply from model process: {}", e))
    })?;

    match (reply.translations, reply.error) {
        (_, Some(error)) => Err(VidsubError::Translation(format!("Model error: {}", error))),
        (Some(translations), None) => Ok(translations),
        (None, None) => Err(VidsubError::Translation(
            "Model reply had neither translations nor error".to_string(),
        )),
    }
}

/// Spawns the configured inference command; the model is loaded by that process.
pub struct ProcessModelLoader {
    config: LocalModelConfig,
}

impl ProcessModelLoader {
    pub fn new(config: LocalModelConfig) -> Self {
        Self { config }
    }

    fn build_command(&self, model_name: &str) -> Command {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .arg("--model")
            .arg(model_name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ModelLoader for ProcessModelLoader {
    async fn load(&self, model_name: &str) -> Result<Box<dyn TranslationModel>> {
        info!("Starting translation model process: {} ({})", self.config.command, model_name);

        let mut child = self.build_command(model_name).spawn().map_err(|e| {
            VidsubError::Translation(format!(
                "Failed to start translation model process '{}': {}",
                self.config.command, e
            ))
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            VidsubError::Translation("Model process has no stdin".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            VidsubError::Translation("Model process has no stdout".to_string())
        })?;

        Ok(Box::new(ModelProcess {
            _child: child,
            stdin,
            stdout: BufReader::new(stdout),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::RecordingSink;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Counters {
        loads: Arc<AtomicUsize>,
        batches: Arc<Mutex<Vec<usize>>>,
        failures_left: Arc<AtomicUsize>,
    }

    struct FakeModel {
        counters: Counters,
        drop_last: bool,
    }

    #[async_trait]
    impl TranslationModel for FakeModel {
        async fn generate(
            &mut self,
            texts: &[String],
            source_lang: &str,
            target_lang: &str,
        ) -> Result<Vec<String>> {
            self.counters.batches.lock().unwrap().push(texts.len());
            if self.counters.failures_left.load(Ordering::SeqCst) > 0 {
                self.counters.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(VidsubError::Translation("Model process closed its output".to_string()));
            }
            let mut out: Vec<String> = texts
                .iter()
                .map(|t| format!("[{}>{}] {}", source_lang, target_lang, t))
                .collect();
            if self.drop_last {
                out.pop();
            }
            Ok(out)
        }
    }

    struct FakeLoader {
        counters: Counters,
        fail: bool,
        drop_last: bool,
    }

    #[async_trait]
    impl ModelLoader for FakeLoader {
        async fn load(&self, _model_name: &str) -> Result<Box<dyn TranslationModel>> {
            self.counters.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(VidsubError::Translation("weights missing".to_string()));
            }
            Ok(Box::new(FakeModel {
                counters: self.counters.clone(),
                drop_last: self.drop_last,
            }))
        }
    }

    fn config() -> LocalModelConfig {
        LocalModelConfig {
            command: "m2m-translate".to_string(),
            args: vec![],
            model: "facebook/m2m100_418M".to_string(),
            batch_size: 6,
            languages: crate::config::default_model_languages(),
        }
    }

    fn translator(counters: &Counters, fail: bool, drop_last: bool) -> LocalModelTranslator {
        LocalModelTranslator::new(
            config(),
            Box::new(FakeLoader {
                counters: counters.clone(),
                fail,
                drop_last,
            }),
        )
    }

    fn segments(count: usize) -> Vec<Segment> {
        (0..count)
            .map(|i| Segment::new(i as f64, i as f64 + 0.5, format!("line {}", i)))
            .collect()
    }

    #[tokio::test]
    async fn test_sub_batches_preserve_order_and_timing() {
        let counters = Counters::default();
        let mut translator = translator(&counters, false, false);
        let sink = RecordingSink::new();
        let input = segments(13);

        let output = translator
            .translate(&input, "en-US", "zh", None, &sink)
            .await
            .unwrap();

        assert_eq!(*counters.batches.lock().unwrap(), vec![6, 6, 1]);
        assert_eq!(output.len(), input.len());
        for (i, (src, out)) in input.iter().zip(&output).enumerate() {
            assert_eq!(out.start, src.start);
            assert_eq!(out.end, src.end);
            assert_eq!(out.text, format!("[en>zh] line {}", i));
        }
    }

    #[tokio::test]
    async fn test_model_loaded_once_per_translator() {
        let counters = Counters::default();
        let mut translator = translator(&counters, false, false);
        let sink = RecordingSink::new();
        assert!(!translator.is_loaded());

        translator.translate(&segments(3), "en", "ja", None, &sink).await.unwrap();
        translator.translate(&segments(8), "en", "ja", None, &sink).await.unwrap();

        assert!(translator.is_loaded());
        assert_eq!(counters.loads.load(Ordering::SeqCst), 1);
        assert_eq!(
            sink.messages(),
            vec!["Loading translation model facebook/m2m100_418M...".to_string()]
        );
    }

    #[tokio::test]
    async fn test_empty_input_does_not_load_model() {
        let counters = Counters::default();
        let mut translator = translator(&counters, false, false);
        let output = translator
            .translate(&[], "en", "ja", None, &RecordingSink::new())
            .await
            .unwrap();
        assert!(output.is_empty());
        assert_eq!(counters.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_load_failure_is_fatal() {
        let counters = Counters::default();
        let mut translator = translator(&counters, true, false);
        let result = translator
            .translate(&segments(2), "en", "ja", None, &RecordingSink::new())
            .await;
        assert!(matches!(result, Err(VidsubError::Translation(_))));
        assert!(!translator.is_loaded());
    }

    #[tokio::test]
    async fn test_short_model_output_is_fatal() {
        let counters = Counters::default();
        let mut translator = translator(&counters, false, true);
        let result = translator
            .translate(&segments(4), "en", "ja", None, &RecordingSink::new())
            .await;
        assert!(matches!(result, Err(VidsubError::Translation(_))));
    }

    #[test]
    fn test_check_languages() {
        let counters = Counters::default();
        let translator = translator(&counters, false, false);
        assert!(translator.check_languages("en", "zh").is_ok());
        assert!(translator.check_languages("pt-BR", "ja").is_ok());
        assert!(matches!(
            translator.check_languages("auto", "zh"),
            Err(VidsubError::Language(_))
        ));
        assert!(translator.check_languages("en", "xx").is_err());
    }

    #[test]
    fn test_check_languages_covers_model_language_set() {
        let counters = Counters::default();
        let translator = translator(&counters, false, false);
        for code in ["nl", "sv", "pl", "el", "ceb"] {
            assert!(translator.check_languages(code, "en").is_ok(), "{}", code);
        }
        assert!(translator.check_languages("haw", "en").is_err());
    }

    #[test]
    fn test_check_languages_follows_configured_list() {
        let mut config = config();
        config.languages = vec!["en".to_string(), "de".to_string()];
        let translator = LocalModelTranslator::new(
            config,
            Box::new(FakeLoader {
                counters: Counters::default(),
                fail: false,
                drop_last: false,
            }),
        );
        assert!(translator.check_languages("en-GB", "de").is_ok());
        assert!(translator.check_languages("en", "zh").is_err());
    }

    #[tokio::test]
    async fn test_failed_batch_discards_model() {
        let counters = Counters::default();
        counters.failures_left.store(1, Ordering::SeqCst);
        let mut translator = translator(&counters, false, false);
        let sink = RecordingSink::new();

        let first = translator.translate(&segments(2), "en", "ja", None, &sink).await;
        assert!(matches!(first, Err(VidsubError::Translation(_))));
        assert!(!translator.is_loaded());

        let second = translator
            .translate(&segments(2), "en", "ja", None, &sink)
            .await
            .unwrap();
        assert_eq!(second[0].text, "[en>ja] line 0");
        assert_eq!(counters.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_count_mismatch_discards_model() {
        let counters = Counters::default();
        let mut translator = translator(&counters, false, true);
        let sink = RecordingSink::new();

        assert!(translator.translate(&segments(3), "en", "ja", None, &sink).await.is_err());
        assert!(!translator.is_loaded());
        assert!(translator.translate(&segments(3), "en", "ja", None, &sink).await.is_err());
        assert_eq!(counters.loads.load(Ordering::SeqCst), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stray_output_does_not_leak_into_next_request() {
        let temp_dir = tempfile::tempdir().unwrap();
        let marker = temp_dir.path().join("started");
        // The first process prints a banner line before answering; later ones answer cleanly.
        let script = format!(
            r#"if [ -f "{m}" ]; then g=fresh; else touch "{m}"; g=stale; echo warming up; fi; while read -r line; do echo "{{\"translations\":[\"$g\"]}}"; done"#,
            m = marker.display()
        );
        let mut config = config();
        config.command = "sh".to_string();
        config.args = vec!["-c".to_string(), script];

        let mut translator =
            LocalModelTranslator::new(config.clone(), Box::new(ProcessModelLoader::new(config)));
        let sink = RecordingSink::new();

        let first = translator.translate(&segments(1), "en", "fr", None, &sink).await;
        assert!(matches!(first, Err(VidsubError::Translation(_))));

        let second = translator
            .translate(&segments(1), "en", "fr", None, &sink)
            .await
            .unwrap();
        assert_eq!(second[0].text, "fresh");
    }

    #[test]
    fn test_parse_model_reply() {
        assert_eq!(
            parse_model_reply("{\"translations\": [\"a\", \"b\"]}\n").unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(parse_model_reply("{\"error\": \"out of memory\"}").is_err());
        assert!(parse_model_reply("{}").is_err());
        assert!(parse_model_reply("garbage").is_err());
    }

    #[test]
    fn test_request_is_single_json_line() {
        let texts = vec!["Hello\nworld".to_string()];
        let request = ModelRequest {
            source_lang: "en",
            target_lang: "fr",
            texts: &texts,
        };
        let line = serde_json::to_string(&request).unwrap();
        assert!(!line.contains('\n'));
        assert_eq!(
            line,
            r#"{"source_lang":"en","target_lang":"fr","texts":["Hello\nworld"]}"#
        );
    }
}
