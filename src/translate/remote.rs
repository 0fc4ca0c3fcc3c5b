use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{TranslationBackend, common::{batch_count, merge_translations}};
use crate::config::RemoteApiConfig;
use crate::error::{Result, VidsubError};
use crate::language;
use crate::progress::EventSink;
use crate::transcript::Segment;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub temperature: f32,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Sends one chat request and returns the assistant message content.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}

/// Chat transport over HTTP (OpenAI-compatible `/v1/chat/completions`)
pub struct HttpChatTransport {
    client: Client,
    endpoint: String,
}

impl HttpChatTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.into();
        let url = Url::parse(&endpoint).map_err(|e| {
            VidsubError::Config(format!("Invalid remote endpoint '{}': {}", endpoint, e))
        })?;

        let mut builder = Client::builder().timeout(timeout);
        // Local servers (LM Studio, llama.cpp) must not be routed through a system proxy
        if matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]")) {
            builder = builder.no_proxy();
        }

        Ok(Self {
            client: builder.build()?,
            endpoint,
        })
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        debug!("Sending translation request to: {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| VidsubError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(VidsubError::Translation(format!(
                "Remote API error {}: {}",
                status, error_text
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| VidsubError::Translation(format!("Failed to parse response: {}", e)))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| VidsubError::Translation("Response contained no choices".to_string()))
    }
}

/// Translates through a chat completions endpoint, one request per sub-batch.
pub struct RemoteApiTranslator {
    config: RemoteApiConfig,
    transport: Box<dyn ChatTransport>,
}

impl RemoteApiTranslator {
    pub fn new(config: RemoteApiConfig, transport: Box<dyn ChatTransport>) -> Self {
        Self { config, transport }
    }

    pub fn with_http_transport(config: RemoteApiConfig) -> Result<Self> {
        let transport = HttpChatTransport::new(
            config.endpoint.clone(),
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Self::new(config, Box::new(transport)))
    }

    fn build_request(
        &self,
        batch: &[Segment],
        source_lang: &str,
        target_lang: &str,
        domain: Option<&str>,
    ) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: build_system_prompt(source_lang, target_lang, domain),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_user_prompt(batch),
                },
            ],
        }
    }
}

#[async_trait]
impl TranslationBackend for RemoteApiTranslator {
    fn name(&self) -> &'static str {
        "remote"
    }

    /// Any ISO 639-1 or 639-3 code; the source may also be `auto`.
    fn check_languages(&self, source_lang: &str, target_lang: &str) -> Result<()> {
        let source_is_auto = language::normalize_code(source_lang) == language::AUTO;
        if !source_is_auto && !language::is_valid_code(source_lang) {
            return Err(VidsubError::Language(format!(
                "Unknown source language code '{}'",
                source_lang
            )));
        }
        if !language::is_valid_code(target_lang) {
            return Err(VidsubError::Language(format!(
                "Unknown target language code '{}'",
                target_lang
            )));
        }
        Ok(())
    }

    async fn translate(
        &mut self,
        segments: &[Segment],
        source_lang: &str,
        target_lang: &str,
        domain: Option<&str>,
        events: &dyn EventSink,
    ) -> Result<Vec<Segment>> {
        let batch_size = self.config.batch_size.max(1);
        let mut translated = Vec::with_capacity(segments.len());
        debug!(
            "Remote translation: {} segments in {} requests",
            segments.len(),
            batch_count(segments.len(), batch_size)
        );

        for batch in segments.chunks(batch_size) {
            events.progress(format!("Remote translation of {} segments...", batch.len()));
            let request = self.build_request(batch, source_lang, target_lang, domain);

            let content = self.transport.complete(&request).await?;
            debug!("Raw remote response: {}", content);

            let texts = parse_numbered_lines(&content, batch.len());
            let missing = texts.iter().filter(|t| t.is_empty()).count();
            if missing > 0 {
                warn!("Remote model left {} of {} lines untranslated", missing, batch.len());
            }
            translated.extend(merge_translations(batch, texts));
        }

        info!("Remote translation finished: {} segments", translated.len());
        Ok(translated)
    }
}

fn build_system_prompt(source_lang: &str, target_lang: &str, domain: Option<&str>) -> String {
    let domain = domain.map(str::trim).filter(|d| !d.is_empty()).unwrap_or("general");
    format!(
        "You are a professional translator for {} domain content. \
         Translate from {} ({}) to {} ({}). \
         Keep meaning precise and concise; no explanations; output only translated lines.",
        domain,
        language::display_name(source_lang),
        source_lang,
        language::display_name(target_lang),
        target_lang
    )
}

/// Number each segment as `<1-based index>|<text>`, one per line.
fn build_user_prompt(batch: &[Segment]) -> String {
    let numbered: Vec<String> = batch
        .iter()
        .enumerate()
        .map(|(idx, seg)| format!("{}|{}", idx + 1, single_line(&seg.text)))
        .collect();

    format!(
        "Translate each line after the pipe and return the translations in the same order, \
         one per line as 'index|translated'.\n{}",
        numbered.join("\n")
    )
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse an `index|text` answer into exactly `expected` strings.
///
/// Blank lines are skipped. A line without `|` is taken verbatim. Missing lines
/// become empty strings; surplus lines are ignored.
pub fn parse_numbered_lines(content: &str, expected: usize) -> Vec<String> {
    let mut texts: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once('|') {
            Some((_, translated)) => translated.trim().to_string(),
            None => line.to_string(),
        })
        .take(expected)
        .collect();

    texts.resize(expected, String::new());
    texts
}
