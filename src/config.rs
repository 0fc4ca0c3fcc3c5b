use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, VidsubError};
use crate::language;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub transcriber: TranscriberConfig,
    pub translate: TranslateConfig,
    pub media: MediaConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    /// Path to the whisper command line binary
    pub binary_path: String,
    /// Whisper model size (tiny, base, small, medium, large)
    pub model_size: String,
    /// Compute device passed to whisper (cpu, cuda); whisper decides when unset
    #[serde(default)]
    pub device: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationBackendKind {
    /// Local translation model driven through a long-lived inference process
    Local,
    /// OpenAI-compatible chat completions endpoint
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Which backend translates the segments
    pub backend: TranslationBackendKind,
    /// Source language code; empty means use the language the transcriber detects
    #[serde(default)]
    pub source_lang: String,
    /// Target language code
    pub target_lang: String,
    /// Free-text domain hint handed to the remote model
    #[serde(default)]
    pub domain: String,
    pub local: LocalModelConfig,
    pub remote: RemoteApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalModelConfig {
    /// Inference command; it receives `--model <name>` and speaks JSON lines on stdin/stdout
    pub command: String,
    /// Extra arguments placed before `--model`
    #[serde(default)]
    pub args: Vec<String>,
    /// Model identifier handed to the inference command
    pub model: String,
    /// Segments per model invocation
    pub batch_size: usize,
    /// Language ids the model can translate between
    #[serde(default = "default_model_languages")]
    pub languages: Vec<String>,
}

pub fn default_model_languages() -> Vec<String> {
    language::M2M100_LANGUAGES.iter().map(|code| code.to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteApiConfig {
    /// Full chat completions URL
    pub endpoint: String,
    /// Model name sent in the request body
    pub model: String,
    pub temperature: f32,
    /// Segments per request
    pub batch_size: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Font used for burned-in subtitles
    pub font: String,
    pub font_size: u32,
    /// Additional encoding options for subtitle burning
    /// Common options: ["-preset", "medium", "-crf", "23", "-pix_fmt", "yuv420p"]
    pub subtitle_options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub output_dir: PathBuf,
    /// Burn translated subtitles into a new video
    pub burn_subtitles: bool,
    /// Keep the standalone translated subtitle file after burning
    pub export_srt: bool,
    /// Also write the untranslated transcript as a subtitle file
    pub keep_source_srt: bool,
    /// Move on to the next file after a per-file failure instead of aborting the batch
    #[serde(default)]
    pub continue_on_error: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transcriber: TranscriberConfig {
                binary_path: "whisper".to_string(),
                model_size: "medium".to_string(),
                device: None,
            },
            translate: TranslateConfig {
                backend: TranslationBackendKind::Local,
                source_lang: String::new(),
                target_lang: "zh".to_string(),
                domain: String::new(),
                local: LocalModelConfig {
                    command: "m2m-translate".to_string(),
                    args: Vec::new(),
                    model: "facebook/m2m100_418M".to_string(),
                    batch_size: 6,
                    languages: default_model_languages(),
                },
                remote: RemoteApiConfig {
                    endpoint: "http://127.0.0.1:1234/v1/chat/completions".to_string(),
                    model: "lmstudio-community/Meta-Llama-3-8B-Instruct-GGUF".to_string(),
                    temperature: 0.2,
                    batch_size: 12,
                    timeout_secs: 300,
                },
            },
            media: MediaConfig {
                binary_path: "ffmpeg".to_string(),
                font: "Microsoft YaHei UI".to_string(),
                font_size: 32,
                subtitle_options: vec![],
            },
            output: OutputConfig {
                output_dir: PathBuf::from("output"),
                burn_subtitles: true,
                export_srt: true,
                keep_source_srt: true,
                continue_on_error: false,
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| VidsubError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| VidsubError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| VidsubError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| VidsubError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

/// What happens to the rest of the batch when one file fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Report the error once and stop; later files are not touched.
    #[default]
    AbortBatch,
    /// Report the error for that file and carry on with the next one.
    ContinueWithNextFile,
}

/// Options for one batch run, fixed once the run starts.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOptions {
    pub target_lang: String,
    /// `None` means use the language reported by the transcriber
    pub source_lang: Option<String>,
    pub model_size: String,
    pub output_dir: PathBuf,
    pub burn_subtitles: bool,
    pub export_srt: bool,
    pub keep_source_srt: bool,
    pub font: String,
    pub font_size: u32,
    pub translation_backend: TranslationBackendKind,
    pub domain: Option<String>,
    pub failure_policy: FailurePolicy,
}

impl JobOptions {
    pub fn from_config(config: &Config) -> Result<Self> {
        let options = Self {
            target_lang: config.translate.target_lang.trim().to_string(),
            source_lang: non_empty(&config.translate.source_lang),
            model_size: config.transcriber.model_size.clone(),
            output_dir: config.output.output_dir.clone(),
            burn_subtitles: config.output.burn_subtitles,
            export_srt: config.output.export_srt,
            keep_source_srt: config.output.keep_source_srt,
            font: config.media.font.clone(),
            font_size: config.media.font_size,
            translation_backend: config.translate.backend,
            domain: non_empty(&config.translate.domain),
            failure_policy: if config.output.continue_on_error {
                FailurePolicy::ContinueWithNextFile
            } else {
                FailurePolicy::AbortBatch
            },
        };
        options.validate()?;
        validate_translate_config(&config.translate)?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_lang.is_empty() {
            return Err(VidsubError::Config("Target language must not be empty".to_string()));
        }
        if self.model_size.trim().is_empty() {
            return Err(VidsubError::Config("Whisper model size must not be empty".to_string()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(VidsubError::Config("Output directory must not be empty".to_string()));
        }
        if self.font_size == 0 {
            return Err(VidsubError::Config("Font size must be positive".to_string()));
        }
        Ok(())
    }
}

fn validate_translate_config(config: &TranslateConfig) -> Result<()> {
    if config.local.batch_size == 0 || config.remote.batch_size == 0 {
        return Err(VidsubError::Config("Translation batch size must be at least 1".to_string()));
    }
    match config.backend {
        TranslationBackendKind::Local if config.local.command.trim().is_empty() => Err(
            VidsubError::Config("Local translation command must not be empty".to_string()),
        ),
        TranslationBackendKind::Remote if config.remote.endpoint.trim().is_empty() => Err(
            VidsubError::Config("Remote translation endpoint must not be empty".to_string()),
        ),
        _ => Ok(()),
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_job_options() {
        let options = JobOptions::from_config(&Config::default()).unwrap();
        assert_eq!(options.target_lang, "zh");
        assert_eq!(options.source_lang, None);
        assert_eq!(options.model_size, "medium");
        assert!(options.burn_subtitles && options.export_srt && options.keep_source_srt);
        assert_eq!(options.font_size, 32);
        assert_eq!(options.translation_backend, TranslationBackendKind::Local);
        assert_eq!(options.failure_policy, FailurePolicy::AbortBatch);
        assert_eq!(options.domain, None);
    }

    #[test]
    fn test_blank_source_lang_means_auto_detect() {
        let mut config = Config::default();
        config.translate.source_lang = "  ".to_string();
        config.translate.domain = "medical".to_string();
        let options = JobOptions::from_config(&config).unwrap();
        assert_eq!(options.source_lang, None);
        assert_eq!(options.domain.as_deref(), Some("medical"));
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let mut config = Config::default();
        config.translate.remote.batch_size = 0;
        assert!(matches!(
            JobOptions::from_config(&config),
            Err(VidsubError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_empty_target_lang() {
        let mut config = Config::default();
        config.translate.target_lang = String::new();
        assert!(JobOptions::from_config(&config).is_err());
    }

    #[test]
    fn test_continue_on_error_maps_to_policy() {
        let mut config = Config::default();
        config.output.continue_on_error = true;
        let options = JobOptions::from_config(&config).unwrap();
        assert_eq!(options.failure_policy, FailurePolicy::ContinueWithNextFile);
    }

    #[test]
    fn test_config_roundtrip_through_file() {
        let temp_dir = assert_fs::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.translate.backend = TranslationBackendKind::Remote;
        config.media.font_size = 40;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.translate.backend, TranslationBackendKind::Remote);
        assert_eq!(loaded.media.font_size, 40);
        assert_eq!(loaded.translate.local.batch_size, 6);
        assert_eq!(loaded.translate.remote.batch_size, 12);
    }

    #[test]
    fn test_local_model_languages_default_to_m2m100() {
        let local: LocalModelConfig =
            toml::from_str("command = \"m2m-translate\"\nmodel = \"m\"\nbatch_size = 4").unwrap();
        assert_eq!(local.languages.len(), 100);
        assert!(local.languages.iter().any(|code| code == "nl"));
        assert!(local.args.is_empty());
    }

    #[test]
    fn test_backend_kind_parses_lowercase() {
        let toml_text = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(toml_text.contains("backend = \"local\""));
    }
}
