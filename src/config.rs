use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::{Result, LingoError};

fn default_all_caps_pattern() -> String {
    r"^[A-ZÁÉÍÓÖŐÚÜŰ,.!?\- ]{3,}$".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Which completion service to talk to
    pub provider: Provider,
    /// Service base URL; the provider's usual address when unset
    pub endpoint: Option<String>,
    /// Model name passed to the service; the provider's default when unset
    pub model: Option<String>,
    /// API credential, required by the OpenAI provider
    pub api_key: Option<String>,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
    /// Sampling temperature
    pub temperature: f32,
    /// Upper bound on generated tokens per call
    pub max_tokens: u32,
    /// Language of the input subtitles, as named in the prompt
    pub source_language: String,
    /// Language to translate into, as named in the prompt
    pub target_language: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Ollama `/api/generate`
    Ollama,
    /// OpenAI compatible `/v1/chat/completions`
    OpenAi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Nominal number of records per request
    pub size: usize,
    /// Extra records the batcher may take while looking for a sentence boundary
    pub buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Drop records made only of capitals, e.g. "LAUGHING"
    pub skip_all_caps: bool,
    /// Drop records fully wrapped in square brackets, e.g. "[Cheering]"
    pub skip_square_brackets: bool,
    /// Remove bracketed spans inside otherwise kept records
    pub strip_partial_brackets: bool,
    /// Hold back records starting with an asterisk (song lyrics)
    pub ignore_asterisks: bool,
    /// Hold back records containing a musical note
    pub ignore_music_notes: bool,
    /// Detector for all-caps cues
    pub all_caps_pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay before the first retry, in seconds; doubles on each further failure
    pub base_delay_secs: u64,
    /// Retries after the first attempt before a batch is given up
    pub max_retries: u32,
    /// Pause after every successful call, in milliseconds
    pub pacing_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Translated lines longer than this are broken in two
    pub max_line_width: usize,
    /// What to write for records that never got a translation
    pub untranslated: Untranslated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Untranslated {
    /// Write an empty body
    Empty,
    /// Write the source text unchanged
    Original,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Ollama,
            endpoint: None,
            model: None,
            api_key: None,
            timeout_secs: 120,
            temperature: 0.5,
            max_tokens: 2048,
            source_language: "english".to_string(),
            target_language: "hungarian".to_string(),
        }
    }
}

impl Provider {
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Provider::Ollama => "http://localhost:11434",
            Provider::OpenAi => "https://api.openai.com",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Ollama => "llama3.2:3b",
            Provider::OpenAi => "gpt-3.5-turbo",
        }
    }
}

impl CompletionConfig {
    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.provider.default_endpoint())
            .trim_end_matches('/')
    }

    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { size: 15, buffer: 5 }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            skip_all_caps: true,
            skip_square_brackets: true,
            strip_partial_brackets: true,
            ignore_asterisks: true,
            ignore_music_notes: true,
            all_caps_pattern: default_all_caps_pattern(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: 10,
            max_retries: 5,
            pacing_ms: 1000,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_line_width: 40,
            untranslated: Untranslated::Empty,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LingoError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| LingoError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| LingoError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| LingoError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Reject values the pipeline cannot work with. Run after CLI overrides are applied.
    pub fn validate(&self) -> Result<()> {
        if self.batch.size == 0 {
            return Err(LingoError::Config("batch.size must be at least 1".to_string()));
        }
        if self.output.max_line_width == 0 {
            return Err(LingoError::Config("output.max_line_width must be at least 1".to_string()));
        }
        if self.completion.source_language.trim().is_empty()
            || self.completion.target_language.trim().is_empty()
        {
            return Err(LingoError::Config("source and target language must be set".to_string()));
        }
        if self.completion.provider == Provider::OpenAi && self.completion.api_key.is_none() {
            return Err(LingoError::Config(
                "the openai provider needs an API key (--api-key or SRTLINGO_API_KEY)".to_string(),
            ));
        }
        regex::Regex::new(&self.filter.all_caps_pattern)
            .map_err(|e| LingoError::Config(format!("Invalid filter.all_caps_pattern: {}", e)))?;
        Ok(())
    }
}
