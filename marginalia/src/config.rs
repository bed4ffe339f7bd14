use serde::Deserialize;
use std::env;

use crate::error::{MarginaliaError, Result};

pub const DEFAULT_MAX_CHARS: usize = 40_000;
pub const DEFAULT_MIN_CHARS: usize = 10_000;
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.80;
pub const DEFAULT_MAX_CONCURRENT: usize = 3;
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 120;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_env_opt<T: std::str::FromStr>(var: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Ignoring.", val, var, e);
                None
            }
        },
        Err(_) => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub chunking: ChunkingConfig,
    pub selector: SelectorConfig,
    pub orchestration: OrchestratorConfig,
    pub llm: Option<LlmConfig>,
}

/// Size limits for splitting a document, measured in characters.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub min_chars: usize,
}

impl ChunkingConfig {
    pub fn new(max_chars: usize, min_chars: usize) -> Result<Self> {
        let config = Self {
            max_chars,
            min_chars,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_chars == 0 {
            return Err(MarginaliaError::InvalidArgument(
                "max_chars must be greater than zero".to_string(),
            ));
        }
        if self.min_chars > self.max_chars {
            return Err(MarginaliaError::InvalidArgument(format!(
                "min_chars ({}) must not exceed max_chars ({})",
                self.min_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            min_chars: DEFAULT_MIN_CHARS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    /// Minimum similarity ratio for a fuzzy text match (0.0-1.0)
    pub fuzzy_threshold: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }
}

/// Settings for a chunked generation run, built once by the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    pub max_concurrent: usize,
    pub call_timeout_secs: u64,
    /// Extra guidance appended to every chunk prompt.
    pub instructions: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
            instructions: None,
        }
    }
}

/// LLM configuration for chat/completion models
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig {
                max_chars: parse_env_or("CHUNK_MAX_CHARS", DEFAULT_MAX_CHARS),
                min_chars: parse_env_or("CHUNK_MIN_CHARS", DEFAULT_MIN_CHARS),
            },
            selector: SelectorConfig {
                fuzzy_threshold: parse_env_or("FUZZY_THRESHOLD", DEFAULT_FUZZY_THRESHOLD),
            },
            orchestration: OrchestratorConfig {
                max_concurrent: parse_env_or("MAX_CONCURRENT_CHUNKS", DEFAULT_MAX_CONCURRENT),
                call_timeout_secs: parse_env_or(
                    "CHUNK_CALL_TIMEOUT_SECS",
                    DEFAULT_CALL_TIMEOUT_SECS,
                ),
                instructions: env::var("ANNOTATION_INSTRUCTIONS")
                    .ok()
                    .filter(|value| !value.trim().is_empty()),
            },
            llm: env::var("LLM_MODEL").ok().map(|model| LlmConfig {
                model,
                api_key: env::var("LLM_API_KEY").ok(),
                base_url: env::var("LLM_BASE_URL").ok(),
                timeout_secs: parse_env_or("LLM_TIMEOUT", 60),
                max_retries: parse_env_or("LLM_MAX_RETRIES", 3),
                max_tokens: parse_env_opt("LLM_MAX_TOKENS"),
                temperature: parse_env_opt("LLM_TEMPERATURE"),
            }),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Rejects limits that would make chunking or orchestration meaningless.
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if !(0.0..=1.0).contains(&self.selector.fuzzy_threshold) {
            return Err(MarginaliaError::InvalidArgument(format!(
                "fuzzy_threshold must be within 0.0..=1.0, got {}",
                self.selector.fuzzy_threshold
            )));
        }
        if self.orchestration.max_concurrent == 0 {
            return Err(MarginaliaError::InvalidArgument(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Known LLM providers that use OpenAI-compatible APIs
pub const KNOWN_LLM_PROVIDERS: &[&str] = &["openai", "openrouter", "ollama", "lmstudio"];

/// Parse an LLM model name into (provider, model) tuple.
pub fn parse_llm_provider_model(model: &str) -> (&str, &str) {
    if let Some((prefix, rest)) = model.split_once('/') {
        let prefix_lower = prefix.to_lowercase();
        if KNOWN_LLM_PROVIDERS.contains(&prefix_lower.as_str()) {
            return (prefix, rest);
        }
    }
    // Default to treating the whole string as a local model
    ("local", model)
}
