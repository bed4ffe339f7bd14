use std::sync::Arc;

use async_trait::async_trait;

use crate::annotation::{Generation, PromptContext, TextGenerator};
use crate::config::{parse_llm_provider_model, LlmConfig};
use crate::error::{MarginaliaError, Result};
use crate::llm::api::{default_base_url, Completion, LlmApiClient};
use crate::llm::prompts::{chunk_annotation_prompt, ANNOTATION_SYSTEM_PROMPT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmBackend {
    OpenAI,
    OpenRouter,
    Ollama,
    LmStudio,
    OpenAICompatible { base_url: String },
    Unavailable { reason: String },
}

#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub stop: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct LlmProvider {
    backend: LlmBackend,
    config: Option<Arc<LlmConfig>>,
}

impl LlmProvider {
    pub fn new(config: Option<&LlmConfig>) -> Self {
        let Some(config) = config else {
            return Self::unavailable("No LLM configuration provided");
        };

        let (provider, _model) = parse_llm_provider_model(&config.model);

        let backend = match provider.to_lowercase().as_str() {
            "openai" => LlmBackend::OpenAI,
            "openrouter" => LlmBackend::OpenRouter,
            "ollama" => LlmBackend::Ollama,
            "lmstudio" => LlmBackend::LmStudio,
            _ => {
                if let Some(base_url) = &config.base_url {
                    LlmBackend::OpenAICompatible {
                        base_url: base_url.clone(),
                    }
                } else {
                    LlmBackend::Unavailable {
                        reason: format!("Unknown provider in model: {}", config.model),
                    }
                }
            }
        };

        Self {
            backend,
            config: Some(Arc::new(config.clone())),
        }
    }

    pub fn unavailable(reason: &str) -> Self {
        Self {
            backend: LlmBackend::Unavailable {
                reason: reason.to_string(),
            },
            config: None,
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.backend, LlmBackend::Unavailable { .. })
    }

    pub fn backend(&self) -> &LlmBackend {
        &self.backend
    }

    pub fn config(&self) -> Option<&LlmConfig> {
        self.config.as_deref()
    }

    /// Endpoint requests go to, `None` when no LLM is available.
    pub fn base_url(&self) -> Option<&str> {
        match &self.backend {
            LlmBackend::Unavailable { .. } => None,
            LlmBackend::OpenAICompatible { base_url } => Some(base_url.as_str()),
            _ => {
                let config = self.config()?;
                match &config.base_url {
                    Some(base_url) => Some(base_url.as_str()),
                    None => {
                        let (provider, _) = parse_llm_provider_model(&config.model);
                        Some(default_base_url(provider))
                    }
                }
            }
        }
    }

    /// Options derived from the configured token and temperature limits.
    pub fn default_options(&self) -> CompletionOptions {
        let config = self.config();
        CompletionOptions {
            temperature: config.and_then(|config| config.temperature),
            max_tokens: config.and_then(|config| config.max_tokens),
            ..Default::default()
        }
    }

    pub async fn complete(
        &self,
        prompt: &str,
        options: Option<&CompletionOptions>,
    ) -> Result<String> {
        self.complete_with_usage(prompt, None, options)
            .await
            .map(|completion| completion.content)
    }

    pub async fn complete_with_usage(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        options: Option<&CompletionOptions>,
    ) -> Result<Completion> {
        if !self.is_available() {
            return Err(MarginaliaError::LlmUnavailable(self.unavailable_reason()));
        }

        let config = self
            .config()
            .ok_or_else(|| MarginaliaError::LlmUnavailable("No config available".to_string()))?;

        let client = LlmApiClient::new(config)?;
        client.complete(prompt, system_prompt, options).await
    }

    fn unavailable_reason(&self) -> String {
        match &self.backend {
            LlmBackend::Unavailable { reason } => reason.clone(),
            _ => "LLM backend is not available".to_string(),
        }
    }
}

#[async_trait]
impl TextGenerator for LlmProvider {
    async fn generate(&self, context: &PromptContext) -> Result<Generation> {
        let prompt = chunk_annotation_prompt(context);
        let options = self.default_options();

        let completion = self
            .complete_with_usage(&prompt, Some(ANNOTATION_SYSTEM_PROMPT), Some(&options))
            .await?;

        Ok(Generation::new(completion.content, completion.usage))
    }
}
