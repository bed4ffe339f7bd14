use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Chunk, ParentContext, TokenUsage};

/// Everything a generation call sees about one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptContext {
    pub fragment_html: String,
    pub parent_context: ParentContext,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub instructions: Option<String>,
}

impl PromptContext {
    pub fn from_chunk(chunk: &Chunk, instructions: Option<&str>) -> Self {
        Self {
            fragment_html: chunk.fragment_html.clone(),
            parent_context: chunk.parent_context.clone(),
            chunk_index: chunk.index,
            total_chunks: chunk.total_chunks,
            instructions: instructions
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string),
        }
    }
}

/// Raw completion text and what it cost.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    pub text: String,
    pub usage: TokenUsage,
}

impl Generation {
    pub fn new(text: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            text: text.into(),
            usage,
        }
    }
}

/// Produces annotation text for a single chunk.
///
/// Implementations report rate limiting as
/// [`MarginaliaError::LlmRateLimit`](crate::error::MarginaliaError::LlmRateLimit)
/// so callers can tell it apart from other upstream failures.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, context: &PromptContext) -> Result<Generation>;
}
