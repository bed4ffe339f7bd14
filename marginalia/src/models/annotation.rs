use serde::{Deserialize, Serialize};

/// Annotation as produced by the generation call, before anchoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAnnotation {
    /// The note body
    #[serde(alias = "note", alias = "comment", alias = "annotation")]
    pub content: String,
    /// Literal page text the note refers to
    #[serde(alias = "highlightedText", alias = "highlight", alias = "quote")]
    pub highlighted_text: String,
    /// Selector proposed upstream, often relative to the chunk rather than the page
    #[serde(
        default,
        alias = "selector",
        alias = "candidateSelector",
        alias = "css_selector",
        alias = "cssSelector"
    )]
    pub candidate_selector: Option<String>,
}

/// Annotation anchored against the full document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub content: String,
    pub highlighted_text: String,
    /// Selector to store: the repaired one, or the upstream one when anchoring failed
    pub candidate_selector: Option<String>,
    /// Selector as it came from the generation call
    pub original_selector: Option<String>,
    pub xpath: Option<String>,
    /// True when the selector was verified or repaired against the full document
    pub anchored: bool,
    pub text_similarity: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Why a chunk produced no annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    RateLimited,
    Upstream,
    MalformedResponse,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RateLimited => write!(f, "rate_limited"),
            FailureKind::Upstream => write!(f, "upstream"),
            FailureKind::MalformedResponse => write!(f, "malformed_response"),
        }
    }
}

/// One chunk's result from a generation run; never persisted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkGenerationOutcome {
    pub chunk_index: usize,
    pub annotations: Vec<Annotation>,
    pub failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(default)]
    pub usage: TokenUsage,
}

impl ChunkGenerationOutcome {
    pub fn succeeded(chunk_index: usize, annotations: Vec<Annotation>, usage: TokenUsage) -> Self {
        Self {
            chunk_index,
            annotations,
            failed: false,
            error_message: None,
            failure: None,
            usage,
        }
    }

    pub fn failed(chunk_index: usize, failure: FailureKind, error_message: String) -> Self {
        Self {
            chunk_index,
            annotations: Vec::new(),
            failed: true,
            error_message: Some(error_message),
            failure: Some(failure),
            usage: TokenUsage::default(),
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }
}

/// Aggregated result of a chunked generation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessedChunks {
    /// Successful chunks, ordered by chunk index
    pub succeeded: Vec<ChunkGenerationOutcome>,
    /// Failed chunks, ordered by chunk index
    pub failed: Vec<ChunkGenerationOutcome>,
    /// Token usage summed over every chunk that reported it
    pub usage: TokenUsage,
}

impl ProcessedChunks {
    /// Annotations of all successful chunks, in chunk order.
    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.succeeded
            .iter()
            .flat_map(|outcome| outcome.annotations.iter())
    }

    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Successful and failed outcomes merged back into one list ordered by chunk index.
    pub fn into_outcomes(self) -> Vec<ChunkGenerationOutcome> {
        let mut outcomes = self.succeeded;
        outcomes.extend(self.failed);
        outcomes.sort_by_key(|outcome| outcome.chunk_index);
        outcomes
    }
}
