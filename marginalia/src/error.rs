use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarginaliaError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    #[error("LLM rate limit exceeded, retry after {retry_after:?} seconds")]
    LlmRateLimit { retry_after: Option<u64> },

    #[error("Generation timed out after {secs} seconds")]
    Timeout { secs: u64 },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MarginaliaError {
    /// True for errors caused by the caller rather than by document or upstream data.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, MarginaliaError::InvalidArgument(_))
    }
}

pub type Result<T> = std::result::Result<T, MarginaliaError>;
