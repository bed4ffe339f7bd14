mod api;
pub mod prompts;
mod provider;

pub use api::{Completion, LlmApiClient};
pub use provider::{CompletionOptions, LlmBackend, LlmProvider};
