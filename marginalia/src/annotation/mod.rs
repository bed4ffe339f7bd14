//! Chunked annotation generation.
//!
//! A [`ChunkOrchestrator`] feeds document chunks to a [`TextGenerator`] under
//! a concurrency ceiling, parses the returned annotations and anchors their
//! selectors against the full document.

mod generator;
mod orchestrator;
mod parser;

pub use generator::{Generation, PromptContext, TextGenerator};
pub use orchestrator::ChunkOrchestrator;
pub use parser::parse_annotations;
