//! Prompt templates for chunk annotation
//!
//! These templates use basic `format!()` interpolation for type safety.
//! Missing variables will cause compile-time errors.

use crate::annotation::PromptContext;
use crate::models::ParentContext;

/// System prompt sent with every chunk annotation request.
pub const ANNOTATION_SYSTEM_PROMPT: &str = "You annotate web pages. You read one fragment of a \
larger HTML document at a time and return notes anchored to exact text in that fragment. \
You always answer with JSON only.";

/// Generate the user prompt for annotating one chunk
///
/// The prompt carries the chunk's HTML, its position in the document and
/// the document-level context the fragment lacks on its own. Caller
/// instructions, when present, are appended verbatim.
///
/// # Arguments
/// * `context` - The chunk and its surrounding document context
///
/// # Returns
/// A formatted prompt string ready for LLM completion
///
/// # Example
/// ```
/// use marginalia::annotation::PromptContext;
/// use marginalia::llm::prompts::chunk_annotation_prompt;
/// use marginalia::models::ParentContext;
///
/// let context = PromptContext {
///     fragment_html: "<p class=\"lead\">Rust 1.0 shipped in 2015.</p>".to_string(),
///     parent_context: ParentContext::default(),
///     chunk_index: 0,
///     total_chunks: 3,
///     instructions: Some("Flag factual claims".to_string()),
/// };
/// let prompt = chunk_annotation_prompt(&context);
/// assert!(prompt.contains("part 1 of 3"));
/// assert!(prompt.contains("Flag factual claims"));
/// ```
pub fn chunk_annotation_prompt(context: &PromptContext) -> String {
    let part = context.chunk_index + 1;
    let total = context.total_chunks;
    let document_context = describe_parent_context(&context.parent_context);
    let fragment = &context.fragment_html;
    let instructions = context
        .instructions
        .as_deref()
        .map(|text| format!("\nAdditional instructions:\n{text}\n"))
        .unwrap_or_default();

    format!(
        r#"Annotate the following HTML fragment. It is part {part} of {total} of a larger document.

Document context:
{document_context}

Fragment:
{fragment}
{instructions}
For each passage worth annotating, return an object with:
- "content": the annotation itself
- "highlighted_text": the exact text from the fragment the annotation refers to, copied verbatim
- "candidate_selector": a CSS selector for the element containing that text

Prefer ids and classes in selectors. Do not invent text that is not in the fragment.

Respond with valid JSON only. Example format:
[
  {{"content": "Key claim of the article", "highlighted_text": "Rust 1.0 shipped in 2015", "candidate_selector": "p.lead"}}
]

Return [] if nothing is worth annotating."#
    )
}

fn describe_parent_context(context: &ParentContext) -> String {
    let mut lines = Vec::new();

    if let Some(title) = &context.document_title {
        lines.push(format!("- Title: {title}"));
    }
    if let Some(id) = &context.body_id {
        lines.push(format!("- Body id: {id}"));
    }
    if !context.body_classes.is_empty() {
        lines.push(format!("- Body classes: {}", context.body_classes.join(" ")));
    }
    lines.push(format!(
        "- Has a main content landmark: {}",
        if context.has_main_container { "yes" } else { "no" }
    ));

    lines.join("\n")
}
