use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{MarginaliaError, Result};
use crate::models::RawAnnotation;

/// Accepted shapes of a generation response.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AnnotationsResponse {
    /// Direct array response: [...]
    Array(Vec<RawAnnotation>),
    /// Wrapped object response: {"annotations": [...]}
    Wrapped {
        #[serde(alias = "items", alias = "results")]
        annotations: Vec<RawAnnotation>,
    },
}

impl AnnotationsResponse {
    fn into_annotations(self) -> Vec<RawAnnotation> {
        match self {
            AnnotationsResponse::Array(annotations) => annotations,
            AnnotationsResponse::Wrapped { annotations } => annotations,
        }
    }
}

/// Parse raw annotations out of completion text.
///
/// Accepts a JSON array or an `{"annotations": [...]}` object, optionally
/// wrapped in a Markdown code fence or surrounded by prose. Entries without
/// highlighted text cannot be anchored and are dropped.
pub fn parse_annotations(text: &str) -> Result<Vec<RawAnnotation>> {
    let body = fenced_block(text).unwrap_or(text).trim();
    if body.is_empty() {
        return Err(MarginaliaError::Validation(
            "Generation response was empty".to_string(),
        ));
    }

    let parsed = serde_json::from_str::<AnnotationsResponse>(body)
        .ok()
        .or_else(|| delimited(body, '[', ']').and_then(|slice| serde_json::from_str(slice).ok()))
        .or_else(|| delimited(body, '{', '}').and_then(|slice| serde_json::from_str(slice).ok()));

    let Some(parsed) = parsed else {
        let preview: String = body.chars().take(100).collect();
        tracing::debug!(response_len = body.len(), response_preview = %preview, "Unparseable annotation response");
        return Err(MarginaliaError::Validation(format!(
            "Generation response is not an annotation list: {preview}"
        )));
    };

    let annotations: Vec<RawAnnotation> = parsed
        .into_annotations()
        .into_iter()
        .filter(|annotation| !annotation.highlighted_text.trim().is_empty())
        .collect();

    Ok(annotations)
}

fn fenced_block(text: &str) -> Option<&str> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```").ok())
        .as_ref()?
        .captures(text)?
        .get(1)
        .map(|body| body.as_str())
}

/// Slice from the first `open` to the last `close`, inclusive.
fn delimited(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}
