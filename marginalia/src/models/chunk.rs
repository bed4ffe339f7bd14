use serde::{Deserialize, Serialize};

/// Document-level details that no single chunk carries on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentContext {
    pub body_classes: Vec<String>,
    pub body_id: Option<String>,
    /// A `main` element or `role="main"` landmark exists
    pub has_main_container: bool,
    pub document_title: Option<String>,
}

/// A size-bounded HTML fragment of a larger document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub total_chunks: usize,
    pub fragment_html: String,
    pub parent_context: ParentContext,
}

impl Chunk {
    pub fn new(
        index: usize,
        total_chunks: usize,
        fragment_html: String,
        parent_context: ParentContext,
    ) -> Self {
        Self {
            index,
            total_chunks,
            fragment_html,
            parent_context,
        }
    }

    /// Fragment size in characters.
    pub fn char_count(&self) -> usize {
        self.fragment_html.chars().count()
    }
}
