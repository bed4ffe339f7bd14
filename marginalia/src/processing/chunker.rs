use scraper::{ElementRef, Node};

use crate::config::ChunkingConfig;
use crate::dom::{collapse_whitespace, Document, DomNode};
use crate::error::Result;
use crate::models::{Chunk, ParentContext};

use super::boundary::{select_boundaries, Boundaries};

/// Subtrees dropped from chunk fragments; they carry no readable content.
const SKIPPED_TAGS: &[&str] = &["script", "style", "template"];

/// Splits HTML documents into size-bounded, structurally coherent chunks.
#[derive(Debug, Clone)]
pub struct DocumentChunker {
    max_chars: usize,
    min_chars: usize,
}

impl Default for DocumentChunker {
    fn default() -> Self {
        let config = ChunkingConfig::default();
        Self {
            max_chars: config.max_chars,
            min_chars: config.min_chars,
        }
    }
}

/// A serialized run of document content that is never split further.
#[derive(Debug)]
struct Piece {
    html: String,
    chars: usize,
}

impl Piece {
    fn new(html: String) -> Self {
        let chars = html.chars().count();
        Self { html, chars }
    }
}

#[derive(Debug, Default)]
struct Group {
    pieces: Vec<Piece>,
    chars: usize,
}

impl Group {
    fn push(&mut self, piece: Piece) {
        self.chars += piece.chars;
        self.pieces.push(piece);
    }

    fn absorb(&mut self, other: Group) {
        self.chars += other.chars;
        self.pieces.extend(other.pieces);
    }

    fn into_html(self) -> String {
        let mut html = String::with_capacity(self.chars);
        for piece in self.pieces {
            html.push_str(&piece.html);
        }
        html
    }
}

impl DocumentChunker {
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            max_chars: config.max_chars,
            min_chars: config.min_chars,
        })
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn min_chars(&self) -> usize {
        self.min_chars
    }

    /// Split `html` into chunks.
    ///
    /// Documents within `max_chars` come back as a single chunk holding the
    /// whole input. Malformed markup never fails; it is recovered by the
    /// parser and at worst chunked with the paragraph/div fallback rule.
    ///
    /// Chunks stay within `max_chars` with one exception: an element that is
    /// over the limit and has no child elements is never split, so it becomes
    /// a chunk of its own at its full size. A large document whose body holds
    /// no content still yields one empty chunk carrying the parent context.
    pub fn chunk(&self, html: &str) -> Vec<Chunk> {
        let document = Document::parse(html);
        let parent_context = extract_parent_context(&document);

        if html.chars().count() <= self.max_chars {
            return vec![Chunk::new(0, 1, html.to_string(), parent_context)];
        }

        let boundaries = select_boundaries(&document);
        let mut pieces = Vec::new();
        self.collect_pieces(document.body(), &boundaries, &mut pieces);

        if pieces.is_empty() {
            tracing::debug!(input_chars = html.len(), "Document has no body content");
            return vec![Chunk::new(0, 1, String::new(), parent_context)];
        }

        let groups = merge_small_groups(
            group_pieces(pieces, self.max_chars),
            self.min_chars,
            self.max_chars,
        );

        let total_chunks = groups.len();
        let chunks: Vec<Chunk> = groups
            .into_iter()
            .enumerate()
            .map(|(index, group)| {
                Chunk::new(index, total_chunks, group.into_html(), parent_context.clone())
            })
            .collect();

        tracing::debug!(
            input_chars = html.len(),
            rule = ?boundaries.rule,
            chunks = chunks.len(),
            "Document chunked"
        );

        chunks
    }

    fn collect_pieces(&self, parent: ElementRef<'_>, boundaries: &Boundaries, out: &mut Vec<Piece>) {
        for child in parent.children() {
            match child.value() {
                Node::Element(_) => {
                    let Some(element) = ElementRef::wrap(child) else {
                        continue;
                    };
                    if is_skipped(&element) {
                        continue;
                    }
                    if boundaries.containers.contains(&element.id())
                        && !boundaries.elements.contains(&element.id())
                    {
                        self.collect_pieces(element, boundaries, out);
                    } else {
                        self.push_element(element, boundaries, out);
                    }
                }
                Node::Text(text) => {
                    if !text.trim().is_empty() {
                        out.push(Piece::new(html_escape::encode_text(&**text).into_owned()));
                    }
                }
                _ => {}
            }
        }
    }

    /// Emit `element` whole, or its children when it alone exceeds the limit.
    fn push_element(&self, element: ElementRef<'_>, boundaries: &Boundaries, out: &mut Vec<Piece>) {
        let piece = Piece::new(element.html());
        if piece.chars <= self.max_chars || !has_child_elements(&element) {
            out.push(piece);
        } else {
            self.collect_pieces(element, boundaries, out);
        }
    }
}

/// Split `html` into chunks with explicit limits.
pub fn chunk_document(html: &str, max_chars: usize, min_chars: usize) -> Result<Vec<Chunk>> {
    let chunker = DocumentChunker::new(&ChunkingConfig::new(max_chars, min_chars)?)?;
    Ok(chunker.chunk(html))
}

/// Document-level details shared by every chunk of a run.
pub fn extract_parent_context(document: &Document) -> ParentContext {
    let body = document.first("body");

    ParentContext {
        body_classes: body
            .map(|body| body.classes().into_iter().map(str::to_string).collect())
            .unwrap_or_default(),
        body_id: body
            .and_then(|body| body.value().attr("id"))
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string),
        has_main_container: document.first("main, [role='main']").is_some(),
        document_title: document
            .first("title")
            .map(|title| collapse_whitespace(&title.text_content()))
            .filter(|title| !title.is_empty()),
    }
}

fn has_child_elements(element: &ElementRef<'_>) -> bool {
    element.children().any(|child| child.value().is_element())
}

fn is_skipped(element: &ElementRef<'_>) -> bool {
    let tag = element.value().name();
    SKIPPED_TAGS.iter().any(|skip| tag.eq_ignore_ascii_case(skip))
}

fn group_pieces(pieces: Vec<Piece>, max_chars: usize) -> Vec<Group> {
    let mut groups = Vec::new();
    let mut current = Group::default();

    for piece in pieces {
        if !current.pieces.is_empty() && current.chars + piece.chars > max_chars {
            groups.push(std::mem::take(&mut current));
        }
        current.push(piece);
    }

    if !current.pieces.is_empty() {
        groups.push(current);
    }

    groups
}

/// Fold undersized groups into their successor while the result still fits.
fn merge_small_groups(mut groups: Vec<Group>, min_chars: usize, max_chars: usize) -> Vec<Group> {
    loop {
        let mut merged_any = false;
        let mut index = 0;

        while index + 1 < groups.len() {
            let small = groups[index].chars < min_chars;
            let fits = groups[index].chars + groups[index + 1].chars <= max_chars;
            if small && fits {
                let mut head = groups.remove(index);
                head.absorb(groups.remove(index));
                groups.insert(index, head);
                merged_any = true;
            } else {
                index += 1;
            }
        }

        if !merged_any {
            return groups;
        }
    }
}
