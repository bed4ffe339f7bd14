mod common;

use pretty_assertions::assert_eq;

use marginalia::config::ChunkingConfig;
use marginalia::error::MarginaliaError;
use marginalia::models::{Chunk, ParentContext};
use marginalia::processing::{chunk_document, DocumentChunker};

use common::{paragraph, sectioned_page};

fn chunker(max_chars: usize, min_chars: usize) -> DocumentChunker {
    let config = ChunkingConfig::new(max_chars, min_chars).expect("valid limits");
    DocumentChunker::new(&config).expect("chunker should be created")
}

fn assert_indices_contiguous(chunks: &[Chunk]) {
    for (position, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.index, position);
        assert_eq!(chunk.total_chunks, chunks.len());
    }
}

fn chunks_containing(chunks: &[Chunk], needle: &str) -> usize {
    chunks
        .iter()
        .filter(|chunk| chunk.fragment_html.contains(needle))
        .count()
}

#[test]
fn test_small_document_passes_through_unchanged() {
    let html = sectioned_page(2, 2, 10);
    let chunks = chunker(40_000, 10_000).chunk(&html);

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].fragment_html, html);
    assert_eq!(chunks[0].total_chunks, 1);
    assert_eq!(
        chunks[0].parent_context.document_title.as_deref(),
        Some("Long read")
    );
}

#[test]
fn test_sections_are_grouped_within_limit() {
    common::init_test_logger();
    let html = sectioned_page(6, 5, 40);
    let chunks = chunker(3_000, 1_000).chunk(&html);

    assert!(chunks.len() > 1);
    assert_indices_contiguous(&chunks);
    for chunk in &chunks {
        assert!(chunk.char_count() <= 3_000, "chunk {} has {} chars", chunk.index, chunk.char_count());
    }

    for section in 0..6 {
        assert_eq!(
            chunks_containing(&chunks, &format!("id=\"s{section}\"")),
            1,
            "section s{section} must land in exactly one chunk"
        );
    }
}

#[test]
fn test_no_text_is_lost() {
    let html = sectioned_page(4, 12, 40);
    let chunks = chunker(2_500, 500).chunk(&html);

    assert!(chunks.len() > 1);
    for section in 0..4 {
        for p in 0..12 {
            let marker = format!("marker-{section}-{p} ");
            assert_eq!(chunks_containing(&chunks, &marker), 1, "{marker} missing or duplicated");
        }
    }
}

#[test]
fn test_oversized_sections_are_split_by_children() {
    let html = sectioned_page(2, 30, 40);
    let chunks = chunker(3_000, 0).chunk(&html);

    assert_indices_contiguous(&chunks);
    for chunk in &chunks {
        assert!(chunk.char_count() <= 3_000);
    }
    assert_eq!(chunks_containing(&chunks, "marker-1-29 "), 1);
}

#[test]
fn test_oversized_leaf_is_emitted_alone() {
    let giant = paragraph("giant", 2_000);
    let html = format!(
        "<html><body><div id=\"a\">{}</div><div id=\"b\">{giant}</div><div id=\"c\">{}</div></body></html>",
        paragraph("before", 20),
        paragraph("after", 20)
    );
    let chunks = chunker(1_000, 0).chunk(&html);

    let giant_chunks: Vec<_> = chunks
        .iter()
        .filter(|chunk| chunk.fragment_html.contains("giant "))
        .collect();
    assert_eq!(giant_chunks.len(), 1);
    assert!(!giant_chunks[0].fragment_html.contains("before "));
    assert!(!giant_chunks[0].fragment_html.contains("after "));
    assert_eq!(chunks_containing(&chunks, "before "), 1);
    assert_eq!(chunks_containing(&chunks, "after "), 1);
}

#[test]
fn test_small_chunks_merge_forward() {
    let html = sectioned_page(10, 1, 30);
    let (max_chars, min_chars) = (1_500, 1_000);
    let chunks = chunker(max_chars, min_chars).chunk(&html);

    assert!(chunks.len() > 1);
    for pair in chunks.windows(2) {
        let (current, next) = (&pair[0], &pair[1]);
        assert!(
            current.char_count() >= min_chars
                || current.char_count() + next.char_count() > max_chars,
            "chunk {} should have been merged into its successor",
            current.index
        );
    }
}

#[test]
fn test_unstructured_document_uses_paragraph_fallback() {
    let body: String = (0..40).map(|i| paragraph(&format!("para-{i}"), 30)).collect();
    let html = format!("<html><body>{body}</body></html>");
    let chunks = chunker(2_000, 0).chunk(&html);

    assert!(chunks.len() > 1);
    assert_eq!(chunks_containing(&chunks, "para-39 "), 1);
    for chunk in &chunks {
        assert!(chunk.char_count() <= 2_000);
    }
}

#[test]
fn test_malformed_markup_is_recovered() {
    let broken: String = (0..60)
        .map(|i| format!("<div class=\"main-block\"><p>broken-{i} <b>bold <i>text "))
        .collect();
    let chunks = chunker(1_500, 0).chunk(&broken);

    assert!(!chunks.is_empty());
    assert_indices_contiguous(&chunks);
    assert!(chunks.iter().any(|chunk| chunk.fragment_html.contains("broken-59")));
}

#[test]
fn test_parent_context_is_shared_by_all_chunks() {
    let html = sectioned_page(6, 5, 40);
    let chunks = chunker(3_000, 1_000).chunk(&html);

    let expected = ParentContext {
        body_classes: vec!["article".to_string(), "wide".to_string()],
        body_id: Some("page".to_string()),
        has_main_container: true,
        document_title: Some("Long read".to_string()),
    };
    for chunk in &chunks {
        assert_eq!(chunk.parent_context, expected);
    }
}

#[test]
fn test_head_content_is_not_chunked() {
    let html = sectioned_page(6, 5, 40);
    let chunks = chunker(3_000, 1_000).chunk(&html);

    assert!(chunks.iter().all(|chunk| !chunk.fragment_html.contains("<title>")));
}

#[test]
fn test_invalid_limits_are_rejected() {
    assert!(matches!(
        chunk_document("<p>x</p>", 100, 500),
        Err(MarginaliaError::InvalidArgument(_))
    ));
    assert!(matches!(
        chunk_document("<p>x</p>", 0, 0),
        Err(MarginaliaError::InvalidArgument(_))
    ));
}

#[test]
fn test_empty_document_yields_single_empty_chunk() {
    let chunks = chunk_document("", 100, 10).expect("limits are valid");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].fragment_html, "");
}
