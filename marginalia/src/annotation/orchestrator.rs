use std::cell::OnceCell;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use scraper::ElementRef;

use crate::anchoring::{absolute_xpath, SelectorEngine, TextIndex};
use crate::config::OrchestratorConfig;
use crate::dom::Document;
use crate::error::{MarginaliaError, Result};
use crate::models::{
    Annotation, Chunk, ChunkGenerationOutcome, FailureKind, ProcessedChunks, RawAnnotation,
    TokenUsage,
};
use crate::processing::DocumentChunker;

use super::generator::{PromptContext, TextGenerator};
use super::parser::parse_annotations;

/// Generation result for one chunk, before its annotations are anchored.
enum ChunkResult {
    Generated {
        chunk_index: usize,
        annotations: Vec<RawAnnotation>,
        usage: TokenUsage,
    },
    Failed(ChunkGenerationOutcome),
}

/// Runs annotation generation over document chunks in fixed-size batches.
pub struct ChunkOrchestrator<G: TextGenerator + ?Sized> {
    generator: Arc<G>,
    engine: SelectorEngine,
    config: OrchestratorConfig,
}

impl<G: TextGenerator + ?Sized> ChunkOrchestrator<G> {
    pub fn new(generator: Arc<G>, engine: SelectorEngine, config: OrchestratorConfig) -> Self {
        Self {
            generator,
            engine,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Chunk `html` and annotate every chunk.
    pub async fn annotate_document(
        &self,
        chunker: &DocumentChunker,
        html: &str,
    ) -> Result<ProcessedChunks> {
        let chunks = chunker.chunk(html);
        self.run(&chunks, html).await
    }

    /// [`Self::process_chunks_parallel`] with the configured concurrency.
    pub async fn run(&self, chunks: &[Chunk], full_document_html: &str) -> Result<ProcessedChunks> {
        self.process_chunks_parallel(chunks, full_document_html, self.config.max_concurrent)
            .await
    }

    /// Generate annotations for `chunks`, at most `max_concurrent` calls at a time.
    ///
    /// Chunks are processed in consecutive batches of `max_concurrent`; a batch
    /// starts only after every call of the previous one has settled. A failed
    /// or timed-out call only fails its own chunk. Candidate selectors are
    /// checked against `full_document_html` and repaired from the highlighted
    /// text when they do not single out the right element there.
    pub async fn process_chunks_parallel(
        &self,
        chunks: &[Chunk],
        full_document_html: &str,
        max_concurrent: usize,
    ) -> Result<ProcessedChunks> {
        if max_concurrent == 0 {
            return Err(MarginaliaError::InvalidArgument(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if chunks.is_empty() {
            return Ok(ProcessedChunks::default());
        }
        check_contiguous(chunks)?;

        let total_batches = chunks.len().div_ceil(max_concurrent);
        let mut outcomes = Vec::with_capacity(chunks.len());

        for (batch_index, batch) in chunks.chunks(max_concurrent).enumerate() {
            tracing::debug!(
                batch = batch_index + 1,
                total_batches,
                size = batch.len(),
                "Starting chunk batch"
            );

            let results = join_all(batch.iter().map(|chunk| self.generate_chunk(chunk))).await;
            outcomes.extend(self.anchor_batch(full_document_html, results));
        }

        let processed = collect_outcomes(outcomes);

        tracing::info!(
            chunks = chunks.len(),
            succeeded = processed.succeeded.len(),
            failed = processed.failed.len(),
            annotations = processed.annotations().count(),
            input_tokens = processed.usage.input_tokens,
            output_tokens = processed.usage.output_tokens,
            "Chunk annotation run finished"
        );

        Ok(processed)
    }

    async fn generate_chunk(&self, chunk: &Chunk) -> ChunkResult {
        let context = PromptContext::from_chunk(chunk, self.config.instructions.as_deref());
        let secs = self.config.call_timeout_secs;

        let generation = match tokio::time::timeout(
            Duration::from_secs(secs),
            self.generator.generate(&context),
        )
        .await
        {
            Ok(Ok(generation)) => generation,
            Ok(Err(error)) => {
                let failure = classify_failure(&error);
                tracing::warn!(chunk = chunk.index, %failure, error = %error, "Chunk generation failed");
                return ChunkResult::Failed(ChunkGenerationOutcome::failed(
                    chunk.index,
                    failure,
                    error.to_string(),
                ));
            }
            Err(_) => {
                let error = MarginaliaError::Timeout { secs };
                tracing::warn!(chunk = chunk.index, timeout_secs = secs, "Chunk generation timed out");
                return ChunkResult::Failed(ChunkGenerationOutcome::failed(
                    chunk.index,
                    FailureKind::Timeout,
                    error.to_string(),
                ));
            }
        };

        match parse_annotations(&generation.text) {
            Ok(annotations) => ChunkResult::Generated {
                chunk_index: chunk.index,
                annotations,
                usage: generation.usage,
            },
            Err(error) => {
                tracing::warn!(chunk = chunk.index, error = %error, "Chunk response could not be parsed");
                ChunkResult::Failed(
                    ChunkGenerationOutcome::failed(
                        chunk.index,
                        FailureKind::MalformedResponse,
                        error.to_string(),
                    )
                    .with_usage(generation.usage),
                )
            }
        }
    }

    /// Anchor a settled batch against the full document, parsing it once and
    /// indexing its text at most once.
    fn anchor_batch(
        &self,
        full_document_html: &str,
        results: Vec<ChunkResult>,
    ) -> Vec<ChunkGenerationOutcome> {
        let needs_document = results
            .iter()
            .any(|result| matches!(result, ChunkResult::Generated { annotations, .. } if !annotations.is_empty()));
        let document = needs_document.then(|| Document::parse(full_document_html));
        let index = OnceCell::new();

        results
            .into_iter()
            .map(|result| match result {
                ChunkResult::Failed(outcome) => outcome,
                ChunkResult::Generated {
                    chunk_index,
                    annotations,
                    usage,
                } => {
                    let anchored = match &document {
                        Some(document) => annotations
                            .into_iter()
                            .map(|raw| self.anchor_annotation(document, &index, raw))
                            .collect(),
                        None => Vec::new(),
                    };
                    ChunkGenerationOutcome::succeeded(chunk_index, anchored, usage)
                }
            })
            .collect()
    }

    /// Keep a candidate selector that already resolves to the highlighted
    /// element in the full document, otherwise repair it from the text.
    fn anchor_annotation<'a>(
        &self,
        document: &'a Document,
        index: &OnceCell<TextIndex<ElementRef<'a>>>,
        raw: RawAnnotation,
    ) -> Annotation {
        if let Some(candidate) = raw
            .candidate_selector
            .as_deref()
            .map(str::trim)
            .filter(|selector| !selector.is_empty())
        {
            let outcome =
                self.engine
                    .validate_selector(document, candidate, Some(&raw.highlighted_text));
            if outcome.is_valid {
                let xpath = outcome.matched_element.as_ref().and_then(absolute_xpath);
                return Annotation {
                    candidate_selector: Some(candidate.to_string()),
                    original_selector: raw.candidate_selector.clone(),
                    xpath,
                    anchored: true,
                    text_similarity: 1.0,
                    content: raw.content,
                    highlighted_text: raw.highlighted_text,
                };
            }
        }

        let index = index.get_or_init(|| TextIndex::build(&document.root()));
        let repair = self.engine.repair_with_index(
            index,
            &raw.highlighted_text,
            raw.candidate_selector.as_deref(),
            None,
        );
        if !repair.succeeded {
            tracing::debug!(
                selector = raw.candidate_selector.as_deref().unwrap_or("-"),
                message = %repair.message,
                "Annotation left unanchored"
            );
        }

        Annotation {
            candidate_selector: repair.css_selector,
            original_selector: raw.candidate_selector,
            xpath: repair.xpath,
            anchored: repair.succeeded,
            text_similarity: repair.text_similarity,
            content: raw.content,
            highlighted_text: raw.highlighted_text,
        }
    }
}

fn check_contiguous(chunks: &[Chunk]) -> Result<()> {
    let mut indices: Vec<usize> = chunks.iter().map(|chunk| chunk.index).collect();
    indices.sort_unstable();
    let contiguous = indices
        .iter()
        .enumerate()
        .all(|(position, index)| position == *index);

    if contiguous {
        Ok(())
    } else {
        Err(MarginaliaError::InvalidArgument(format!(
            "chunk indices must be contiguous from 0, got {indices:?}"
        )))
    }
}

fn classify_failure(error: &MarginaliaError) -> FailureKind {
    match error {
        MarginaliaError::LlmRateLimit { .. } => FailureKind::RateLimited,
        MarginaliaError::Timeout { .. } => FailureKind::Timeout,
        MarginaliaError::Json(_) => FailureKind::MalformedResponse,
        _ => FailureKind::Upstream,
    }
}

fn collect_outcomes(outcomes: Vec<ChunkGenerationOutcome>) -> ProcessedChunks {
    let mut processed = ProcessedChunks::default();
    for outcome in outcomes {
        processed.usage += outcome.usage;
        if outcome.failed {
            processed.failed.push(outcome);
        } else {
            processed.succeeded.push(outcome);
        }
    }
    processed.succeeded.sort_by_key(|outcome| outcome.chunk_index);
    processed.failed.sort_by_key(|outcome| outcome.chunk_index);
    processed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Generation;
    use crate::models::ParentContext;
    use async_trait::async_trait;

    const PAGE: &str = r#"<html><body>
        <section id="main"><p class="lead">Alpha claim here.</p></section>
        <section id="side"><p class="lead">Beta remark there.</p></section>
    </body></html>"#;

    struct FixedGenerator(String);

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        async fn generate(&self, _context: &PromptContext) -> Result<Generation> {
            Ok(Generation::new(self.0.clone(), TokenUsage::new(10, 5)))
        }
    }

    fn orchestrator(response: &str) -> ChunkOrchestrator<FixedGenerator> {
        ChunkOrchestrator::new(
            Arc::new(FixedGenerator(response.to_string())),
            SelectorEngine::default(),
            OrchestratorConfig::default(),
        )
    }

    fn chunks(count: usize) -> Vec<Chunk> {
        (0..count)
            .map(|index| {
                Chunk::new(index, count, "<p>x</p>".to_string(), ParentContext::default())
            })
            .collect()
    }

    #[test]
    fn test_check_contiguous() {
        assert!(check_contiguous(&chunks(3)).is_ok());

        let mut reordered = chunks(3);
        reordered.swap(0, 2);
        assert!(check_contiguous(&reordered).is_ok());

        let mut gapped = chunks(3);
        gapped[1].index = 7;
        assert!(check_contiguous(&gapped).is_err());
    }

    #[test]
    fn test_classify_failure() {
        assert_eq!(
            classify_failure(&MarginaliaError::LlmRateLimit { retry_after: Some(3) }),
            FailureKind::RateLimited
        );
        assert_eq!(
            classify_failure(&MarginaliaError::Llm("boom".to_string())),
            FailureKind::Upstream
        );
    }

    #[test]
    fn test_valid_candidate_is_kept() {
        let orchestrator = orchestrator("[]");
        let document = Document::parse(PAGE);
        let raw = RawAnnotation {
            content: "note".to_string(),
            highlighted_text: "Alpha claim".to_string(),
            candidate_selector: Some("#main > p.lead".to_string()),
        };

        let annotation = orchestrator.anchor_annotation(&document, &OnceCell::new(), raw);
        assert!(annotation.anchored);
        assert_eq!(annotation.candidate_selector.as_deref(), Some("#main > p.lead"));
        assert_eq!(annotation.xpath.as_deref(), Some("/html/body/section[1]/p"));
    }

    #[test]
    fn test_ambiguous_candidate_is_repaired() {
        let orchestrator = orchestrator("[]");
        let document = Document::parse(PAGE);
        let raw = RawAnnotation {
            content: "note".to_string(),
            highlighted_text: "Beta remark".to_string(),
            candidate_selector: Some("p.lead".to_string()),
        };

        let annotation = orchestrator.anchor_annotation(&document, &OnceCell::new(), raw);
        assert!(annotation.anchored);
        assert_eq!(annotation.original_selector.as_deref(), Some("p.lead"));
        assert_eq!(annotation.candidate_selector.as_deref(), Some("#side > p.lead"));
    }

    #[test]
    fn test_missing_text_keeps_original_selector() {
        let orchestrator = orchestrator("[]");
        let document = Document::parse(PAGE);
        let raw = RawAnnotation {
            content: "note".to_string(),
            highlighted_text: "nowhere on this page at all".to_string(),
            candidate_selector: Some("p.missing".to_string()),
        };

        let annotation = orchestrator.anchor_annotation(&document, &OnceCell::new(), raw);
        assert!(!annotation.anchored);
        assert_eq!(annotation.candidate_selector.as_deref(), Some("p.missing"));
        assert!(annotation.xpath.is_none());
    }

    #[test]
    fn test_repairs_share_one_text_index() {
        let orchestrator = orchestrator("[]");
        let document = Document::parse(PAGE);
        let index = OnceCell::new();
        let raw = |text: &str, selector: &str| RawAnnotation {
            content: "note".to_string(),
            highlighted_text: text.to_string(),
            candidate_selector: Some(selector.to_string()),
        };

        let kept =
            orchestrator.anchor_annotation(&document, &index, raw("Alpha claim", "#main > p.lead"));
        assert!(kept.anchored);
        assert!(index.get().is_none(), "valid candidates need no index");

        let first =
            orchestrator.anchor_annotation(&document, &index, raw("Alpha claim", "p.lead"));
        let built = index.get().map(|index| index as *const TextIndex<_>);
        assert!(built.is_some());

        let second =
            orchestrator.anchor_annotation(&document, &index, raw("Beta remark", "p.lead"));
        assert_eq!(index.get().map(|index| index as *const TextIndex<_>), built);

        assert_eq!(first.candidate_selector.as_deref(), Some("#main > p.lead"));
        assert_eq!(second.candidate_selector.as_deref(), Some("#side > p.lead"));
    }

    #[test]
    fn test_anchor_batch_repairs_every_chunk() {
        let orchestrator = orchestrator("[]");
        let raw = |text: &str| RawAnnotation {
            content: "note".to_string(),
            highlighted_text: text.to_string(),
            candidate_selector: Some("p".to_string()),
        };
        let results = vec![
            ChunkResult::Generated {
                chunk_index: 0,
                annotations: vec![raw("Alpha claim"), raw("Beta remark")],
                usage: TokenUsage::new(1, 1),
            },
            ChunkResult::Generated {
                chunk_index: 1,
                annotations: vec![raw("Beta remark")],
                usage: TokenUsage::new(1, 1),
            },
        ];

        let outcomes = orchestrator.anchor_batch(PAGE, results);
        let selectors: Vec<_> = outcomes
            .iter()
            .flat_map(|outcome| outcome.annotations.iter())
            .map(|annotation| annotation.candidate_selector.clone())
            .collect();
        assert_eq!(
            selectors,
            vec![
                Some("#main > p.lead".to_string()),
                Some("#side > p.lead".to_string()),
                Some("#side > p.lead".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_response_fails_chunk_but_keeps_usage() {
        let orchestrator = orchestrator("no json here");
        let result = orchestrator
            .process_chunks_parallel(&chunks(2), PAGE, 2)
            .await
            .unwrap();

        assert_eq!(result.failed.len(), 2);
        assert!(result
            .failed
            .iter()
            .all(|outcome| outcome.failure == Some(FailureKind::MalformedResponse)));
        assert_eq!(result.usage, TokenUsage::new(20, 10));
    }
}
