use std::cmp::Ordering;

use crate::config::SelectorConfig;
use crate::dom::{collapse_whitespace, Document, DomNode};

use super::generator::generate_robust_selector;
use super::similarity::{ratio_upper_bound, similarity_ratio};
use super::types::{RepairOutcome, RobustSelector, SelectorOutcome, SelectorReport, TextMatch};

pub const TEXT_NOT_FOUND_MESSAGE: &str = "text not found in document (exact or fuzzy)";

/// Elements whose text never renders as page content.
const NON_CONTENT_TAGS: &[&str] = &[
    "head", "title", "meta", "link", "script", "style", "noscript", "template",
];

/// Validates, locates and repairs selectors against full documents.
#[derive(Debug, Clone)]
pub struct SelectorEngine {
    fuzzy_threshold: f64,
}

impl Default for SelectorEngine {
    fn default() -> Self {
        Self::new(&SelectorConfig::default())
    }
}

impl SelectorEngine {
    pub fn new(config: &SelectorConfig) -> Self {
        Self {
            fuzzy_threshold: config.fuzzy_threshold.clamp(0.0, 1.0),
        }
    }

    pub fn fuzzy_threshold(&self) -> f64 {
        self.fuzzy_threshold
    }

    /// Evaluate `selector` against `document`.
    ///
    /// Valid means exactly one element matched and, when `expected_text` is
    /// given, that element's text contains it. Unparseable selectors are
    /// reported as invalid with no matches.
    pub fn validate_selector<'a>(
        &self,
        document: &'a Document,
        selector: &str,
        expected_text: Option<&str>,
    ) -> SelectorOutcome<scraper::ElementRef<'a>> {
        self.validate_from(&document.root(), selector, expected_text)
    }

    /// Parse `html` and validate `selector` against it, returning an owned report.
    pub fn validate_html(
        &self,
        html: &str,
        selector: &str,
        expected_text: Option<&str>,
    ) -> SelectorReport {
        let document = Document::parse(html);
        self.validate_selector(&document, selector, expected_text)
            .report(selector)
    }

    /// Validation over any element of the target document.
    pub fn validate_from<N: DomNode>(
        &self,
        node: &N,
        selector: &str,
        expected_text: Option<&str>,
    ) -> SelectorOutcome<N> {
        let selector = selector.trim();
        if selector.is_empty() {
            return SelectorOutcome::invalid();
        }

        let Some(matches) = node.query_document(selector) else {
            tracing::debug!(%selector, "Selector failed to parse");
            return SelectorOutcome::invalid();
        };

        let match_count = matches.len();
        let matched_element = matches.into_iter().next();
        let text_matches = expected_text.map(|expected| {
            matched_element
                .as_ref()
                .map(|element| contains_text(element, expected))
                .unwrap_or(false)
        });

        SelectorOutcome {
            is_valid: match_count == 1 && text_matches.unwrap_or(true),
            match_count,
            matched_element,
            text_matches,
        }
    }

    /// Find elements whose text contains `text`.
    ///
    /// Exact containment (score 1.0) always wins; the fuzzy pass only runs
    /// when no element contains the text literally and `use_fuzzy` is set.
    /// Results are ordered by score, then by the most specific element
    /// (shortest text, then deepest), then by document order.
    pub fn find_text_in_document<N: DomNode>(
        &self,
        root: &N,
        text: &str,
        use_fuzzy: bool,
    ) -> Vec<TextMatch<N>> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.find_text_in_index(&TextIndex::build(root), text, use_fuzzy)
    }

    /// [`Self::find_text_in_document`] over a prebuilt [`TextIndex`].
    pub fn find_text_in_index<N: DomNode>(
        &self,
        index: &TextIndex<N>,
        text: &str,
        use_fuzzy: bool,
    ) -> Vec<TextMatch<N>> {
        let needle = collapse_whitespace(text);
        if needle.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(f64, &Candidate<N>)> = index
            .candidates
            .iter()
            .filter(|candidate| candidate.text.contains(&needle))
            .map(|candidate| (1.0, candidate))
            .collect();

        if scored.is_empty() && use_fuzzy {
            let needle_lower = needle.to_lowercase();
            let needle_len = needle_lower.chars().count();
            scored = index
                .candidates
                .iter()
                .filter_map(|candidate| {
                    if ratio_upper_bound(needle_len, candidate.chars) < self.fuzzy_threshold {
                        return None;
                    }
                    let score = similarity_ratio(&needle_lower, &candidate.lower);
                    (score >= self.fuzzy_threshold).then_some((score, candidate))
                })
                .collect();
        }

        // ties on length go to the deeper element
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then(a.1.chars.cmp(&b.1.chars))
                .then(b.1.depth.cmp(&a.1.depth))
                .then(a.1.order.cmp(&b.1.order))
        });

        scored
            .into_iter()
            .map(|(similarity_score, candidate)| TextMatch {
                element: candidate.element.clone(),
                similarity_score,
            })
            .collect()
    }

    pub fn generate_robust_selector<N: DomNode>(&self, element: &N) -> RobustSelector {
        generate_robust_selector(element)
    }

    /// Re-anchor an annotation from its highlighted text.
    ///
    /// On failure the original selector and XPath are handed back unchanged.
    /// A successful repair is not re-validated here.
    pub fn repair_selector(
        &self,
        html: &str,
        highlighted_text: &str,
        old_css_selector: Option<&str>,
        old_xpath: Option<&str>,
    ) -> RepairOutcome {
        let document = Document::parse(html);
        self.repair_in_document(&document, highlighted_text, old_css_selector, old_xpath)
    }

    /// [`Self::repair_selector`] over an already parsed document.
    pub fn repair_in_document(
        &self,
        document: &Document,
        highlighted_text: &str,
        old_css_selector: Option<&str>,
        old_xpath: Option<&str>,
    ) -> RepairOutcome {
        let index = TextIndex::build(&document.root());
        self.repair_with_index(&index, highlighted_text, old_css_selector, old_xpath)
    }

    /// [`Self::repair_selector`] against a prebuilt [`TextIndex`], for callers
    /// repairing many annotations on the same document.
    pub fn repair_with_index<N: DomNode>(
        &self,
        index: &TextIndex<N>,
        highlighted_text: &str,
        old_css_selector: Option<&str>,
        old_xpath: Option<&str>,
    ) -> RepairOutcome {
        let mut outcome = RepairOutcome::unchanged(old_css_selector, old_xpath);

        let matches = self.find_text_in_index(index, highlighted_text, true);
        let Some(best) = matches.first() else {
            outcome.message = TEXT_NOT_FOUND_MESSAGE.to_string();
            return outcome;
        };

        outcome.match_count = matches.len();
        outcome.text_similarity = best.similarity_score;

        let generated = self.generate_robust_selector(&best.element);
        if generated.is_empty() {
            outcome.message = format!(
                "text found in {} element(s) but no selector could be generated",
                matches.len()
            );
            return outcome;
        }

        outcome.succeeded = true;
        outcome.message = format!(
            "anchored to <{}> ({} candidate(s), similarity {:.2})",
            best.element.tag_name(),
            matches.len(),
            best.similarity_score
        );
        outcome.css_selector = generated.css_selector;
        outcome.xpath = generated.xpath;

        tracing::debug!(
            css = outcome.css_selector.as_deref().unwrap_or("-"),
            xpath = outcome.xpath.as_deref().unwrap_or("-"),
            similarity = outcome.text_similarity,
            "Selector repaired"
        );

        outcome
    }
}

/// Content elements of one document with their whitespace-collapsed text.
///
/// Building it walks the whole tree, so repairs against the same document
/// share one index.
#[derive(Debug)]
pub struct TextIndex<N> {
    candidates: Vec<Candidate<N>>,
}

impl<N: DomNode> TextIndex<N> {
    pub fn build(root: &N) -> Self {
        let candidates = content_elements(root)
            .into_iter()
            .enumerate()
            .map(|(order, element)| {
                let text = collapse_whitespace(&element.text_content());
                Candidate {
                    lower: text.to_lowercase(),
                    chars: text.chars().count(),
                    depth: depth_of(&element),
                    text,
                    order,
                    element,
                }
            })
            .collect();
        Self { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[derive(Debug)]
struct Candidate<N> {
    element: N,
    text: String,
    lower: String,
    chars: usize,
    depth: usize,
    order: usize,
}

fn depth_of<N: DomNode>(element: &N) -> usize {
    let mut depth = 0;
    let mut current = element.parent_element();
    while let Some(parent) = current {
        depth += 1;
        current = parent.parent_element();
    }
    depth
}

fn contains_text<N: DomNode>(element: &N, expected: &str) -> bool {
    let expected = collapse_whitespace(expected);
    collapse_whitespace(&element.text_content()).contains(&expected)
}

/// Elements under `root` (inclusive) in document order, skipping non-content subtrees.
fn content_elements<N: DomNode>(root: &N) -> Vec<N> {
    let mut out = Vec::new();
    let mut stack = vec![root.clone()];
    while let Some(node) = stack.pop() {
        if is_non_content(&node) {
            continue;
        }
        let mut children = node.child_elements();
        children.reverse();
        out.push(node);
        stack.extend(children);
    }
    out
}

fn is_non_content<N: DomNode>(node: &N) -> bool {
    let tag = node.tag_name();
    NON_CONTENT_TAGS
        .iter()
        .any(|skip| tag.eq_ignore_ascii_case(skip))
}
