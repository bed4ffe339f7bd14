use serde::{Deserialize, Serialize};

use crate::dom::DomNode;

/// An element whose text contains, exactly or approximately, a searched string.
#[derive(Debug, Clone)]
pub struct TextMatch<N> {
    pub element: N,
    /// 1.0 for literal containment, otherwise the fuzzy similarity ratio
    pub similarity_score: f64,
}

/// Result of evaluating a CSS selector against a document.
#[derive(Debug, Clone)]
pub struct SelectorOutcome<N> {
    /// Exactly one element matched and, when requested, it contains the expected text
    pub is_valid: bool,
    pub match_count: usize,
    /// First matched element, present whenever `match_count > 0`
    pub matched_element: Option<N>,
    /// Outcome of the expected-text check, `None` when no text was supplied
    pub text_matches: Option<bool>,
}

impl<N> SelectorOutcome<N> {
    pub fn invalid() -> Self {
        Self {
            is_valid: false,
            match_count: 0,
            matched_element: None,
            text_matches: None,
        }
    }
}

impl<N: DomNode> SelectorOutcome<N> {
    /// Owned summary that outlives the parsed document.
    pub fn report(&self, selector: &str) -> SelectorReport {
        SelectorReport {
            selector: selector.to_string(),
            is_valid: self.is_valid,
            match_count: self.match_count,
            text_matches: self.text_matches,
            matched_tag: self
                .matched_element
                .as_ref()
                .map(|el| el.tag_name().to_string()),
            matched_xpath: self
                .matched_element
                .as_ref()
                .and_then(super::generator::absolute_xpath),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorReport {
    pub selector: String,
    pub is_valid: bool,
    pub match_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_matches: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_xpath: Option<String>,
}

/// CSS selector and absolute XPath generated for one element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobustSelector {
    pub css_selector: Option<String>,
    pub xpath: Option<String>,
}

impl RobustSelector {
    pub fn is_empty(&self) -> bool {
        self.css_selector.is_none() && self.xpath.is_none()
    }
}

/// Result of re-anchoring an annotation from its highlighted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairOutcome {
    pub succeeded: bool,
    /// Repaired selector, or the caller's original when the repair failed
    pub css_selector: Option<String>,
    /// Repaired XPath, or the caller's original when the repair failed
    pub xpath: Option<String>,
    /// Number of elements that contained the text
    pub match_count: usize,
    pub text_similarity: f64,
    pub message: String,
}

impl RepairOutcome {
    pub fn unchanged(css_selector: Option<&str>, xpath: Option<&str>) -> Self {
        Self {
            succeeded: false,
            css_selector: css_selector.map(str::to_string),
            xpath: xpath.map(str::to_string),
            match_count: 0,
            text_similarity: 0.0,
            message: String::new(),
        }
    }
}
