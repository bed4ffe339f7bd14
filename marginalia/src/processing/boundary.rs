use std::collections::HashSet;

use ego_tree::NodeId;
use scraper::ElementRef;

use crate::dom::Document;

/// Split-point rules, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryRule {
    /// `section` elements carrying an id or class
    Sections,
    Articles,
    /// `div`s whose class suggests primary content
    ContentContainers,
    IdentifiedContainers,
    TopHeadings,
    /// Every paragraph and `div`
    Fallback,
}

impl BoundaryRule {
    pub const PRIORITY: [BoundaryRule; 6] = [
        BoundaryRule::Sections,
        BoundaryRule::Articles,
        BoundaryRule::ContentContainers,
        BoundaryRule::IdentifiedContainers,
        BoundaryRule::TopHeadings,
        BoundaryRule::Fallback,
    ];

    pub fn selector(&self) -> &'static str {
        match self {
            BoundaryRule::Sections => "section[id], section[class]",
            BoundaryRule::Articles => "article",
            BoundaryRule::ContentContainers => {
                "div[class*='content'], div[class*='main'], div[class*='article']"
            }
            BoundaryRule::IdentifiedContainers => "div[id]",
            BoundaryRule::TopHeadings => "h1, h2",
            BoundaryRule::Fallback => "p, div",
        }
    }
}

/// Boundary elements chosen for a document.
pub struct Boundaries {
    pub rule: BoundaryRule,
    /// Outermost boundary elements
    pub elements: HashSet<NodeId>,
    /// Ancestors of boundary elements, which are descended into rather than emitted whole
    pub containers: HashSet<NodeId>,
}

/// Apply the first rule that yields more than one candidate.
pub fn select_boundaries(document: &Document) -> Boundaries {
    let (rule, candidates) = BoundaryRule::PRIORITY
        .iter()
        .map(|rule| (*rule, document.select_all(rule.selector()).unwrap_or_default()))
        .find(|(_, candidates)| candidates.len() > 1)
        .unwrap_or_else(|| {
            let rule = BoundaryRule::Fallback;
            (rule, document.select_all(rule.selector()).unwrap_or_default())
        });

    let candidate_ids: HashSet<NodeId> = candidates.iter().map(|el| el.id()).collect();

    let elements: HashSet<NodeId> = candidates
        .iter()
        .filter(|el| !ancestors(el).any(|ancestor| candidate_ids.contains(&ancestor.id())))
        .map(|el| el.id())
        .collect();

    let containers: HashSet<NodeId> = candidates
        .iter()
        .filter(|el| elements.contains(&el.id()))
        .flat_map(|el| ancestors(el).map(|ancestor| ancestor.id()))
        .collect();

    tracing::debug!(
        rule = ?rule,
        candidates = candidates.len(),
        boundaries = elements.len(),
        "Selected chunk boundaries"
    );

    Boundaries {
        rule,
        elements,
        containers,
    }
}

fn ancestors<'a>(element: &ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.ancestors().filter_map(ElementRef::wrap)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_for(html: &str) -> BoundaryRule {
        select_boundaries(&Document::parse(html)).rule
    }

    #[test]
    fn test_sections_win_when_plural() {
        let html = "<section id='a'><p>x</p></section><section class='b'><p>y</p></section><article></article><article></article>";
        assert_eq!(rule_for(html), BoundaryRule::Sections);
    }

    #[test]
    fn test_single_candidate_falls_through() {
        let html = "<section id='only'></section><article>1</article><article>2</article>";
        assert_eq!(rule_for(html), BoundaryRule::Articles);
    }

    #[test]
    fn test_bare_sections_do_not_count() {
        let html = "<section></section><section></section><h1>A</h1><h2>B</h2>";
        assert_eq!(rule_for(html), BoundaryRule::TopHeadings);
    }

    #[test]
    fn test_content_class_containers() {
        let html = "<div class='main-content'>a</div><div class='article-body'>b</div>";
        assert_eq!(rule_for(html), BoundaryRule::ContentContainers);
    }

    #[test]
    fn test_identified_containers() {
        let html = "<div id='one'>a</div><div id='two'>b</div>";
        assert_eq!(rule_for(html), BoundaryRule::IdentifiedContainers);
    }

    #[test]
    fn test_fallback_for_plain_text() {
        assert_eq!(rule_for("just text"), BoundaryRule::Fallback);
    }

    #[test]
    fn test_nested_candidates_collapse_to_outermost() {
        let document = Document::parse(
            "<div id='outer'><div id='inner'>a</div></div><div id='other'>b</div>",
        );
        let boundaries = select_boundaries(&document);
        assert_eq!(boundaries.rule, BoundaryRule::IdentifiedContainers);
        assert_eq!(boundaries.elements.len(), 2);

        let inner = document.first("#inner").unwrap();
        let outer = document.first("#outer").unwrap();
        assert!(!boundaries.elements.contains(&inner.id()));
        assert!(boundaries.elements.contains(&outer.id()));
        assert!(boundaries.containers.contains(&document.body().id()));
    }
}
