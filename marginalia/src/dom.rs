//! Parsed-document handles.
//!
//! Everything that walks an element tree (text search, selector and XPath
//! generation) is written against [`DomNode`], so the anchoring logic does not
//! care which HTML parser produced the tree. [`Document`] is the
//! `scraper`-backed implementation used throughout the crate.

use scraper::{ElementRef, Html, Selector};

/// Read-only view of an element in a parsed HTML tree.
pub trait DomNode: Clone {
    /// Lowercase local tag name.
    fn tag_name(&self) -> &str;

    fn attr(&self, name: &str) -> Option<&str>;

    fn classes(&self) -> Vec<&str>;

    fn parent_element(&self) -> Option<Self>;

    fn child_elements(&self) -> Vec<Self>;

    /// Text of the element and all of its descendants, concatenated in document order.
    fn text_content(&self) -> String;

    fn outer_html(&self) -> String;

    fn is_same_node(&self, other: &Self) -> bool;

    /// All elements of this node's document matching `css`, in document order.
    ///
    /// Returns `None` when `css` cannot be parsed.
    fn query_document(&self, css: &str) -> Option<Vec<Self>>;

    /// Topmost ancestor (the `html` element for a parsed document).
    fn root_element(&self) -> Self {
        let mut current = self.clone();
        while let Some(parent) = current.parent_element() {
            current = parent;
        }
        current
    }

    /// This element followed by its descendants, in document order.
    fn descendant_elements(&self) -> Vec<Self> {
        let mut out = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(node) = stack.pop() {
            let mut children = node.child_elements();
            children.reverse();
            out.push(node);
            stack.extend(children);
        }
        out
    }
}

impl<'a> DomNode for ElementRef<'a> {
    fn tag_name(&self) -> &str {
        self.value().name()
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.value().attr(name)
    }

    fn classes(&self) -> Vec<&str> {
        self.value().classes().collect()
    }

    fn parent_element(&self) -> Option<Self> {
        self.parent().and_then(ElementRef::wrap)
    }

    fn child_elements(&self) -> Vec<Self> {
        self.children().filter_map(ElementRef::wrap).collect()
    }

    fn text_content(&self) -> String {
        self.text().collect()
    }

    fn outer_html(&self) -> String {
        self.html()
    }

    fn is_same_node(&self, other: &Self) -> bool {
        self.id() == other.id()
    }

    fn query_document(&self, css: &str) -> Option<Vec<Self>> {
        let selector = Selector::parse(css).ok()?;
        let root = DomNode::root_element(self);
        let mut matches = Vec::new();
        // `select` only visits descendants, so the root is checked separately.
        if selector.matches(&root) {
            matches.push(root);
        }
        matches.extend(root.select(&selector));
        Some(matches)
    }
}

/// A leniently parsed HTML document.
///
/// Malformed markup is recovered by html5ever; parsing never fails.
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
        }
    }

    pub fn root(&self) -> ElementRef<'_> {
        self.html.root_element()
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    /// The `body` element, or the root when the tree has none.
    pub fn body(&self) -> ElementRef<'_> {
        self.first("body").unwrap_or_else(|| self.root())
    }

    /// First element matching `css`, `None` for no match or an invalid selector.
    pub fn first(&self, css: &str) -> Option<ElementRef<'_>> {
        let selector = Selector::parse(css).ok()?;
        self.html.select(&selector).next()
    }

    /// All elements matching `css`, `None` for an invalid selector.
    pub fn select_all(&self, css: &str) -> Option<Vec<ElementRef<'_>>> {
        let selector = Selector::parse(css).ok()?;
        Some(self.html.select(&selector).collect())
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("errors", &self.html.errors.len())
            .finish()
    }
}

/// Collapse whitespace runs to single spaces and trim both ends.
pub fn collapse_whitespace(input: &str) -> String {
    let mut buf = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_space && !buf.is_empty() {
                buf.push(' ');
            }
            last_space = true;
        } else {
            buf.push(ch);
            last_space = false;
        }
    }
    if buf.ends_with(' ') {
        buf.pop();
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
        assert_eq!(collapse_whitespace(""), "");
        assert_eq!(collapse_whitespace("   "), "");
    }

    #[test]
    fn test_descendant_elements_in_document_order() {
        let doc = Document::parse("<div id='a'><p id='b'><span id='c'></span></p><p id='d'></p></div>");
        let div = doc.first("#a").unwrap();
        let ids: Vec<_> = div
            .descendant_elements()
            .iter()
            .filter_map(|el| el.attr("id").map(str::to_string))
            .collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_query_document_includes_root_and_rejects_bad_css() {
        let doc = Document::parse("<p>one</p><p>two</p>");
        let p = doc.first("p").unwrap();

        assert_eq!(p.query_document("p").map(|v| v.len()), Some(2));
        assert_eq!(p.query_document("html").map(|v| v.len()), Some(1));
        assert!(p.query_document("p[[").is_none());
    }

    #[test]
    fn test_text_content_includes_descendants() {
        let doc = Document::parse("<div id='x'>Hello <b>bold</b> world</div>");
        let div = doc.first("#x").unwrap();
        assert_eq!(div.text_content(), "Hello bold world");
        assert_eq!(DomNode::root_element(&div).tag_name(), "html");
    }

    #[test]
    fn test_body_falls_back_for_any_input() {
        let doc = Document::parse("<h1>Unclosed <p>Nested");
        assert_eq!(doc.body().tag_name(), "body");
    }
}
