//! Selector and XPath generation for a located element.

use crate::dom::DomNode;

use super::types::RobustSelector;

/// Path levels carrying class information after which climbing stops.
const CLASS_ANCHOR_DEPTH: usize = 3;

/// Build a CSS selector and an absolute XPath for `element`.
///
/// The CSS selector is only returned if it matches `element` and nothing else
/// in its document.
pub fn generate_robust_selector<N: DomNode>(element: &N) -> RobustSelector {
    RobustSelector {
        css_selector: css_selector_for(element),
        xpath: absolute_xpath(element),
    }
}

fn css_selector_for<N: DomNode>(element: &N) -> Option<String> {
    if let Some(id) = unique_id(element) {
        return Some(format!("#{}", css_escape(id)));
    }

    if let Some(candidate) = climbing_path(element) {
        if selects_only(element, &candidate) {
            return Some(candidate);
        }
        tracing::trace!(selector = %candidate, "Short selector is ambiguous, qualifying full path");
    }

    let qualified = qualified_path(element);
    selects_only(element, &qualified).then_some(qualified)
}

/// Short selector climbing from the element towards the root.
fn climbing_path<N: DomNode>(element: &N) -> Option<String> {
    // (segment, combinator joining it to the segment below)
    let mut segments: Vec<(String, &'static str)> = Vec::new();
    let mut class_levels = 0;
    let mut elided = false;
    let mut current = element.clone();
    let mut is_target = true;

    loop {
        let tag = current.tag_name().to_ascii_lowercase();
        if tag == "html" || (tag == "body" && !is_target) {
            break;
        }

        let link = if elided { " " } else { " > " };

        if !is_target {
            if let Some(id) = unique_id(&current) {
                segments.push((format!("#{}", css_escape(id)), link));
                break;
            }
        }

        let classes = current.classes();
        let is_bare_wrapper = !is_target
            && classes.is_empty()
            && current.attr("id").is_none()
            && matches!(tag.as_str(), "div" | "span");

        if is_bare_wrapper {
            elided = true;
        } else {
            let mut segment = compound_selector(&tag, &classes);
            if let Some(position) = ambiguous_position(&current, &tag, &classes) {
                segment.push_str(&format!(":nth-of-type({position})"));
            }
            segments.push((segment, link));
            elided = false;

            if !classes.is_empty() {
                class_levels += 1;
                if class_levels >= CLASS_ANCHOR_DEPTH {
                    break;
                }
            }
        }

        match current.parent_element() {
            Some(parent) => current = parent,
            None => break,
        }
        is_target = false;
    }

    join_segments(&segments)
}

/// Fully qualified `html > body > ...` path, disambiguated with `:nth-of-type` at every level.
fn qualified_path<N: DomNode>(element: &N) -> String {
    let mut segments = Vec::new();
    let mut current = element.clone();

    loop {
        let tag = current.tag_name().to_ascii_lowercase();
        let parent = current.parent_element();
        let segment = match &parent {
            Some(parent) => match same_tag_position(parent, &current, &tag) {
                (position, count) if count > 1 => format!("{tag}:nth-of-type({position})"),
                _ => tag,
            },
            None => tag,
        };
        segments.push(segment);

        match parent {
            Some(parent) => current = parent,
            None => break,
        }
    }

    segments.reverse();
    segments.join(" > ")
}

fn join_segments(segments: &[(String, &'static str)]) -> Option<String> {
    let (top, rest) = segments.split_last()?;
    let mut selector = top.0.clone();
    let mut link = top.1;
    for (segment, next_link) in rest.iter().rev() {
        selector.push_str(link);
        selector.push_str(segment);
        link = next_link;
    }
    Some(selector)
}

fn compound_selector(tag: &str, classes: &[&str]) -> String {
    let mut selector = tag.to_string();
    for class in classes {
        selector.push('.');
        selector.push_str(&css_escape(class));
    }
    selector
}

/// 1-based `nth-of-type` position when tag and classes do not single the element out among its siblings.
fn ambiguous_position<N: DomNode>(element: &N, tag: &str, classes: &[&str]) -> Option<usize> {
    let parent = element.parent_element()?;
    let lookalikes = parent
        .child_elements()
        .into_iter()
        .filter(|sibling| sibling.tag_name().eq_ignore_ascii_case(tag))
        .filter(|sibling| {
            let sibling_classes = sibling.classes();
            classes.iter().all(|class| sibling_classes.contains(class))
        })
        .count();

    if lookalikes > 1 {
        Some(same_tag_position(&parent, element, tag).0)
    } else {
        None
    }
}

/// (1-based position among same-tag siblings, number of same-tag siblings)
fn same_tag_position<N: DomNode>(parent: &N, element: &N, tag: &str) -> (usize, usize) {
    let mut position = 0;
    let mut count = 0;
    for sibling in parent.child_elements() {
        if sibling.tag_name().eq_ignore_ascii_case(tag) {
            count += 1;
            if sibling.is_same_node(element) {
                position = count;
            }
        }
    }
    (position, count)
}

fn unique_id<N: DomNode>(element: &N) -> Option<&str> {
    let id = element.attr("id")?;
    if id.trim().is_empty() || id.chars().any(char::is_whitespace) {
        return None;
    }
    selects_only(element, &format!("#{}", css_escape(id))).then_some(id)
}

fn selects_only<N: DomNode>(element: &N, css: &str) -> bool {
    match element.query_document(css) {
        Some(matches) => matches.len() == 1 && matches[0].is_same_node(element),
        None => false,
    }
}

/// Absolute XPath such as `/html/body/div[2]/p`, with `[n]` predicates only
/// where same-tag siblings exist.
pub fn absolute_xpath<N: DomNode>(element: &N) -> Option<String> {
    let mut steps = Vec::new();
    let mut current = element.clone();

    loop {
        let tag = current.tag_name().to_ascii_lowercase();
        if tag.is_empty() {
            return None;
        }
        match current.parent_element() {
            Some(parent) => {
                let (position, count) = same_tag_position(&parent, &current, &tag);
                if position == 0 {
                    return None;
                }
                if count > 1 {
                    steps.push(format!("{tag}[{position}]"));
                } else {
                    steps.push(tag);
                }
                current = parent;
            }
            None => {
                steps.push(tag);
                break;
            }
        }
    }

    steps.reverse();
    Some(format!("/{}", steps.join("/")))
}

/// Resolve an absolute XPath in the form produced by [`absolute_xpath`].
///
/// Only `/tag` and `/tag[n]` steps are understood; anything else yields `None`.
pub fn resolve_xpath<N: DomNode>(root: &N, xpath: &str) -> Option<N> {
    let mut steps = xpath.strip_prefix('/')?.split('/');
    let (root_tag, root_index) = parse_step(steps.next()?)?;
    if !root.tag_name().eq_ignore_ascii_case(root_tag) || root_index != 1 {
        return None;
    }

    let mut current = root.clone();
    for step in steps {
        let (tag, index) = parse_step(step)?;
        current = current
            .child_elements()
            .into_iter()
            .filter(|child| child.tag_name().eq_ignore_ascii_case(tag))
            .nth(index - 1)?;
    }
    Some(current)
}

fn parse_step(step: &str) -> Option<(&str, usize)> {
    match step.split_once('[') {
        Some((tag, rest)) => {
            let index: usize = rest.strip_suffix(']')?.parse().ok()?;
            (!tag.is_empty() && index >= 1).then_some((tag, index))
        }
        None => (!step.is_empty()).then_some((step, 1)),
    }
}

/// Escape a string for use as a CSS identifier (`#id`, `.class`).
pub fn css_escape(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    let chars: Vec<char> = ident.chars().collect();

    for (index, &ch) in chars.iter().enumerate() {
        let leading_digit = ch.is_ascii_digit()
            && (index == 0 || (index == 1 && chars[0] == '-'));
        if ch == '\0' {
            out.push('\u{FFFD}');
        } else if leading_digit || ch.is_control() {
            out.push_str(&format!("\\{:x} ", ch as u32));
        } else if index == 0 && ch == '-' && chars.len() == 1 {
            out.push_str("\\-");
        } else if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || !ch.is_ascii() {
            out.push(ch);
        } else {
            out.push('\\');
            out.push(ch);
        }
    }

    out
}
