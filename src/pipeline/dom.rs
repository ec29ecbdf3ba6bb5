//! Generic tree-traversal helpers over a parsed HTML document.
//!
//! The heuristics in [`super::extract`] are written entirely in terms of
//! these walks (following siblings, ancestors, filtered descendants, text
//! with excluded subtrees) so no stage carries its own traversal code.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Node};

/// Element siblings after `el`, in document order.
pub fn following_siblings<'a>(el: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    el.next_siblings().filter_map(ElementRef::wrap)
}

/// Element ancestors of `el`, nearest first.
pub fn ancestors<'a>(el: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    el.ancestors().filter_map(ElementRef::wrap)
}

/// Nearest element ancestor of `el` satisfying `pred`.
pub fn closest<'a>(el: ElementRef<'a>, pred: impl Fn(ElementRef<'a>) -> bool) -> Option<ElementRef<'a>> {
    ancestors(el).find(|a| pred(*a))
}

/// Parent element of `el`.
pub fn parent_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.parent().and_then(ElementRef::wrap)
}

/// Element descendants of `el` (excluding `el` itself) satisfying `pred`,
/// in document order.
pub fn descendants_where<'a, P>(el: ElementRef<'a>, pred: P) -> impl Iterator<Item = ElementRef<'a>> + 'a
where
    P: Fn(ElementRef<'a>) -> bool + 'a,
{
    el.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .filter(move |d| pred(*d))
}

/// `el` itself followed by its descendants, filtered.
pub fn self_and_descendants_where<'a, P>(el: ElementRef<'a>, pred: P) -> impl Iterator<Item = ElementRef<'a>> + 'a
where
    P: Fn(ElementRef<'a>) -> bool + 'a,
{
    el.descendants()
        .filter_map(ElementRef::wrap)
        .filter(move |d| pred(*d))
}

/// Tag-name predicate.
pub fn is_tag(el: ElementRef<'_>, name: &str) -> bool {
    el.value().name().eq_ignore_ascii_case(name)
}

pub fn has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

/// Concatenated text of every descendant text node.
pub fn text_content(el: ElementRef<'_>) -> String {
    el.text().collect()
}

/// Text of `el` with every descendant subtree matching `excluded` left out.
///
/// `el` itself is never excluded. The document is not modified.
pub fn text_excluding(el: ElementRef<'_>, excluded: &dyn Fn(ElementRef<'_>) -> bool) -> String {
    let root = el.id();
    el.descendants()
        .filter_map(|node| match node.value() {
            Node::Text(text) => Some((node, &**text)),
            _ => None,
        })
        .filter(|(node, _)| {
            !node
                .ancestors()
                .take_while(|a| a.id() != root)
                .filter_map(ElementRef::wrap)
                .any(|a| excluded(a))
        })
        .map(|(_, text)| text)
        .collect()
}

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapse whitespace runs to a single space and trim.
pub fn collapse_whitespace(s: &str) -> String {
    RE_WHITESPACE.replace_all(s, " ").trim().to_string()
}
