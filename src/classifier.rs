//! Decides whether an element behaves like something a user can click.

use crate::dom::{Document, NodeId};

/// Tags that are interactive by themselves
pub const INTERACTIVE_TAGS: [&str; 10] = [
    "a", "button", "input", "select", "textarea", "label", "option", "area", "summary", "details",
];

/// Inline event handler attributes that imply a click target
pub const HANDLER_ATTRIBUTES: [&str; 6] = [
    "onclick",
    "onmousedown",
    "onmouseup",
    "onmousemove",
    "onmouseover",
    "onmouseout",
];

/// ARIA roles of interactive widgets
pub const INTERACTIVE_ROLES: [&str; 11] = [
    "button", "link", "menuitem", "tab", "option", "checkbox", "radio", "switch", "slider",
    "combobox", "textbox",
];

/// Data attributes front-end frameworks use to wire up click behaviour
pub const HINT_ATTRIBUTES: [&str; 7] = [
    "data-clickable",
    "data-toggle",
    "data-target",
    "data-dismiss",
    "data-action",
    "data-href",
    "data-url",
];

/// Class name fragments conventionally given to clickable widgets
pub const CLICKABLE_CLASS_HINTS: [&str; 6] = ["btn", "button", "clickable", "link", "nav", "menu"];

/// Ancestors examined when the element itself shows no sign of interactivity
pub const MAX_ANCESTOR_HOPS: usize = 10;

/// Whether `element` is clickable.
///
/// Checks run in a fixed order and stop at the first decisive one: elements
/// that ignore the pointer, are invisible or disabled are never clickable;
/// otherwise any of the tag, handler, role, tabindex, cursor, data attribute,
/// class or `href` signals makes the element clickable. As a last resort the
/// nearest ancestors are searched for a wrapping link or control, since cards
/// and nav items often put the handler on a container.
pub fn is_clickable(doc: &Document, element: Option<NodeId>) -> bool {
    let Some(id) = element.filter(|&id| doc.is_element(id)) else {
        return false;
    };
    let style = doc.style(id);

    if style.pointer_events == "none" {
        ::log::trace!("<{}> ignores pointer events", tag_of(doc, id));
        return false;
    }
    if style.is_hidden() || doc.has_attr(id, "disabled") {
        return false;
    }
    if has_direct_signal(doc, id) {
        return true;
    }
    if style.cursor == "pointer"
        || HINT_ATTRIBUTES.iter().any(|a| doc.has_attr(id, a))
        || has_clickable_class(doc, id)
    {
        return true;
    }
    if has_href(doc, id) {
        return true;
    }

    let wrapped = doc
        .ancestors(id)
        .take(MAX_ANCESTOR_HOPS)
        .take_while(|&a| !matches!(doc.tag(a), Some("body" | "html")))
        .find(|&a| has_direct_signal(doc, a) || has_href(doc, a));
    if let Some(ancestor) = wrapped {
        ::log::debug!(
            "<{}> is clickable through ancestor <{}>",
            tag_of(doc, id),
            tag_of(doc, ancestor)
        );
        return true;
    }
    false
}

/// Tag, handler, role or tabindex signals, in that order
fn has_direct_signal(doc: &Document, id: NodeId) -> bool {
    if doc.tag(id).is_some_and(|t| INTERACTIVE_TAGS.contains(&t)) {
        return true;
    }
    if HANDLER_ATTRIBUTES.iter().any(|a| doc.has_attr(id, a)) {
        return true;
    }
    if doc
        .attr(id, "role")
        .is_some_and(|r| INTERACTIVE_ROLES.contains(&r.trim().to_ascii_lowercase().as_str()))
    {
        return true;
    }
    doc.attr(id, "tabindex").is_some_and(|t| t.trim() != "-1")
}

pub(crate) fn has_clickable_class(doc: &Document, id: NodeId) -> bool {
    doc.attr(id, "class").is_some_and(|class| {
        let class = class.to_ascii_lowercase();
        CLICKABLE_CLASS_HINTS.iter().any(|hint| class.contains(hint))
    })
}

fn has_href(doc: &Document, id: NodeId) -> bool {
    doc.attr(id, "href").is_some_and(|h| !h.trim().is_empty())
}

fn tag_of(doc: &Document, id: NodeId) -> &str {
    doc.tag(id).unwrap_or("#node")
}
