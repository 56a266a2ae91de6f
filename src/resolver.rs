//! Picks the element a context-menu action was meant for.
//!
//! Context-menu coordinates are unreliable when layers overlap, and the
//! remembered right-click target may be missing on the first interaction, so
//! resolution falls back through several sources before giving up.

use crate::classifier::{self, HANDLER_ATTRIBUTES, HINT_ATTRIBUTES, MAX_ANCESTOR_HOPS};
use crate::dom::{Document, NodeId};
use crate::error::ResolveError;

/// Element ids that mark a page-level layout container
const CONTAINER_IDS: [&str; 5] = ["main", "content", "root", "app", "page"];

/// Id and class fragments that mark a layout container
const CONTAINER_HINTS: [&str; 2] = ["container", "wrapper"];

/// Attributes that make an element worth analyzing even if it fails the classifier
const LENIENT_ATTRIBUTES: [&str; 4] = ["href", "role", "tabindex", "type"];

/// Resolves the element to analyze.
///
/// Sources are tried in order: the remembered right-click target, a hit test
/// at the given viewport point (looking through layout containers to the
/// clickable element beneath), then the inspector highlight. A candidate that
/// is not clickable is replaced by its nearest clickable ancestor; failing
/// that it is still accepted when it looks interactive or is at least not a
/// layout container.
pub fn resolve_target(
    doc: &Document,
    last_right_clicked: Option<NodeId>,
    click_x: Option<f64>,
    click_y: Option<f64>,
) -> Result<NodeId, ResolveError> {
    let candidate = last_right_clicked
        .filter(|&id| id < doc.len() && doc.is_element(id))
        .or_else(|| match (click_x, click_y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => hit_test(doc, x, y),
            _ => None,
        })
        .or_else(|| doc.highlighted());

    let Some(candidate) = candidate else {
        ::log::warn!("No right-click target, hit or highlight to resolve from");
        return Err(ResolveError::NoSuitableElement);
    };

    if classifier::is_clickable(doc, Some(candidate)) {
        return Ok(candidate);
    }
    if let Some(ancestor) = doc
        .ancestors(candidate)
        .take(MAX_ANCESTOR_HOPS)
        .find(|&a| classifier::is_clickable(doc, Some(a)))
    {
        ::log::debug!("Resolved to clickable ancestor {}", doc.xpath_for(ancestor));
        return Ok(ancestor);
    }
    if looks_interactive(doc, candidate) {
        ::log::debug!("Accepting interactive-looking {}", doc.xpath_for(candidate));
        return Ok(candidate);
    }
    if !is_generic_container(doc, candidate) {
        ::log::debug!("Accepting {} as a last resort", doc.xpath_for(candidate));
        return Ok(candidate);
    }
    Err(ResolveError::NoSuitableElement)
}

/// Topmost element at a point, seeing through layout containers
fn hit_test(doc: &Document, x: f64, y: f64) -> Option<NodeId> {
    let hit = doc.element_from_point(x, y)?;
    if !is_generic_container(doc, hit) {
        return Some(hit);
    }

    let beneath = doc
        .elements_from_point(x, y)
        .into_iter()
        .filter(|&id| id != hit)
        .find(|&id| classifier::is_clickable(doc, Some(id)));
    match beneath {
        Some(id) => {
            ::log::debug!("Hit container {}, using {}", doc.xpath_for(hit), doc.xpath_for(id));
            Some(id)
        }
        None => Some(hit),
    }
}

/// Whether an element is page layout rather than content
pub fn is_generic_container(doc: &Document, id: NodeId) -> bool {
    if matches!(doc.tag(id), Some("html" | "body")) {
        return true;
    }
    if let Some(elem_id) = doc.attr(id, "id") {
        let elem_id = elem_id.trim().to_ascii_lowercase();
        if CONTAINER_IDS.contains(&elem_id.as_str())
            || CONTAINER_HINTS.iter().any(|h| elem_id.contains(h))
        {
            return true;
        }
    }
    doc.attr(id, "class").is_some_and(|class| {
        class
            .split_ascii_whitespace()
            .map(str::to_ascii_lowercase)
            .any(|token| CONTAINER_HINTS.iter().any(|h| token.contains(h)))
    })
}

/// Weaker interactivity signals than the classifier accepts
fn looks_interactive(doc: &Document, id: NodeId) -> bool {
    LENIENT_ATTRIBUTES
        .iter()
        .chain(HANDLER_ATTRIBUTES.iter())
        .chain(HINT_ATTRIBUTES.iter())
        .any(|a| doc.has_attr(id, a))
        || classifier::has_clickable_class(doc, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::BoundingBox;

    fn boxed(doc: &mut Document, id: NodeId, x: f64, y: f64, w: f64, h: f64) {
        doc.node_mut(id).bounds = Some(BoundingBox {
            x,
            y,
            width: w,
            height: h,
        });
    }

    fn attrs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// body > div#contentContainer > button, all under the point (50, 50)
    fn container_page() -> (Document, NodeId, NodeId) {
        let mut doc = Document::new("https://example.com/");
        let html = doc.append_element(Document::ROOT, "html", vec![]);
        let body = doc.append_element(html, "body", vec![]);
        let container = doc.append_element(body, "div", attrs(&[("id", "contentContainer")]));
        let button = doc.append_element(container, "button", vec![]);
        doc.append_text(button, "Save");
        boxed(&mut doc, html, 0.0, 0.0, 800.0, 600.0);
        boxed(&mut doc, body, 0.0, 0.0, 800.0, 600.0);
        boxed(&mut doc, container, 0.0, 0.0, 400.0, 400.0);
        boxed(&mut doc, button, 20.0, 20.0, 100.0, 60.0);
        (doc, container, button)
    }

    #[test]
    fn test_remembered_target_wins() {
        let (doc, container, button) = container_page();
        let resolved = resolve_target(&doc, Some(button), Some(300.0), Some(300.0));
        assert_eq!(resolved, Ok(button));
        assert!(is_generic_container(&doc, container));
    }

    #[test]
    fn test_button_inside_container_beats_container() {
        let (doc, _, button) = container_page();
        assert_eq!(resolve_target(&doc, None, Some(50.0), Some(50.0)), Ok(button));
    }

    #[test]
    fn test_looks_beneath_overlay_container() {
        let (mut doc, _, button) = container_page();
        let body = doc.body().unwrap();
        let overlay = doc.append_element(body, "div", attrs(&[("class", "page-wrapper")]));
        boxed(&mut doc, overlay, 0.0, 0.0, 800.0, 600.0);
        assert_eq!(doc.element_from_point(50.0, 50.0), Some(overlay));
        assert_eq!(resolve_target(&doc, None, Some(50.0), Some(50.0)), Ok(button));
    }

    #[test]
    fn test_container_without_clickables_fails() {
        let (doc, _, _) = container_page();
        assert_eq!(
            resolve_target(&doc, None, Some(300.0), Some(300.0)),
            Err(ResolveError::NoSuitableElement)
        );
    }

    #[test]
    fn test_non_finite_coordinates_fall_back_to_highlight() {
        let (mut doc, _, button) = container_page();
        assert_eq!(
            resolve_target(&doc, None, Some(f64::NAN), Some(10.0)),
            Err(ResolveError::NoSuitableElement)
        );
        doc.set_highlight(Some(button));
        assert_eq!(resolve_target(&doc, None, Some(f64::NAN), None), Ok(button));
    }

    #[test]
    fn test_walks_up_to_clickable_ancestor() {
        let mut doc = Document::new("https://example.com/");
        let html = doc.append_element(Document::ROOT, "html", vec![]);
        let body = doc.append_element(html, "body", vec![]);
        let link = doc.append_element(body, "a", attrs(&[("href", "/next")]));
        let icon = doc.append_element(link, "i", vec![]);
        // the icon swallows the pointer, so only its ancestor qualifies
        doc.node_mut(icon).style.pointer_events = "none".to_string();
        assert_eq!(resolve_target(&doc, Some(icon), None, None), Ok(link));
    }

    #[test]
    fn test_plain_content_is_accepted_last() {
        let mut doc = Document::new("https://example.com/");
        let html = doc.append_element(Document::ROOT, "html", vec![]);
        let body = doc.append_element(html, "body", vec![]);
        let para = doc.append_element(body, "p", vec![]);
        doc.append_text(para, "plain");
        assert_eq!(resolve_target(&doc, Some(para), None, None), Ok(para));
        assert_eq!(
            resolve_target(&doc, Some(body), None, None),
            Err(ResolveError::NoSuitableElement)
        );
    }
}
