use crate::dom::{ComputedStyle, Document, NodeId};

/// Elements the user-agent stylesheet never renders
const NON_RENDERED: [&str; 8] = [
    "head", "script", "style", "template", "title", "meta", "link", "noscript",
];

/// Computes the style of a freshly appended element.
///
/// The node already carries the properties inherited from its parent; this
/// layers the user-agent defaults, the `hidden` attribute and the inline
/// `style` attribute on top, in that order.
pub fn compute(doc: &mut Document, id: NodeId) {
    let tag = doc.tag(id).unwrap_or_default().to_string();
    let has_href = doc.has_attr(id, "href");
    let hidden = doc.has_attr(id, "hidden");
    let inline = doc.attr(id, "style").map(str::to_string);

    let style = &mut doc.node_mut(id).style;
    if NON_RENDERED.contains(&tag.as_str()) || hidden {
        style.display = "none".to_string();
    }
    if matches!(tag.as_str(), "a" | "area") && has_href {
        style.cursor = "pointer".to_string();
    }
    if let Some(declarations) = inline {
        apply_inline(style, &declarations);
    }
}

/// Applies a `style` attribute's declarations to `style`
pub fn apply_inline(style: &mut ComputedStyle, declarations: &str) {
    for declaration in declarations.split(';') {
        let Some((property, value)) = declaration.split_once(':') else {
            continue;
        };
        let property = property.trim().to_ascii_lowercase();
        let value = value
            .trim()
            .trim_end_matches("!important")
            .trim()
            .to_ascii_lowercase();
        if value.is_empty() {
            continue;
        }

        match property.as_str() {
            "display" => style.display = value,
            "visibility" => style.visibility = value,
            "cursor" => style.cursor = value,
            "pointer-events" => style.pointer_events = value,
            "outline" => style.outline = Some(value),
            "opacity" => match value.parse::<f32>() {
                Ok(opacity) => style.opacity = opacity.clamp(0.0, 1.0),
                Err(_) => ::log::trace!("Ignoring unparsable opacity: {}", value),
            },
            _ => {}
        }
    }
}
