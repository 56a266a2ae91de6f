use crate::dom::{Document, NodeId};
use crate::parsers::style;
use scraper::{ElementRef, Html, Node};

/// Parses static markup into a [`Document`] arena.
///
/// Scripts are never executed. Computed style is approximated from the
/// user-agent defaults, the `hidden` attribute and inline `style` declarations.
pub fn parse_document(html: &str, url: &str) -> Document {
    let parsed = Html::parse_document(html);
    let mut doc = Document::new(url);
    append_element(&mut doc, Document::ROOT, parsed.root_element());

    ::log::debug!("HTML parser built {} nodes for {}", doc.len(), url);
    doc
}

fn append_element(doc: &mut Document, parent: NodeId, element: ElementRef<'_>) {
    let value = element.value();
    let attributes = value
        .attrs()
        .map(|(name, val)| (name.to_string(), val.to_string()))
        .collect();
    let id = doc.append_element(parent, value.name(), attributes);
    style::compute(doc, id);

    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                doc.append_text(id, text);
            }
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    append_element(doc, id, child_element);
                }
            }
            _ => {}
        }
    }
}
