use crate::dom::{ComputedStyle, Document, NodeId};
use crate::parsers::{parse_document, style::apply_inline};

fn find(doc: &Document, tag: &str) -> NodeId {
    doc.elements()
        .find(|&id| doc.tag(id) == Some(tag))
        .unwrap_or_else(|| panic!("no <{}> in document", tag))
}

#[test]
fn test_parse_builds_html_head_body() {
    let doc = parse_document(
        "<p class=\"lead\">Hello, <b>world</b>!</p>",
        "https://example.org/page",
    );
    let html = doc.document_element().unwrap();
    assert_eq!(doc.tag(html), Some("html"));
    assert!(doc.body().is_some());

    let p = find(&doc, "p");
    assert_eq!(doc.attr(p, "class"), Some("lead"));
    assert_eq!(doc.text_content(p), "Hello, world!");
    assert_eq!(doc.outer_html(p), "<p class=\"lead\">Hello, <b>world</b>!</p>");
}

#[test]
fn test_nodes_are_in_document_order() {
    let doc = parse_document(
        "<div><span>a</span><span>b</span></div><p>c</p>",
        "https://example.org/",
    );
    let div = find(&doc, "div");
    let p = find(&doc, "p");
    assert!(div < p);
    assert_eq!(doc.subtree_end(div), p);
}

#[test]
fn test_user_agent_defaults() {
    let doc = parse_document(
        "<a href=\"/x\"><span>go</span></a><a name=\"anchor\">here</a><div hidden>gone</div>",
        "https://example.org/",
    );
    let links: Vec<NodeId> = doc.elements().filter(|&id| doc.tag(id) == Some("a")).collect();
    assert_eq!(doc.style(links[0]).cursor, "pointer");
    assert_eq!(doc.style(links[1]).cursor, "auto");

    let span = find(&doc, "span");
    assert_eq!(doc.style(span).cursor, "pointer", "cursor is inherited");

    let div = find(&doc, "div");
    assert_eq!(doc.style(div).display, "none");

    let head = find(&doc, "head");
    assert!(doc.style(head).is_hidden());
}

#[test]
fn test_inline_style_and_inheritance() {
    let doc = parse_document(
        "<div style=\"pointer-events: none; opacity: 0.5\"><button>x</button></div>",
        "https://example.org/",
    );
    let div = find(&doc, "div");
    let button = find(&doc, "button");
    assert_eq!(doc.style(div).opacity, 0.5);
    assert_eq!(doc.style(button).pointer_events, "none");
    assert_eq!(doc.style(button).opacity, 1.0, "opacity is not inherited");
}

#[test]
fn test_apply_inline_ignores_garbage() {
    let mut style = ComputedStyle::default();
    apply_inline(
        &mut style,
        "color red; DISPLAY : None !important;opacity: lots; cursor:pointer;;",
    );
    assert_eq!(style.display, "none");
    assert_eq!(style.cursor, "pointer");
    assert_eq!(style.opacity, 1.0);
}
