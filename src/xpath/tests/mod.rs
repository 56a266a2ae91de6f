use crate::dom::{Document, NodeId};
use crate::parsers::parse_document;
use crate::xpath::{Value, XNode, XPath, XPathError};

const PAGE: &str = "<div id=\"nav\"><ul><li><a class=\"x item\" href=\"/a\">Alpha</a></li><li><a class=\"y\" href=\"/b\">Beta</a></li><li><a class=\"x\" href=\"/c.pdf\">Gamma</a></li></ul></div><ul class=\"second\"><li>One</li><li>Two</li></ul>";

fn page() -> Document {
    parse_document(PAGE, "https://example.com/index.html")
}

fn texts(doc: &Document, pattern: &str) -> Vec<String> {
    XPath::compile(pattern)
        .unwrap()
        .select_elements(doc)
        .unwrap()
        .into_iter()
        .map(|id| doc.text_content(id))
        .collect()
}

#[test]
fn test_attribute_equality() {
    let doc = page();
    assert_eq!(texts(&doc, "//a[@class='y']"), vec!["Beta"]);
    assert_eq!(texts(&doc, "//a[@class=\"x\"]"), vec!["Gamma"]);
}

#[test]
fn test_contains_and_starts_with() {
    let doc = page();
    assert_eq!(texts(&doc, "//a[contains(@class, 'x')]"), vec!["Alpha", "Gamma"]);
    assert_eq!(texts(&doc, "//a[starts-with(@href, '/c')]"), vec!["Gamma"]);
    assert_eq!(texts(&doc, "//a[ends-with(@href, '.pdf')]"), vec!["Gamma"]);
}

#[test]
fn test_positional_predicates() {
    let doc = page();
    assert_eq!(texts(&doc, "//li[2]"), vec!["Beta", "Two"]);
    assert_eq!(texts(&doc, "(//li)[2]"), vec!["Beta"]);
    assert_eq!(texts(&doc, "(//ul)[2]/li"), vec!["One", "Two"]);
    assert_eq!(texts(&doc, "//ul[@class='second']/li[last()]"), vec!["Two"]);
    assert_eq!(texts(&doc, "//li[position() > 1]/a"), vec!["Beta", "Gamma"]);
}

#[test]
fn test_union_is_in_document_order() {
    let doc = page();
    assert_eq!(
        texts(&doc, "//ul[@class='second']/li[1] | //a[@class='y']"),
        vec!["Beta", "One"]
    );
}

#[test]
fn test_reverse_axes() {
    let doc = page();
    assert_eq!(texts(&doc, "//a[.='Gamma']/ancestor::div"), vec!["AlphaBetaGamma"]);
    assert_eq!(
        texts(&doc, "//li[a='Gamma']/preceding-sibling::li[1]"),
        vec!["Beta"]
    );
    assert_eq!(
        texts(&doc, "//li[a='Alpha']/following-sibling::li"),
        vec!["Beta", "Gamma"]
    );
}

#[test]
fn test_names_match_case_insensitively() {
    let doc = page();
    assert_eq!(texts(&doc, "//A[@CLASS='y']"), vec!["Beta"]);
}

#[test]
fn test_scalar_results() {
    let doc = page();
    let count = XPath::compile("count(//li)").unwrap();
    assert_eq!(count.evaluate_string(&doc).unwrap(), "5");
    assert_eq!(count.evaluate(&doc).unwrap(), Value::Number(5.0));

    let joined = XPath::compile("concat(//a[1], '-', normalize-space('  b  c '))").unwrap();
    assert_eq!(joined.evaluate_string(&doc).unwrap(), "Alpha-b c");

    assert_eq!(
        XPath::compile("count(//li) mod 3 = 2 and not(false())")
            .unwrap()
            .evaluate(&doc)
            .unwrap(),
        Value::Boolean(true)
    );
}

#[test]
fn test_attribute_and_text_selections_map_to_elements() {
    let doc = page();
    let hrefs = XPath::compile("//a/@href").unwrap();
    assert_eq!(
        hrefs.select_strings(&doc).unwrap(),
        vec!["/a", "/b", "/c.pdf"]
    );
    let anchors = hrefs.select_elements(&doc).unwrap();
    assert_eq!(anchors.len(), 3);
    assert!(anchors.iter().all(|&id| doc.tag(id) == Some("a")));
    assert!(matches!(hrefs.select(&doc).unwrap()[0], XNode::Attr(_, _)));

    let text_nodes = XPath::compile("//li/a/text()").unwrap();
    assert_eq!(text_nodes.select_elements(&doc).unwrap(), anchors);
}

#[test]
fn test_generated_paths_select_their_element() {
    let doc = page();
    let targets: Vec<NodeId> = doc
        .elements()
        .filter(|&id| matches!(doc.tag(id), Some("a" | "li")))
        .collect();
    for id in targets {
        let path = doc.xpath_for(id);
        let selected = XPath::compile(&path).unwrap().select_elements(&doc).unwrap();
        assert_eq!(selected, vec![id], "path {}", path);
    }
    let nav = XPath::compile("//div").unwrap().select_elements(&doc).unwrap()[0];
    assert_eq!(doc.xpath_for(nav), "//*[@id=\"nav\"]");
}

#[test]
fn test_errors() {
    let doc = page();
    assert_eq!(
        XPath::compile("count(//li)").unwrap().select(&doc),
        Err(XPathError::NotANodeSet)
    );
    assert_eq!(
        XPath::compile("//a[frobnicate(.)]").unwrap().select(&doc),
        Err(XPathError::UnknownFunction("frobnicate".to_string()))
    );
    assert!(matches!(
        XPath::compile("//a[contains(@href)]").unwrap().select(&doc),
        Err(XPathError::Arity { .. })
    ));
    assert!(matches!(
        "//a[".parse::<XPath>(),
        Err(XPathError::Syntax { .. })
    ));
}
