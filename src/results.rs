use crate::dom::{Document, NodeId};
use crate::pdf::classify_pdf;
use serde::{Deserialize, Serialize};

/// One element matched by a pattern or recorded by click tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementRecord {
    /// Trimmed text content, falling back to the tag name, then "Element"
    pub text: String,

    /// URL of the page the element was found on
    pub url: String,

    /// Resolved link target, empty if the element has none
    #[serde(default)]
    pub href: String,

    /// Serialized outer markup
    #[serde(default)]
    pub html: String,

    /// Pattern expression that produced the match
    #[serde(default, alias = "xpath")]
    pub pattern_used: String,

    #[serde(default)]
    pub tag_name: String,

    #[serde(default, alias = "id")]
    pub element_id: String,

    #[serde(default)]
    pub class_name: String,

    #[serde(default)]
    pub is_pdf: bool,

    /// Present only when `is_pdf` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_info: Option<PdfInfo>,

    /// Matches found on the page `href` points at, when that page was visited
    #[serde(default)]
    pub children: Vec<ElementRecord>,
}

impl ElementRecord {
    /// Describes an element of `doc` matched by `pattern`
    pub fn from_element(doc: &Document, id: NodeId, pattern: &str) -> Self {
        let tag_name = doc.tag(id).unwrap_or_default().to_ascii_uppercase();
        let text = doc.text_content(id).trim().to_string();
        let text = match (text.is_empty(), tag_name.is_empty()) {
            (false, _) => text,
            (true, false) => tag_name.clone(),
            (true, true) => "Element".to_string(),
        };
        let href = doc.resolve_href(id).unwrap_or_default();
        let pdf = classify_pdf(&href, doc, Some(id));

        Self {
            text,
            url: doc.url.clone(),
            html: doc.outer_html(id),
            pattern_used: pattern.to_string(),
            tag_name,
            element_id: doc.attr(id, "id").unwrap_or_default().to_string(),
            class_name: doc.attr(id, "class").unwrap_or_default().to_string(),
            is_pdf: pdf.is_pdf,
            pdf_info: pdf.info,
            href,
            children: Vec::new(),
        }
    }

    /// Records with the same text, page and link are the same entry
    pub fn same_entry(&self, other: &ElementRecord) -> bool {
        self.text == other.text && self.url == other.url && self.href == other.href
    }

    /// Number of records in this subtree, including this one
    pub fn count_all(&self) -> usize {
        1 + self.children.iter().map(ElementRecord::count_all).sum::<usize>()
    }
}

/// Descriptive metadata for a PDF link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfInfo {
    pub url: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub size: Option<String>,
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_legacy_field_names() {
        let json = r#"{
            "text": "Annual report",
            "url": "https://example.com/",
            "href": "https://example.com/report.pdf",
            "xpath": "//a",
            "id": "r1",
            "isPdf": true,
            "pdfInfo": {"url": "https://example.com/report.pdf", "filename": "report.pdf", "size": null, "title": "Annual report"}
        }"#;
        let record: ElementRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.pattern_used, "//a");
        assert_eq!(record.element_id, "r1");
        assert!(record.children.is_empty());
        assert_eq!(record.pdf_info.unwrap().filename, "report.pdf");
    }

    #[test]
    fn test_from_element() {
        let doc = crate::parsers::parse_document(
            "<a id=\"r\" class=\"doc\" href=\"files/r.pdf\"> Report </a><span></span>",
            "https://example.com/list/",
        );
        let a = doc.elements().find(|&id| doc.tag(id) == Some("a")).unwrap();
        let record = ElementRecord::from_element(&doc, a, "//a");
        assert_eq!(record.text, "Report");
        assert_eq!(record.url, "https://example.com/list/");
        assert_eq!(record.href, "https://example.com/list/files/r.pdf");
        assert_eq!(record.tag_name, "A");
        assert_eq!(record.element_id, "r");
        assert_eq!(record.class_name, "doc");
        assert!(record.is_pdf);
        assert_eq!(record.pdf_info.unwrap().filename, "r.pdf");

        let span = doc.elements().find(|&id| doc.tag(id) == Some("span")).unwrap();
        let empty = ElementRecord::from_element(&doc, span, "//span");
        assert_eq!(empty.text, "SPAN");
        assert_eq!(empty.href, "");
        assert!(!empty.is_pdf);

        let json = serde_json::to_value(&empty).unwrap();
        assert_eq!(json["patternUsed"], "//span");
        assert!(json.get("pdfInfo").is_none());
    }

    #[test]
    fn test_count_all() {
        let leaf = ElementRecord {
            text: "leaf".into(),
            url: "https://example.com/b".into(),
            href: String::new(),
            html: String::new(),
            pattern_used: String::new(),
            tag_name: "A".into(),
            element_id: String::new(),
            class_name: String::new(),
            is_pdf: false,
            pdf_info: None,
            children: vec![],
        };
        let mut root = leaf.clone();
        root.children = vec![leaf.clone(), leaf];
        assert_eq!(root.count_all(), 3);
    }
}
