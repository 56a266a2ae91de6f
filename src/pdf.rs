use crate::dom::{Document, NodeId};
use crate::results::PdfInfo;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// `.pdf` at the end of a raw link or just before its query or fragment
static PDF_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.pdf($|[?#&])").expect("PDF suffix pattern should be valid"));

const TEXT_KEYWORDS: [&str; 3] = ["pdf", "download", "document"];

const DEFAULT_TITLE: &str = "PDF Document";

#[derive(Debug, Clone, PartialEq)]
pub struct PdfClassification {
    pub is_pdf: bool,
    pub info: Option<PdfInfo>,
}

/// Classifies a link as a PDF resource.
///
/// `href` is resolved against the document URL and only its path is matched,
/// so `?format=pdf` style query strings do not count. The element's
/// `download` and `type` attributes and the wording of the element and its
/// parent are weaker signals checked afterwards.
pub fn classify_pdf(href: &str, doc: &Document, element: Option<NodeId>) -> PdfClassification {
    let href = href.trim();
    let resolved = resolve(href, doc);

    let is_pdf = href_is_pdf(href, resolved.as_ref())
        || element.is_some_and(|id| attribute_mentions_pdf(doc, id))
        || element.is_some_and(|id| text_mentions_pdf(doc, id));

    if !is_pdf {
        return PdfClassification {
            is_pdf: false,
            info: None,
        };
    }

    let filename = resolved
        .as_ref()
        .and_then(|url| url.path_segments()?.next_back().map(str::to_string))
        .filter(|segment| segment.to_ascii_lowercase().ends_with(".pdf"))
        .unwrap_or_default();
    let title = element
        .map(|id| doc.text_content(id).trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let size = element.and_then(|id| {
        doc.attr(id, "data-size")
            .or_else(|| doc.attr(id, "size"))
            .map(str::to_string)
    });

    ::log::debug!("Classified {} as PDF ({})", href, filename);
    PdfClassification {
        is_pdf: true,
        info: Some(PdfInfo {
            url: resolved.map(|u| u.to_string()).unwrap_or_else(|| href.to_string()),
            filename,
            size,
            title,
        }),
    }
}

fn resolve(href: &str, doc: &Document) -> Option<Url> {
    if href.is_empty() {
        return None;
    }
    match doc.base_url() {
        Some(base) => base.join(href).ok(),
        None => Url::parse(href).ok(),
    }
}

fn href_is_pdf(href: &str, resolved: Option<&Url>) -> bool {
    if href.is_empty() {
        return false;
    }
    match resolved {
        Some(url) => url.path().to_ascii_lowercase().contains(".pdf"),
        None => PDF_SUFFIX.is_match(href),
    }
}

fn attribute_mentions_pdf(doc: &Document, id: NodeId) -> bool {
    ["download", "type"].iter().any(|name| {
        doc.attr(id, name)
            .is_some_and(|v| v.to_ascii_lowercase().contains("pdf"))
    })
}

fn text_mentions_pdf(doc: &Document, id: NodeId) -> bool {
    std::iter::once(id)
        .chain(doc.parent_element(id))
        .any(|node| {
            let text = doc.text_content(node).to_ascii_lowercase();
            TEXT_KEYWORDS.iter().any(|k| text.contains(k))
        })
}
