use serde::{Deserialize, Serialize};
use url::Url;

/// Index of a node inside a [`Document`] arena.
///
/// Nodes are stored in pre-order, so comparing two ids compares document order
/// and the descendants of a node occupy the contiguous range after it.
pub type NodeId = usize;

/// Outline the inspector paints on the element under the pointer.
pub const HIGHLIGHT_OUTLINE: &str = "2px solid #f00";

/// Elements that never have children and are serialized without a closing tag.
const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// The subset of computed style the classifier and resolver look at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComputedStyle {
    pub display: String,
    pub visibility: String,
    pub opacity: f32,
    pub cursor: String,
    pub pointer_events: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outline: Option<String>,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: "inline".to_string(),
            visibility: "visible".to_string(),
            opacity: 1.0,
            cursor: "auto".to_string(),
            pointer_events: "auto".to_string(),
            outline: None,
        }
    }
}

impl ComputedStyle {
    /// Style a child starts from: inherited properties copied, the rest reset
    pub fn inherit(&self) -> Self {
        Self {
            visibility: self.visibility.clone(),
            cursor: self.cursor.clone(),
            pointer_events: self.pointer_events.clone(),
            ..Self::default()
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.display == "none"
            || self.visibility == "hidden"
            || self.visibility == "collapse"
            || self.opacity <= 0.0
    }
}

/// Layout box of an element in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeKind {
    Document,
    Element {
        /// Lowercased tag name
        tag: String,
        #[serde(default)]
        attributes: Vec<(String, String)>,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomNode {
    #[serde(default)]
    pub parent: Option<NodeId>,
    #[serde(default)]
    pub children: Vec<NodeId>,
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default)]
    pub style: ComputedStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<BoundingBox>,
}

/// A parsed page: either static markup or a capture of a live page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    nodes: Vec<DomNode>,
}

impl Document {
    /// Creates an empty document holding only the root node
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            nodes: vec![DomNode {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
                style: ComputedStyle::default(),
                bounds: None,
            }],
        }
    }

    /// Loads a page capture serialized as JSON.
    ///
    /// Captures are not required to list nodes in document order; the arena is
    /// renumbered in pre-order on load. The first node must be the document node.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let captured: Document = serde_json::from_str(json)?;
        match captured.nodes.first().map(|root| &root.kind) {
            Some(NodeKind::Document) => Ok(captured.renumbered()),
            Some(_) => Err(serde::de::Error::custom("first node is not a document node")),
            None => Err(serde::de::Error::custom("capture has no nodes")),
        }
    }

    pub const ROOT: NodeId = 0;

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn node(&self, id: NodeId) -> &DomNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut DomNode {
        &mut self.nodes[id]
    }

    /// Appends an element as the last child of `parent`.
    ///
    /// Building depth-first (every subtree completed before its next sibling is
    /// started) keeps the arena in pre-order.
    pub fn append_element(
        &mut self,
        parent: NodeId,
        tag: &str,
        attributes: Vec<(String, String)>,
    ) -> NodeId {
        let style = self.nodes[parent].style.inherit();
        self.push(
            parent,
            NodeKind::Element {
                tag: tag.to_ascii_lowercase(),
                attributes,
            },
            style,
        )
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let style = self.nodes[parent].style.inherit();
        self.push(
            parent,
            NodeKind::Text {
                text: text.to_string(),
            },
            style,
        )
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind, style: ComputedStyle) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(DomNode {
            parent: Some(parent),
            children: Vec::new(),
            kind,
            style,
            bounds: None,
        });
        self.nodes[parent].children.push(id);
        id
    }

    /// Rebuilds the arena in pre-order from the root's child lists.
    ///
    /// Parent links are taken from the walk, not from the capture, and a node
    /// listed under more than one parent is kept under the first one reached.
    fn renumbered(self) -> Self {
        let mut nodes: Vec<DomNode> = Vec::with_capacity(self.nodes.len());
        let mut seen = vec![false; self.nodes.len()];
        let mut stack: Vec<(NodeId, Option<NodeId>)> = vec![(Self::ROOT, None)];
        while let Some((old_id, parent)) = stack.pop() {
            if old_id >= self.nodes.len() || seen[old_id] {
                continue;
            }
            seen[old_id] = true;

            let new_id = nodes.len();
            let old = &self.nodes[old_id];
            nodes.push(DomNode {
                parent,
                children: Vec::new(),
                kind: old.kind.clone(),
                style: old.style.clone(),
                bounds: old.bounds,
            });
            if let Some(p) = parent {
                nodes[p].children.push(new_id);
            }
            stack.extend(old.children.iter().rev().map(|&c| (c, Some(new_id))));
        }

        Self {
            url: self.url,
            nodes,
        }
    }

    pub fn base_url(&self) -> Option<Url> {
        Url::parse(&self.url).ok()
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id].kind, NodeKind::Element { .. })
    }

    /// Lowercased tag name, `None` for text and document nodes
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn attributes(&self, id: NodeId) -> &[(String, String)] {
        match &self.nodes[id].kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Attribute lookup; HTML attribute names are case-insensitive
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn style(&self, id: NodeId) -> &ComputedStyle {
        &self.nodes[id].style
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|&p| self.is_element(p))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    /// Element ancestors, nearest first
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent_element(id), move |&p| self.parent_element(p))
    }

    /// One past the last descendant of `id`
    pub fn subtree_end(&self, id: NodeId) -> NodeId {
        let mut last = id;
        while let Some(&child) = self.nodes[last].children.last() {
            last = child;
        }
        last + 1
    }

    /// All element ids in document order
    pub fn elements(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).filter(|&id| self.is_element(id))
    }

    pub fn document_element(&self) -> Option<NodeId> {
        self.children(Self::ROOT)
            .iter()
            .copied()
            .find(|&c| self.is_element(c))
    }

    pub fn body(&self) -> Option<NodeId> {
        let html = self.document_element()?;
        self.children(html)
            .iter()
            .copied()
            .find(|&c| self.tag(c) == Some("body"))
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        if let NodeKind::Text { text } = &self.nodes[id].kind {
            return text.clone();
        }
        let mut out = String::new();
        for n in id + 1..self.subtree_end(id) {
            if let NodeKind::Text { text } = &self.nodes[n].kind {
                out.push_str(text);
            }
        }
        out
    }

    /// Serialized markup of the node including its own tag
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id].kind {
            NodeKind::Document => {
                for &child in &self.nodes[id].children {
                    self.write_html(child, out);
                }
            }
            NodeKind::Text { text } => {
                let raw = self
                    .parent(id)
                    .and_then(|p| self.tag(p))
                    .is_some_and(|t| matches!(t, "script" | "style"));
                if raw {
                    out.push_str(text);
                } else {
                    escape_into(text, false, out);
                }
            }
            NodeKind::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                for &child in &self.nodes[id].children {
                    self.write_html(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    /// The element's `href` attribute resolved against the document URL.
    ///
    /// Falls back to the raw attribute value when the document URL is not
    /// absolute or the value cannot be joined.
    pub fn resolve_href(&self, id: NodeId) -> Option<String> {
        let raw = self.attr(id, "href")?.trim();
        if raw.is_empty() {
            return None;
        }
        let resolved = match self.base_url() {
            Some(base) => base.join(raw).map(|u| u.to_string()).ok(),
            None => Url::parse(raw).map(|u| u.to_string()).ok(),
        };
        Some(resolved.unwrap_or_else(|| raw.to_string()))
    }

    /// Visible elements under a viewport point, topmost first.
    ///
    /// Paint order is approximated by reverse document order; elements with
    /// `pointer-events: none` are transparent to hit-testing.
    pub fn elements_from_point(&self, x: f64, y: f64) -> Vec<NodeId> {
        let mut hits: Vec<NodeId> = self
            .elements()
            .filter(|&id| {
                let node = &self.nodes[id];
                node.bounds.is_some_and(|b| b.contains(x, y))
                    && node.style.pointer_events != "none"
                    && !node.style.is_hidden()
            })
            .collect();
        hits.reverse();
        hits
    }

    pub fn element_from_point(&self, x: f64, y: f64) -> Option<NodeId> {
        self.elements_from_point(x, y).into_iter().next()
    }

    pub fn is_highlighted(&self, id: NodeId) -> bool {
        self.nodes[id].style.outline.as_deref().is_some_and(|o| {
            let o = o.to_ascii_lowercase();
            o.contains("solid") && (o.contains("#f00") || o.contains("rgb(255, 0, 0)"))
        })
    }

    /// The most recently highlighted element, if the inspector left one marked
    pub fn highlighted(&self) -> Option<NodeId> {
        self.elements().filter(|&id| self.is_highlighted(id)).last()
    }

    /// Moves the inspector highlight to `id`, clearing any previous one
    pub fn set_highlight(&mut self, id: Option<NodeId>) {
        for node in &mut self.nodes {
            if node.style.outline.is_some() {
                node.style.outline = None;
            }
        }
        if let Some(id) = id {
            self.nodes[id].style.outline = Some(HIGHLIGHT_OUTLINE.to_string());
        }
    }

    /// Absolute XPath of an element, shortened to an id lookup when possible
    pub fn xpath_for(&self, id: NodeId) -> String {
        if let Some(elem_id) = self.attr(id, "id").filter(|v| !v.is_empty()) {
            return format!("//*[@id=\"{}\"]", elem_id);
        }
        if Some(id) == self.body() {
            return "/html/body".to_string();
        }
        let Some(tag) = self.tag(id) else {
            return String::new();
        };
        let Some(parent) = self.parent_element(id) else {
            return format!("/{}", tag);
        };
        let index = self
            .children(parent)
            .iter()
            .take_while(|&&s| s != id)
            .filter(|&&s| self.tag(s) == Some(tag))
            .count()
            + 1;
        format!("{}/{}[{}]", self.xpath_for(parent), tag, index)
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}
