//! XPath 1.0 evaluation over [`Document`] arenas.
//!
//! Covers what pattern generators actually emit: location paths with every
//! axis, predicates, the core operators and the common string, number and node
//! set functions. Element and attribute names match case-insensitively, as
//! they do in HTML documents.

mod eval;
mod lexer;
mod parser;

#[cfg(test)]
mod tests;

use crate::dom::{Document, NodeId};
use std::cmp::Ordering;

pub use crate::error::XPathError;
use eval::Evaluator;
use parser::Expr;

/// A node selected by an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XNode {
    Node(NodeId),
    /// Attribute `index` of the owning element
    Attr(NodeId, usize),
}

impl XNode {
    /// Sort key placing attributes after their element and before its children
    fn order_key(&self) -> (NodeId, usize) {
        match *self {
            XNode::Node(id) => (id, 0),
            XNode::Attr(owner, index) => (owner, index + 1),
        }
    }

    /// The element this node belongs to
    pub fn owner_element(&self, doc: &Document) -> Option<NodeId> {
        match *self {
            XNode::Node(id) if doc.is_element(id) => Some(id),
            XNode::Node(id) if id != Document::ROOT => doc.parent_element(id),
            XNode::Node(_) => None,
            XNode::Attr(owner, _) => Some(owner),
        }
    }
}

impl Ord for XNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

impl PartialOrd for XNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Nodes in document order without duplicates
    Nodes(Vec<XNode>),
    Boolean(bool),
    Number(f64),
    String(String),
}

/// A compiled pattern expression
#[derive(Debug, Clone)]
pub struct XPath {
    source: String,
    expr: Expr,
}

impl XPath {
    pub fn compile(source: &str) -> Result<Self, XPathError> {
        let expr = parser::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn evaluate(&self, doc: &Document) -> Result<Value, XPathError> {
        Evaluator::new(doc).evaluate(&self.expr)
    }

    /// Selected nodes; fails if the expression yields a scalar
    pub fn select(&self, doc: &Document) -> Result<Vec<XNode>, XPathError> {
        match self.evaluate(doc)? {
            Value::Nodes(nodes) => Ok(nodes),
            _ => Err(XPathError::NotANodeSet),
        }
    }

    /// Selected elements in document order.
    ///
    /// Text and attribute selections stand for the element that carries them,
    /// so `//a/@href` and `//a/text()` both select the anchors.
    pub fn select_elements(&self, doc: &Document) -> Result<Vec<NodeId>, XPathError> {
        let mut elements: Vec<NodeId> = self
            .select(doc)?
            .into_iter()
            .filter_map(|node| node.owner_element(doc))
            .collect();
        elements.sort_unstable();
        elements.dedup();
        Ok(elements)
    }

    /// Trimmed string value of every selected node
    pub fn select_strings(&self, doc: &Document) -> Result<Vec<String>, XPathError> {
        let evaluator = Evaluator::new(doc);
        Ok(self
            .select(doc)?
            .into_iter()
            .map(|node| evaluator.string_value(node).trim().to_string())
            .collect())
    }

    /// The expression's value converted to a string
    pub fn evaluate_string(&self, doc: &Document) -> Result<String, XPathError> {
        let evaluator = Evaluator::new(doc);
        let value = evaluator.evaluate(&self.expr)?;
        Ok(evaluator.string(&value))
    }
}

impl std::str::FromStr for XPath {
    type Err = XPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}
